//! Bounded spooling of an upload stream to a temporary file

use super::scan::SignatureScanner;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::Path;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use vaultdrop_common::errors::{AppError, Result};

/// Bytes kept from the start of the stream for content sniffing
pub const SNIFF_LEN: usize = 512;

/// An upload persisted to disk; the file is removed when this is dropped
#[derive(Debug)]
pub struct SpooledUpload {
    pub path: TempPath,
    pub size: u64,
    pub head: Vec<u8>,
    pub flagged: bool,
}

/// Copy `stream` to a temp file, failing as soon as more than `limit` bytes
/// have arrived. Nothing is left on disk when this returns an error.
pub async fn spool<S>(stream: S, limit: u64, dir: Option<&Path>) -> Result<SpooledUpload>
where
    S: Stream<Item = Result<Bytes>>,
{
    let builder = {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vaultdrop-").suffix(".upload");
        builder
    };
    let temp = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    let (file, path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut stream = std::pin::pin!(stream);
    let mut size: u64 = 0;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    let mut scanner = SignatureScanner::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        if size > limit {
            return Err(AppError::PayloadTooLarge { limit });
        }

        if head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }
        scanner.feed(&chunk);
        file.write_all(&chunk).await?;
    }

    if size == 0 {
        return Err(AppError::EmptyUpload);
    }
    file.flush().await?;

    Ok(SpooledUpload {
        path,
        size,
        head,
        flagged: scanner.detected(),
    })
}
