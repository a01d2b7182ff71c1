//! Upload intake helpers
//!
//! The upload handler streams the `file` part through [`spool`], which
//! enforces the byte ceiling, keeps the first bytes for [`sniff`] and feeds
//! the [`scan`] placeholder check, all in a single pass.

pub mod scan;
pub mod sniff;
pub mod spool;

use regex_lite::Regex;
use vaultdrop_common::errors::{AppError, Result};

/// Name used when the client sends nothing usable
pub const FALLBACK_FILE_NAME: &str = "upload.pdf";

/// Turns client-supplied file names into safe object key segments
#[derive(Clone, Debug)]
pub struct FileNameSanitizer {
    unsafe_chars: Regex,
}

impl FileNameSanitizer {
    pub fn new() -> Result<Self> {
        let unsafe_chars = Regex::new(r"[^A-Za-z0-9._-]").map_err(|e| AppError::Internal {
            message: format!("file name pattern: {e}"),
        })?;
        Ok(Self { unsafe_chars })
    }

    /// Base name only, unsafe characters replaced with `_`
    pub fn sanitize(&self, raw: Option<&str>) -> String {
        let base = raw
            .unwrap_or_default()
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();

        if base.is_empty() || base.chars().all(|c| c == '.') {
            return FALLBACK_FILE_NAME.to_string();
        }

        self.unsafe_chars.replace_all(base, "_").into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(raw: Option<&str>) -> String {
        FileNameSanitizer::new().unwrap().sanitize(raw)
    }

    #[test]
    fn test_plain_name_is_kept() {
        assert_eq!(sanitize(Some("report-2024_v1.pdf")), "report-2024_v1.pdf");
    }

    #[test]
    fn test_directories_are_stripped() {
        assert_eq!(sanitize(Some("../../etc/passwd")), "passwd");
        assert_eq!(sanitize(Some(r"C:\Users\me\scan.pdf")), "scan.pdf");
    }

    #[test]
    fn test_unsafe_characters_are_replaced() {
        assert_eq!(sanitize(Some("my report (final).pdf")), "my_report__final_.pdf");
        assert_eq!(sanitize(Some("naïve.pdf")), "na_ve.pdf");
    }

    #[test]
    fn test_empty_names_fall_back() {
        assert_eq!(sanitize(None), FALLBACK_FILE_NAME);
        assert_eq!(sanitize(Some("")), FALLBACK_FILE_NAME);
        assert_eq!(sanitize(Some("dir/")), FALLBACK_FILE_NAME);
        assert_eq!(sanitize(Some("..")), FALLBACK_FILE_NAME);
    }
}
