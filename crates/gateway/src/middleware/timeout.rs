//! Deadline for query routes

use axum::BoxError;
use tower::timeout::error::Elapsed;
use vaultdrop_common::errors::AppError;

/// Maps a failure from the timeout layer to an API error
pub async fn request_timed_out(err: BoxError) -> AppError {
    if err.is::<Elapsed>() {
        AppError::RequestTimeout
    } else {
        AppError::Internal {
            message: format!("unhandled middleware error: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_elapsed_maps_to_408() {
        let err = request_timed_out(Box::new(Elapsed::new())).await;
        assert!(matches!(err, AppError::RequestTimeout));
        assert_eq!(err.status_code(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_other_errors_are_internal() {
        let err = request_timed_out("boom".into()).await;
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
