//! Parallel Download Library
//!
//! Downloads large remote objects by splitting them into byte ranges,
//! fetching the ranges in bounded parallel batches directly into their place
//! in the destination file, and verifying the result with CRC32C.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(DEFAULT_PARALLELISM, 32);
        assert_eq!(DEFAULT_REQUEST_SIZE, 50 * MIB);
        assert!(USER_AGENT.starts_with("parallel-download/"));
    }

    #[test]
    fn test_error_types() {
        let store_error = errors::StoreError::NotFound {
            object: "missing".to_string(),
        };
        let app_error = AppError::from(errors::DownloadError::Metadata(store_error));

        assert_eq!(app_error.category(), "not_found");
        assert!(!app_error.is_recoverable());
    }
}
