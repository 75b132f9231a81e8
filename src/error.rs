use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReadMoreError>;

/// Errors shared by the store, the scanner and the post lookup
#[derive(Debug, Error)]
pub enum ReadMoreError {
    /// The record store or the remote endpoint could not be reached
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A lookup request was superseded before it completed
    #[error("request cancelled")]
    Cancelled,

    #[error("not found")]
    NotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The remote endpoint answered, but not with something we can use
    #[error("remote error (status {status}): {message}")]
    Remote { status: u16, message: String },

    /// Results could not be written out
    #[error("output failed: {0}")]
    Output(#[from] std::io::Error),
}

impl From<sqlx::Error> for ReadMoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ReadMoreError::NotFound,
            other => ReadMoreError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ReadMoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ReadMoreError::Remote {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        } else {
            ReadMoreError::StoreUnavailable(err.to_string())
        }
    }
}

impl ReadMoreError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReadMoreError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: ReadMoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ReadMoreError::NotFound));
    }

    #[test]
    fn test_pool_errors_map_to_store_unavailable() {
        let err: ReadMoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ReadMoreError::StoreUnavailable(_)));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ReadMoreError::Cancelled.to_string(), "request cancelled");
        assert_eq!(
            ReadMoreError::InvalidInput("bad date".to_string()).to_string(),
            "invalid input: bad date"
        );
    }

    #[test]
    fn test_io_errors_map_to_output() {
        let err: ReadMoreError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert!(matches!(err, ReadMoreError::Output(_)));
        assert_eq!(err.to_string(), "output failed: pipe closed");
    }
}
