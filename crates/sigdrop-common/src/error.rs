//! Common error types for sigdrop.

use thiserror::Error;

/// Result type alias using sigdrop's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for sigdrop operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (signal file, signal directory, console).
    /// Displays as the underlying error so context chains print it once.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create an internal error from any displayable type.
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        fn open_missing() -> Result<()> {
            std::fs::File::open("/definitely/not/here/sigdrop")?;
            Ok(())
        }
        assert!(matches!(open_missing(), Err(Error::Io(_))));
    }

    #[test]
    fn test_io_error_displays_once_in_a_chain() {
        use std::error::Error as _;

        let err = Error::from(std::io::Error::other("disk full"));
        assert_eq!(err.to_string(), "disk full");
        // Nothing further down the chain repeats the message.
        assert!(err.source().is_none());
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            Error::config("poll interval must be non-zero").to_string(),
            "configuration error: poll interval must be non-zero"
        );
        assert_eq!(
            Error::internal("console reader panicked").to_string(),
            "internal error: console reader panicked"
        );
    }
}
