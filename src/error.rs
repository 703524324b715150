//! Error types for rangesync

use thiserror::Error;

/// Result type alias for rangesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rangesync
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors (file system operations)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// The byte source ended before its declared size
    #[error("short read: expected {expected} bytes, source ended after {actual}")]
    ShortRead { expected: u64, actual: u64 },

    /// Malformed checksum index stream
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Record area is not a whole number of records
    #[error("truncated checksum stream: {remaining} trailing bytes do not form a {record_size}-byte record")]
    TruncatedStream { remaining: usize, record_size: usize },

    /// Fetched block does not hash to the indexed strong checksum
    #[error("checksum mismatch for block {block_index}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        block_index: usize,
        expected: String,
        actual: String,
    },

    /// Transient transport failure (connection, timeout, 5xx)
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// All retry attempts failed
    #[error("{what}: gave up after {attempts} attempts")]
    TransportExhausted {
        what: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Remote answered in a way a retry cannot fix
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Block index beyond the known block count
    #[error("block {block_index} out of range (block count {block_count})")]
    OutOfRange {
        block_index: usize,
        block_count: usize,
    },

    /// Byte range that cannot be satisfied
    #[error("Invalid range: {value}")]
    InvalidRange { value: String },

    /// Reconstruction plan inconsistent with its inputs
    #[error("Plan error: {message}")]
    Plan { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a transport error without an underlying HTTP error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error wrapping a reqwest error
    pub fn http(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a plan error
    pub fn plan(message: impl Into<String>) -> Self {
        Self::Plan {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } => true,
            Error::Io { source, .. } => {
                use std::io::ErrorKind;
                matches!(
                    source.kind(),
                    ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::TimedOut
                        | ErrorKind::Interrupted
                )
            }
            _ => false,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: format!("TOML parse error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::transport("connection reset").is_retryable());
        assert!(Error::io(
            "reading",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout")
        )
        .is_retryable());

        assert!(!Error::decode("bad header").is_retryable());
        assert!(!Error::protocol("404").is_retryable());
        assert!(!Error::ChecksumMismatch {
            block_index: 3,
            expected: "aa".into(),
            actual: "bb".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_exhausted_keeps_source() {
        let err = Error::TransportExhausted {
            what: "block 7".into(),
            attempts: 3,
            source: Box::new(Error::transport("timed out")),
        };
        assert_eq!(err.to_string(), "block 7: gave up after 3 attempts");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Transport error: timed out"));
    }
}
