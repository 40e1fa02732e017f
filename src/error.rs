//! Crate-level error type.
//!
//! Transport failures are never fatal to a session: callers turn them into
//! log entries and retry handles. The variants exist so call sites can tell
//! "the server said no" apart from "the wire broke" apart from "the reply
//! made no sense".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DracoError {
    /// The backend replied with a non-2xx HTTP status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// A connection could not be established or the request never completed.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// A response body could not be parsed as the expected structure.
    #[error("malformed response on {context}: {detail}")]
    Json { context: String, detail: String },

    /// The duplex channel is not connected (or its writer task is gone).
    #[error("duplex channel is not connected")]
    ChannelClosed,

    /// The local key-value store rejected a read or write.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DracoError {
    /// Map a reqwest failure for `url` into the matching variant.
    pub fn from_request(url: &str, err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => DracoError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            },
            None => DracoError::Connect {
                url: url.to_string(),
                detail: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_display_contains_status_and_url() {
        let err = DracoError::Http {
            status: 503,
            url: "http://localhost:5000/api/command".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("503"), "status in display: {s}");
        assert!(s.contains("/api/command"), "url in display: {s}");
    }

    #[test]
    fn test_connect_display_contains_detail() {
        let err = DracoError::Connect {
            url: "http://localhost:5000".to_string(),
            detail: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DracoError = io.into();
        assert!(matches!(err, DracoError::Io(_)));
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&DracoError::ChannelClosed);
    }
}
