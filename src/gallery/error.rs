//! Error taxonomy for the gallery pipeline.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GalleryError {
    #[error("Invalid address or ENS name: {input}")]
    InvalidInput { input: String },

    #[error("Could not resolve ENS name: {name}")]
    Resolution { name: String },

    #[error("API rate limited (status {status})")]
    RateLimited { status: u16 },

    #[error("API error: {status}")]
    Http { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{message}")]
    GraphQl { message: String },

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Request was cancelled")]
    Cancelled,
}

impl GalleryError {
    /// Whether the request is worth another attempt under the retry budget.
    /// Every failure reported by the token API is, however it surfaced.
    pub fn is_retryable(&self) -> bool {
        self.is_fetch_error()
    }

    /// Whether the error came from the remote token API.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            GalleryError::RateLimited { .. }
                | GalleryError::Http { .. }
                | GalleryError::Transport(_)
                | GalleryError::GraphQl { .. }
                | GalleryError::Decode(_)
        )
    }
}

impl From<reqwest::Error> for GalleryError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 429 => GalleryError::RateLimited { status: 429 },
            Some(status) => GalleryError::Http { status: status.as_u16() },
            None if err.is_decode() => GalleryError::Decode(err.to_string()),
            None => GalleryError::Transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GalleryError::RateLimited { status: 429 }.is_retryable());
        assert!(GalleryError::Http { status: 503 }.is_retryable());
        assert!(GalleryError::Transport("reset".into()).is_retryable());
        assert!(GalleryError::Http { status: 400 }.is_retryable());
        assert!(GalleryError::GraphQl { message: "bad".into() }.is_retryable());
        assert!(!GalleryError::InvalidInput { input: "x".into() }.is_retryable());
        assert!(!GalleryError::Resolution { name: "a.eth".into() }.is_retryable());
        assert!(!GalleryError::Cancelled.is_retryable());
    }

    #[test]
    fn test_fetch_error_classification() {
        assert!(GalleryError::GraphQl { message: "bad".into() }.is_fetch_error());
        assert!(!GalleryError::Resolution { name: "a.eth".into() }.is_fetch_error());
        assert!(!GalleryError::Cancelled.is_fetch_error());
    }

    #[test]
    fn test_messages() {
        assert_eq!(GalleryError::Http { status: 500 }.to_string(), "API error: 500");
        assert_eq!(
            GalleryError::Resolution { name: "foo.eth".into() }.to_string(),
            "Could not resolve ENS name: foo.eth"
        );
    }
}
