use thiserror::Error;

use super::Provider;

/// Normalized description of a failed vendor call
///
/// Everything the billing classifier looks at: the stringified error plus the
/// HTTP status when the vendor returned one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct VendorError {
    pub message: String,
    pub status: Option<u16>,
}

impl VendorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

impl From<reqwest::Error> for VendorError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

/// Backend construction failures (fatal at startup)
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("API key for {0} is empty")]
    EmptyCredential(Provider),

    #[error("Failed to initialize HTTP client for {provider}: {source}")]
    Client {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },
}
