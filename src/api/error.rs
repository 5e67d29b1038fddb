//! Exchange client error types.

use thiserror::Error;

/// Result type for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Failures talking to the exchange or decoding its responses.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Transport failure (connect, timeout, TLS)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx HTTP status
    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Exchange rejected the request (non-zero retCode)
    #[error("API error {code} from {endpoint}: {message}")]
    Api {
        endpoint: String,
        code: i64,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// A required field was absent or empty
    #[error("Missing field '{field}' in {endpoint} response")]
    MissingField { endpoint: String, field: String },

    /// A field was present but not a valid number
    #[error("Invalid value '{value}' for field '{field}' in {endpoint} response")]
    InvalidField {
        endpoint: String,
        field: String,
        value: String,
    },

    /// Request signing failed
    #[error("Signing error: {0}")]
    Signing(String),
}
