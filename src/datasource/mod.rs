//! Instrument metadata source used to refine micro/mini classification.

use async_trait::async_trait;
use std::fmt;

pub mod micro_hint;
pub mod mock;
pub mod yahoo;

pub use micro_hint::MicroHintResolver;
pub use mock::MockInstrumentSource;
pub use yahoo::YahooInstrumentSource;

/// Looks up human-readable instrument names by market symbol.
///
/// Implementations must handle retry/backoff and rate limiting.
#[async_trait]
pub trait InstrumentSource: Send + Sync + fmt::Debug {
    /// Fetch the display name for a symbol.
    ///
    /// # Arguments
    /// * `symbol` - Market symbol as stored on the trade (e.g., "MES=F")
    ///
    /// # Returns
    /// The instrument's short (or long) name, or None if the source has no match
    async fn fetch_instrument_name(&self, symbol: &str) -> Result<Option<String>, DataSourceError>;
}

/// Error type for data source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection refused, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// Lookup did not finish within the configured deadline
    Timeout,
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Timeout => write!(f, "Timed out"),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}
