//! Yahoo Finance symbol search client.

use super::{DataSourceError, InstrumentSource};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Name fields tried in order on a search hit.
const NAME_FIELDS: &[&str] = &["shortname", "longname", "longName", "name"];

/// Instrument source backed by the public Yahoo Finance search endpoint.
#[derive(Debug, Clone)]
pub struct YahooInstrumentSource {
    client: Client,
    base_url: String,
    max_elapsed: Duration,
}

impl YahooInstrumentSource {
    /// Create a new Yahoo source. `max_elapsed` bounds the retry loop.
    pub fn new(base_url: String, max_elapsed: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url,
            max_elapsed,
        }
    }

    /// Create with the default Yahoo Finance URL.
    pub fn default_url() -> Self {
        Self::new(
            "https://query1.finance.yahoo.com".to_string(),
            Duration::from_secs(3),
        )
    }

    async fn search(&self, symbol: &str) -> Result<serde_json::Value, DataSourceError> {
        let url = format!("{}/v1/finance/search", self.base_url);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(&[("q", symbol), ("quotesCount", "6"), ("newsCount", "0")])
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl InstrumentSource for YahooInstrumentSource {
    async fn fetch_instrument_name(&self, symbol: &str) -> Result<Option<String>, DataSourceError> {
        debug!(symbol, "Searching instrument name");
        let response = self.search(symbol).await?;
        Ok(parse_search_name(&response, symbol))
    }
}

/// Pick the exact symbol match (or the first hit) and return its name.
fn parse_search_name(response: &serde_json::Value, symbol: &str) -> Option<String> {
    let quotes = response.get("quotes")?.as_array()?;
    let wanted = symbol.trim().to_ascii_uppercase();
    let hit = quotes
        .iter()
        .find(|q| {
            q.get("symbol")
                .and_then(|s| s.as_str())
                .is_some_and(|s| s.to_ascii_uppercase() == wanted)
        })
        .or_else(|| quotes.first())?;

    NAME_FIELDS
        .iter()
        .filter_map(|field| hit.get(*field).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
}
