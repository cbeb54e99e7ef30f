//! Mock instrument source for testing without network calls.

use super::{DataSourceError, InstrumentSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock source that returns predefined names, errors, or stalls.
#[derive(Debug, Clone, Default)]
pub struct MockInstrumentSource {
    names: HashMap<String, String>,
    failures: HashMap<String, DataSourceError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockInstrumentSource {
    /// Create a new mock source with no known symbols.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name for a symbol (matched case-insensitively).
    pub fn with_name(mut self, symbol: &str, name: &str) -> Self {
        self.names
            .insert(symbol.to_ascii_uppercase(), name.to_string());
        self
    }

    /// Make lookups for a symbol fail with `error`.
    pub fn with_error(mut self, symbol: &str, error: DataSourceError) -> Self {
        self.failures.insert(symbol.to_ascii_uppercase(), error);
        self
    }

    /// Sleep before answering every lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of lookups served so far (shared across clones).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstrumentSource for MockInstrumentSource {
    async fn fetch_instrument_name(&self, symbol: &str) -> Result<Option<String>, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let key = symbol.to_ascii_uppercase();
        if let Some(err) = self.failures.get(&key) {
            return Err(err.clone());
        }
        Ok(self.names.get(&key).cloned())
    }
}
