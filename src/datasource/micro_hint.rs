//! Cached, deadline-bounded micro/mini hints from an instrument source.

use super::{DataSourceError, InstrumentSource};
use crate::cache::{Cache, MemoryCache};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(3_000);
pub const DEFAULT_HINT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Resolves whether a futures symbol is a micro contract from its listed name.
///
/// Lookups never fail: errors and timeouts yield `None` so callers fall back
/// to the symbol heuristic. Only successful answers are cached.
pub struct MicroHintResolver {
    source: Option<Arc<dyn InstrumentSource>>,
    cache: Arc<dyn Cache<bool>>,
    timeout: Duration,
    ttl: Duration,
}

impl MicroHintResolver {
    pub fn new(
        source: Arc<dyn InstrumentSource>,
        cache: Arc<dyn Cache<bool>>,
        timeout: Duration,
        ttl: Duration,
    ) -> Self {
        Self {
            source: Some(source),
            cache,
            timeout,
            ttl,
        }
    }

    /// Resolver that never leaves the process; every lookup is `None`.
    pub fn disabled() -> Self {
        Self {
            source: None,
            cache: Arc::new(MemoryCache::<bool>::new()),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            ttl: DEFAULT_HINT_TTL,
        }
    }

    /// Micro hint for one symbol, from cache or the source.
    pub async fn lookup_micro_hint(&self, symbol: &str) -> Option<bool> {
        let key = symbol.trim().to_ascii_uppercase();
        if key.is_empty() {
            return None;
        }
        if let Some(hit) = self.cache.get(&key) {
            return Some(hit);
        }
        let source = self.source.as_ref()?;

        let lookup = source.fetch_instrument_name(&key);
        let name = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(Some(name))) => name,
            Ok(Ok(None)) => {
                debug!(symbol = %key, "No instrument name found");
                return None;
            }
            Ok(Err(e)) => {
                warn!(symbol = %key, error = %e, "Instrument lookup failed");
                return None;
            }
            Err(_) => {
                warn!(symbol = %key, error = %DataSourceError::Timeout, "Instrument lookup failed");
                return None;
            }
        };

        let micro = is_micro_name(&name)?;
        self.cache.set(key, micro, self.ttl);
        Some(micro)
    }

    /// Hints for a batch of symbols, one lookup per distinct symbol, run
    /// concurrently. Symbols without an answer are absent from the map.
    pub async fn lookup_many<I, S>(&self, symbols: I) -> HashMap<String, bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: HashSet<String> = symbols
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        let lookups = distinct.into_iter().map(|symbol| async move {
            let hint = self.lookup_micro_hint(&symbol).await;
            (symbol, hint)
        });
        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(symbol, hint)| hint.map(|h| (symbol, h)))
            .collect()
    }
}

/// First word of the listed name is "MICRO". `None` for a blank name.
fn is_micro_name(name: &str) -> Option<bool> {
    let first = name.split_whitespace().next()?;
    Some(first.eq_ignore_ascii_case("MICRO"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_micro_name() {
        assert_eq!(is_micro_name("Micro E-mini S&P 500"), Some(true));
        assert_eq!(is_micro_name("E-Mini S&P 500"), Some(false));
        assert_eq!(is_micro_name("Microsoft Corporation"), Some(false));
        assert_eq!(is_micro_name("   "), None);
    }

    #[tokio::test]
    async fn test_disabled_resolver_returns_none() {
        let resolver = MicroHintResolver::disabled();
        assert_eq!(resolver.lookup_micro_hint("MES=F").await, None);
    }
}
