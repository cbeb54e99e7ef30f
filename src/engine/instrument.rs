//! Instrument classification: futures detection, micro/mini sizing and
//! point-value multipliers.
//!
//! Everything here is a pure function of the symbol (plus an optional
//! externally supplied micro hint). No lookups happen in this module.

use crate::domain::{AssetClass, Decimal, Trade};
use serde::{Deserialize, Serialize};

/// Suffixes marking a futures market symbol (Yahoo continuous, broker export).
const FUTURES_SUFFIXES: &[&str] = &["=F", ".CME"];

/// Dollar value of a one-point move for one contract, keyed by root prefix.
///
/// Micro roots come before their full-size siblings.
const POINT_VALUES: &[(&str, i64, u32)] = &[
    ("MES", 5, 0),  // Micro E-mini S&P 500
    ("ES", 50, 0),  // E-mini S&P 500
    ("MNQ", 2, 0),  // Micro E-mini Nasdaq-100
    ("NQ", 20, 0),  // E-mini Nasdaq-100
    ("MYM", 5, 1),  // Micro E-mini Dow, $0.50
    ("YM", 5, 0),   // E-mini Dow
    ("M2K", 5, 0),  // Micro E-mini Russell 2000
    ("RTY", 50, 0), // E-mini Russell 2000
    ("MET", 1, 1),  // Micro Ether, $0.10
];

/// Futures contract size family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractSize {
    Micro,
    Mini,
}

/// True when the symbol carries a futures market suffix.
pub fn is_futures_symbol(symbol: &str) -> bool {
    let upper = symbol.trim().to_ascii_uppercase();
    FUTURES_SUFFIXES.iter().any(|suffix| upper.ends_with(suffix))
}

/// Effective futures status of a stored trade: the asset class flag first,
/// the symbol suffix for trades imported under another class.
pub fn is_futures_trade(trade: &Trade) -> bool {
    trade.asset_class == AssetClass::Future || is_futures_symbol(trade.symbol.as_str())
}

/// Upper-cased contract root with any futures suffix removed.
pub fn futures_root(symbol: &str) -> String {
    let upper = symbol.trim().to_ascii_uppercase();
    FUTURES_SUFFIXES
        .iter()
        .find_map(|suffix| upper.strip_suffix(suffix).map(str::to_string))
        .unwrap_or(upper)
}

/// Leading "M" on the root (MES, MNQ, MYM, M2K). Known to misfire on some
/// roots, which is why an external hint can override it.
fn micro_heuristic(root: &str) -> bool {
    let mut chars = root.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('M'), Some(c)) if c.is_ascii_alphanumeric()
    )
}

/// Micro futures classification. The external hint wins when present.
pub fn is_micro_futures_symbol(symbol: &str, hint: Option<bool>) -> bool {
    if !is_futures_symbol(symbol) {
        return false;
    }
    hint.unwrap_or_else(|| micro_heuristic(&futures_root(symbol)))
}

/// Micro vs mini for a symbol already known to be futures.
///
/// `None` means indeterminate (no hint and nothing to inspect).
pub fn contract_size(symbol: &str, hint: Option<bool>) -> Option<ContractSize> {
    let as_size = |micro: bool| {
        if micro {
            ContractSize::Micro
        } else {
            ContractSize::Mini
        }
    };

    if let Some(micro) = hint {
        return Some(as_size(micro));
    }
    let root = futures_root(symbol);
    if root.is_empty() {
        return None;
    }
    Some(as_size(micro_heuristic(&root)))
}

/// Point-value multiplier for a symbol; 1 for anything not in the table.
pub fn point_value(symbol: &str) -> Decimal {
    let root = futures_root(symbol);
    POINT_VALUES
        .iter()
        .find(|(prefix, _, _)| root.starts_with(prefix))
        .map(|(_, mantissa, scale)| Decimal::from_parts(*mantissa, *scale))
        .unwrap_or_else(Decimal::one)
}

/// Asset class guess for a symbol entered without one.
pub fn infer_asset_class(symbol: &str) -> AssetClass {
    let upper = symbol.trim().to_ascii_uppercase();
    if is_futures_symbol(&upper) {
        return AssetClass::Future;
    }
    if upper.ends_with("=X") {
        return AssetClass::Forex;
    }
    if upper.ends_with("-USD") || upper.ends_with("-USDT") || is_crypto_pair(&upper) {
        return AssetClass::Crypto;
    }
    AssetClass::Stock
}

/// `AAA-BBB` with 2-5 letters on each side.
fn is_crypto_pair(upper: &str) -> bool {
    let Some((base, quote)) = upper.split_once('-') else {
        return false;
    };
    let leg_ok = |leg: &str| {
        (2..=5).contains(&leg.len()) && leg.chars().all(|c| c.is_ascii_alphabetic())
    };
    leg_ok(base) && leg_ok(quote)
}

/// Instrument facts for one trade, resolved once and passed to the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub is_futures: bool,
    pub point_value: Decimal,
}

impl Instrument {
    /// The multiplier only applies to futures; an equity ticker that happens
    /// to start with a futures root keeps $1 per point.
    pub fn for_trade(trade: &Trade) -> Self {
        let is_futures = is_futures_trade(trade);
        let point_value = if is_futures {
            point_value(trade.symbol.as_str())
        } else {
            Decimal::one()
        };
        Instrument {
            is_futures,
            point_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, Symbol, TimeMs};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn trade(symbol: &str, asset_class: AssetClass) -> Trade {
        Trade::new(
            AccountId::new("acc"),
            Symbol::new(symbol),
            asset_class,
            Decimal::one(),
            d("100"),
            TimeMs::new(0),
        )
    }

    #[test]
    fn test_futures_suffixes() {
        assert!(is_futures_symbol("MES=F"));
        assert!(is_futures_symbol("es=f"));
        assert!(is_futures_symbol("METX25.CME"));
        assert!(!is_futures_symbol("AAPL"));
        assert!(!is_futures_symbol("EURUSD=X"));
    }

    #[test]
    fn test_futures_trade_prefers_asset_class() {
        assert!(is_futures_trade(&trade("MESZ5", AssetClass::Future)));
        assert!(is_futures_trade(&trade("NQ=F", AssetClass::Stock)));
        assert!(!is_futures_trade(&trade("MSFT", AssetClass::Stock)));
    }

    #[test]
    fn test_micro_heuristic_and_hint_override() {
        assert!(is_micro_futures_symbol("MES=F", None));
        assert!(is_micro_futures_symbol("M2K=F", None));
        assert!(!is_micro_futures_symbol("ES=F", None));
        // Not futures at all: never micro, hint or not.
        assert!(!is_micro_futures_symbol("MSFT", Some(true)));
        // Hint beats the heuristic in both directions.
        assert!(!is_micro_futures_symbol("MES=F", Some(false)));
        assert!(is_micro_futures_symbol("ES=F", Some(true)));
    }

    #[test]
    fn test_contract_size() {
        assert_eq!(contract_size("MNQ=F", None), Some(ContractSize::Micro));
        assert_eq!(contract_size("NQ=F", None), Some(ContractSize::Mini));
        assert_eq!(contract_size("NQ=F", Some(true)), Some(ContractSize::Micro));
        assert_eq!(contract_size("=F", None), None);
        assert_eq!(contract_size("", Some(false)), Some(ContractSize::Mini));
    }

    #[test]
    fn test_point_value_table() {
        assert_eq!(point_value("MES=F"), d("5"));
        assert_eq!(point_value("ES=F"), d("50"));
        assert_eq!(point_value("MNQ=F"), d("2"));
        assert_eq!(point_value("NQ=F"), d("20"));
        assert_eq!(point_value("MYM=F"), d("0.5"));
        assert_eq!(point_value("YM=F"), d("5"));
        assert_eq!(point_value("M2K=F"), d("5"));
        assert_eq!(point_value("RTY=F"), d("50"));
        assert_eq!(point_value("METX25.CME"), d("0.1"));
        assert_eq!(point_value("CL=F"), d("1"));
        assert_eq!(point_value("AAPL"), d("1"));
    }

    #[test]
    fn test_instrument_multiplier_only_for_futures() {
        let future = Instrument::for_trade(&trade("MNQ=F", AssetClass::Future));
        assert!(future.is_futures);
        assert_eq!(future.point_value, d("2"));

        let equity = Instrument::for_trade(&trade("ESTC", AssetClass::Stock));
        assert!(!equity.is_futures);
        assert_eq!(equity.point_value, Decimal::one());
    }

    #[test]
    fn test_infer_asset_class() {
        assert_eq!(infer_asset_class("MES=F"), AssetClass::Future);
        assert_eq!(infer_asset_class("EURUSD=X"), AssetClass::Forex);
        assert_eq!(infer_asset_class("BTC-USD"), AssetClass::Crypto);
        assert_eq!(infer_asset_class("eth-usdt"), AssetClass::Crypto);
        assert_eq!(infer_asset_class("SOL-EUR"), AssetClass::Crypto);
        assert_eq!(infer_asset_class("BRK-B"), AssetClass::Stock);
        assert_eq!(infer_asset_class("AAPL"), AssetClass::Stock);
    }
}
