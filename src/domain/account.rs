//! Account and its fee configuration rows.

use crate::domain::{AccountId, AssetClass, Decimal, Symbol, UnknownVariant};
use serde::{Deserialize, Serialize};

/// A trading account with optional futures fee defaults.
///
/// The defaults are round-trip dollars per contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub currency: String,
    pub default_fee_per_mini_contract: Option<Decimal>,
    pub default_fee_per_micro_contract: Option<Decimal>,
}

impl Account {
    pub fn new(name: impl Into<String>, currency: impl Into<String>) -> Self {
        Account {
            id: AccountId::generate(),
            name: name.into(),
            currency: currency.into(),
            default_fee_per_mini_contract: None,
            default_fee_per_micro_contract: None,
        }
    }

    pub fn with_futures_defaults(mut self, mini: Option<Decimal>, micro: Option<Decimal>) -> Self {
        self.default_fee_per_mini_contract = mini;
        self.default_fee_per_micro_contract = micro;
        self
    }

    pub fn has_futures_defaults(&self) -> bool {
        self.default_fee_per_mini_contract.is_some()
            || self.default_fee_per_micro_contract.is_some()
    }
}

/// How a fee rule charges.
///
/// Serialized as `{"mode": "PER_CONTRACT_DOLLAR", "value": 2.5}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeRate {
    /// Flat dollars per contract/unit.
    PerContractDollar(Decimal),
    /// Percent of notional (price × size); `1` means 1%.
    PerContractPercent(Decimal),
}

impl FeeRate {
    pub fn mode_str(&self) -> &'static str {
        match self {
            FeeRate::PerContractDollar(_) => "PER_CONTRACT_DOLLAR",
            FeeRate::PerContractPercent(_) => "PER_CONTRACT_PERCENT",
        }
    }

    pub fn value(&self) -> Decimal {
        match self {
            FeeRate::PerContractDollar(v) | FeeRate::PerContractPercent(v) => *v,
        }
    }

    /// Rebuild from the (mode, value) column pair.
    pub fn from_mode(mode: &str, value: Decimal) -> Result<Self, UnknownVariant> {
        match mode {
            "PER_CONTRACT_DOLLAR" => Ok(FeeRate::PerContractDollar(value)),
            "PER_CONTRACT_PERCENT" => Ok(FeeRate::PerContractPercent(value)),
            other => Err(UnknownVariant {
                kind: "fee mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Asset-class fee matrix row: fallback rule, unique on (account, asset class).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFee {
    pub account_id: AccountId,
    pub asset_class: AssetClass,
    #[serde(flatten)]
    pub rate: FeeRate,
}

/// Per-symbol override, unique on (account, symbol). Highest precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerFee {
    pub account_id: AccountId,
    pub symbol: Symbol,
    #[serde(flatten)]
    pub rate: FeeRate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_rate_tagged_json() {
        let rate = FeeRate::PerContractDollar(Decimal::from_str_canonical("2.5").unwrap());
        let json = serde_json::to_value(rate).unwrap();
        assert_eq!(json["mode"], "PER_CONTRACT_DOLLAR");
        assert_eq!(json["value"], 2.5);

        let parsed: FeeRate =
            serde_json::from_str(r#"{"mode":"PER_CONTRACT_PERCENT","value":1}"#).unwrap();
        assert_eq!(parsed, FeeRate::PerContractPercent(Decimal::one()));
    }

    #[test]
    fn test_fee_rate_from_mode_rejects_unknown() {
        assert!(FeeRate::from_mode("FLAT", Decimal::one()).is_err());
        assert_eq!(
            FeeRate::from_mode("PER_CONTRACT_DOLLAR", Decimal::one()),
            Ok(FeeRate::PerContractDollar(Decimal::one()))
        );
    }

    #[test]
    fn test_account_fee_row_flattens_rate() {
        let row = AccountFee {
            account_id: AccountId::new("acc-1"),
            asset_class: AssetClass::Stock,
            rate: FeeRate::PerContractPercent(Decimal::one()),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["assetClass"], "STOCK");
        assert_eq!(json["mode"], "PER_CONTRACT_PERCENT");
    }

    #[test]
    fn test_has_futures_defaults() {
        let account = Account::new("Main", "USD");
        assert!(!account.has_futures_defaults());
        let account = account.with_futures_defaults(None, Some(Decimal::one()));
        assert!(account.has_futures_defaults());
    }
}
