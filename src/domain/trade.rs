//! Trade record.

use crate::domain::{
    AccountId, AssetClass, Decimal, Direction, Symbol, TimeMs, TradeId, UnknownVariant,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which trades of an account a batch operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeScope {
    /// Every trade, soft-deleted ones included.
    #[default]
    All,
    /// Only trades that are not soft-deleted.
    Active,
}

impl TradeScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeScope::All => "all",
            TradeScope::Active => "active",
        }
    }
}

impl FromStr for TradeScope {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TradeScope::All),
            "active" => Ok(TradeScope::Active),
            other => Err(UnknownVariant {
                kind: "trade scope",
                value: other.to_string(),
            }),
        }
    }
}

/// A journaled trade.
///
/// The scalar `size` / `entry_price` / `exit_price` fields are the legacy
/// single-execution representation; they only drive computations when the
/// trade has no fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: TradeId,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub asset_class: AssetClass,
    pub direction: Option<Direction>,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub entry_time: TimeMs,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<TimeMs>,
    pub stop_price: Option<Decimal>,
    pub target_price: Option<Decimal>,
    /// Persisted fee total; output of the fee resolver or set explicitly.
    pub fees: Option<Decimal>,
    pub deleted_at: Option<TimeMs>,
    /// Bumped on every fill mutation or field edit.
    pub revision: i64,
}

impl Trade {
    /// Open long trade with only the required fields set.
    pub fn new(
        account_id: AccountId,
        symbol: Symbol,
        asset_class: AssetClass,
        size: Decimal,
        entry_price: Decimal,
        entry_time: TimeMs,
    ) -> Self {
        Trade {
            id: TradeId::generate(),
            account_id,
            symbol,
            asset_class,
            direction: None,
            size,
            entry_price,
            entry_time,
            exit_price: None,
            exit_time: None,
            stop_price: None,
            target_price: None,
            fees: None,
            deleted_at: None,
            revision: 0,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_exit(mut self, exit_price: Decimal, exit_time: TimeMs) -> Self {
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);
        self
    }

    pub fn with_plan(mut self, stop_price: Decimal, target_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self.target_price = Some(target_price);
        self
    }

    pub fn with_fees(mut self, fees: Decimal) -> Self {
        self.fees = Some(fees);
        self
    }

    pub fn direction_or_long(&self) -> Direction {
        Direction::or_long(self.direction)
    }

    /// Legacy exit recorded.
    pub fn is_exited(&self) -> bool {
        self.exit_price.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Stored fees, null treated as zero.
    pub fn fees_or_zero(&self) -> Decimal {
        self.fees.unwrap_or_default()
    }
}
