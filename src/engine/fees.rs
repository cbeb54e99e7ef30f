//! Fee rule resolution and fee computation.
//!
//! Resolution order is fixed: ticker override, futures default, asset class
//! matrix. When none applies the caller keeps whatever fee is stored.

use crate::domain::fill::{realized_quantity, total_size};
use crate::domain::{
    Account, AccountFee, AssetClass, Decimal, FeeRate, Fill, FillType, TickerFee, Trade,
};
use crate::engine::instrument::{self, ContractSize};
use serde::Serialize;
use std::collections::HashMap;

/// Everything fee-related configured on one account, built once per account
/// and shared across all of its trades.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeSchedule {
    pub mini_default: Option<Decimal>,
    pub micro_default: Option<Decimal>,
    pub ticker_fees: HashMap<String, FeeRate>,
    pub asset_class_fees: HashMap<AssetClass, FeeRate>,
}

impl FeeSchedule {
    pub fn from_parts(
        account: &Account,
        account_fees: &[AccountFee],
        ticker_fees: &[TickerFee],
    ) -> Self {
        FeeSchedule {
            mini_default: account.default_fee_per_mini_contract,
            micro_default: account.default_fee_per_micro_contract,
            ticker_fees: ticker_fees
                .iter()
                .map(|tf| (tf.symbol.as_str().to_string(), tf.rate))
                .collect(),
            asset_class_fees: account_fees
                .iter()
                .map(|af| (af.asset_class, af.rate))
                .collect(),
        }
    }

    pub fn has_futures_defaults(&self) -> bool {
        self.mini_default.is_some() || self.micro_default.is_some()
    }
}

/// Where a resolved rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeRuleSource {
    TickerOverride,
    FuturesDefault(ContractSize),
    AssetClassMatrix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRule {
    pub source: FeeRuleSource,
    pub rate: FeeRate,
    /// Dollar rate charged once per realized contract instead of per side.
    pub round_trip: bool,
}

impl ResolvedRule {
    fn new(source: FeeRuleSource, rate: FeeRate, is_futures: bool) -> Self {
        let round_trip = is_futures
            && matches!(rate, FeeRate::PerContractDollar(_))
            && matches!(
                source,
                FeeRuleSource::TickerOverride | FeeRuleSource::FuturesDefault(_)
            );
        ResolvedRule {
            source,
            rate,
            round_trip,
        }
    }
}

/// Result of running the resolver on one trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeOutcome {
    Computed(Decimal),
    /// No rule applies; the stored fee must be left untouched.
    NoRule,
}

impl FeeOutcome {
    pub fn computed(&self) -> Option<Decimal> {
        match self {
            FeeOutcome::Computed(fee) => Some(*fee),
            FeeOutcome::NoRule => None,
        }
    }
}

/// Pick the futures default for the trade's contract size.
///
/// The matching default wins when configured; otherwise micro, then mini.
fn futures_default(
    schedule: &FeeSchedule,
    size: Option<ContractSize>,
) -> Option<(ContractSize, Decimal)> {
    match (size, schedule.micro_default, schedule.mini_default) {
        (Some(ContractSize::Micro), Some(micro), _) => Some((ContractSize::Micro, micro)),
        (Some(ContractSize::Mini), _, Some(mini)) => Some((ContractSize::Mini, mini)),
        (_, Some(micro), _) => Some((ContractSize::Micro, micro)),
        (_, None, Some(mini)) => Some((ContractSize::Mini, mini)),
        (_, None, None) => None,
    }
}

/// Find the applicable rule for a trade.
pub fn resolve_rule(
    trade: &Trade,
    schedule: &FeeSchedule,
    micro_hint: Option<bool>,
) -> Option<ResolvedRule> {
    let is_futures = instrument::is_futures_trade(trade);

    if let Some(rate) = schedule.ticker_fees.get(trade.symbol.as_str()) {
        return Some(ResolvedRule::new(FeeRuleSource::TickerOverride, *rate, is_futures));
    }

    if is_futures && schedule.has_futures_defaults() {
        let size = instrument::contract_size(trade.symbol.as_str(), micro_hint);
        if let Some((size, value)) = futures_default(schedule, size) {
            return Some(ResolvedRule::new(
                FeeRuleSource::FuturesDefault(size),
                FeeRate::PerContractDollar(value),
                is_futures,
            ));
        }
    }

    schedule
        .asset_class_fees
        .get(&trade.asset_class)
        .map(|rate| ResolvedRule::new(FeeRuleSource::AssetClassMatrix, *rate, is_futures))
}

/// Contracts charged by a round-trip rule.
fn round_trip_quantity(trade: &Trade, fills: &[Fill]) -> Decimal {
    if !fills.is_empty() {
        return realized_quantity(fills);
    }
    if trade.is_exited() {
        trade.size
    } else {
        Decimal::zero()
    }
}

/// Apply a resolved rule to a trade and its fills. Rounded to 6 dp.
pub fn compute_fee(trade: &Trade, fills: &[Fill], rule: &ResolvedRule) -> Decimal {
    let raw = match rule.rate {
        FeeRate::PerContractDollar(value) if rule.round_trip => {
            value * round_trip_quantity(trade, fills)
        }
        FeeRate::PerContractDollar(value) => {
            if fills.is_empty() {
                let sides = if trade.is_exited() { 2 } else { 1 };
                value * trade.size * Decimal::from_i64(sides)
            } else {
                value * fills.iter().map(|f| f.size).sum::<Decimal>()
            }
        }
        FeeRate::PerContractPercent(value) => {
            let pct = value / Decimal::hundred();
            if fills.is_empty() {
                let entry_side = trade.entry_price * trade.size * pct;
                let exit_side = trade
                    .exit_price
                    .map(|exit| exit * trade.size * pct)
                    .unwrap_or_default();
                entry_side + exit_side
            } else {
                fills.iter().map(|f| f.notional() * pct).sum()
            }
        }
    };
    raw.round_fee()
}

/// Stateless entry point combining resolution and computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeResolver;

impl FeeResolver {
    pub fn compute(
        trade: &Trade,
        fills: &[Fill],
        schedule: &FeeSchedule,
        micro_hint: Option<bool>,
    ) -> FeeOutcome {
        match resolve_rule(trade, schedule, micro_hint) {
            Some(rule) => FeeOutcome::Computed(compute_fee(trade, fills, &rule)),
            None => FeeOutcome::NoRule,
        }
    }
}

/// Diagnostic view of how a trade's fee was (or would be) derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub is_futures: bool,
    pub heuristic_micro: bool,
    pub micro_hint: Option<bool>,
    pub contract_size: Option<ContractSize>,
    pub mini_default: Option<Decimal>,
    pub micro_default: Option<Decimal>,
    pub rule: Option<ResolvedRule>,
    pub qty_entry: Decimal,
    pub qty_exit: Decimal,
    pub realized_qty: Decimal,
    pub expected_fees: Option<Decimal>,
    pub stored_fees: Option<Decimal>,
}

pub fn explain(
    trade: &Trade,
    fills: &[Fill],
    schedule: &FeeSchedule,
    micro_hint: Option<bool>,
) -> FeeBreakdown {
    let symbol = trade.symbol.as_str();
    let is_futures = instrument::is_futures_trade(trade);
    let rule = resolve_rule(trade, schedule, micro_hint);

    let (qty_entry, qty_exit) = if fills.is_empty() {
        let exited = if trade.is_exited() { trade.size } else { Decimal::zero() };
        (trade.size, exited)
    } else {
        (total_size(fills, FillType::Entry), total_size(fills, FillType::Exit))
    };

    FeeBreakdown {
        symbol: symbol.to_string(),
        asset_class: trade.asset_class,
        is_futures,
        heuristic_micro: instrument::is_micro_futures_symbol(symbol, None),
        micro_hint,
        contract_size: if is_futures {
            instrument::contract_size(symbol, micro_hint)
        } else {
            None
        },
        mini_default: schedule.mini_default,
        micro_default: schedule.micro_default,
        rule,
        qty_entry,
        qty_exit,
        realized_qty: qty_entry.min(qty_exit),
        expected_fees: rule.map(|r| compute_fee(trade, fills, &r)),
        stored_fees: trade.fees,
    }
}
