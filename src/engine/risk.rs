//! Planned risk, reward and R-multiple.

use crate::domain::{Decimal, Direction, Trade};
use crate::engine::aggregate::FillSummary;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub risk: Decimal,
    pub reward: Decimal,
    /// `None` when risk is zero.
    pub r_multiple: Option<Decimal>,
}

pub fn calc_risk_reward(
    entry: Decimal,
    stop: Decimal,
    target: Decimal,
    size: Decimal,
    direction: Direction,
) -> RiskMetrics {
    let (raw_risk, raw_reward) = match direction {
        Direction::Long => (entry - stop, target - entry),
        Direction::Short => (stop - entry, entry - target),
    };
    let risk = raw_risk.abs() * size;
    let reward = raw_reward.abs() * size;
    RiskMetrics {
        risk,
        reward,
        r_multiple: reward.checked_div(risk),
    }
}

/// Metrics on the planned position: weighted entry average, full entered size.
///
/// Absent unless both stop and target are set and something was entered.
pub fn trade_metrics(trade: &Trade, summary: &FillSummary) -> Option<RiskMetrics> {
    let stop = trade.stop_price?;
    let target = trade.target_price?;
    let entry = summary.avg_entry_price?;
    if !summary.qty_entry.is_positive() {
        return None;
    }
    Some(calc_risk_reward(
        entry,
        stop,
        target,
        summary.qty_entry,
        trade.direction_or_long(),
    ))
}
