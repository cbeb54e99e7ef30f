//! Pure computation engines: classification, fees, aggregation, PnL and risk.
//!
//! Nothing in here touches storage or the network.

use crate::domain::{Decimal, Fill, Trade};
use serde::Serialize;

pub mod aggregate;
pub mod equity;
pub mod fees;
pub mod instrument;
pub mod pnl;
pub mod risk;

pub use aggregate::{aggregate, FillSummary};
pub use equity::{build_equity_curve, daily_pnl, CashFlow, DailyPnl, EquityPoint, RealizedEvent};
pub use fees::{
    compute_fee, explain, resolve_rule, FeeBreakdown, FeeOutcome, FeeResolver, FeeRuleSource,
    FeeSchedule, ResolvedRule,
};
pub use instrument::{ContractSize, Instrument};
pub use pnl::{directional_pnl, realized_pnl};
pub use risk::{calc_risk_reward, trade_metrics, RiskMetrics};

/// Read-side analytics for one trade. Always derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeAnalytics {
    pub pnl: Option<Decimal>,
    pub hold_time_seconds: Option<Decimal>,
    pub metrics: Option<RiskMetrics>,
    pub summary: FillSummary,
}

/// Aggregate, then derive PnL (net of stored fees) and planned risk.
pub fn analyze(trade: &Trade, fills: &[Fill]) -> TradeAnalytics {
    let summary = aggregate(trade, fills);
    let instrument = Instrument::for_trade(trade);
    let pnl = realized_pnl(
        &summary,
        trade.direction_or_long(),
        instrument.point_value,
        trade.fees_or_zero(),
    );
    TradeAnalytics {
        pnl,
        hold_time_seconds: summary.hold_time_seconds,
        metrics: trade_metrics(trade, &summary),
        summary,
    }
}
