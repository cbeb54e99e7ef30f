//! Fill aggregation: weighted averages, quantities and hold time.

use crate::domain::ordering::sorted_fills;
use crate::domain::{Decimal, Fill, FillType, TimeMs, Trade};
use serde::Serialize;

/// Aggregated view of a trade's executions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillSummary {
    pub avg_entry_price: Option<Decimal>,
    pub avg_exit_price: Option<Decimal>,
    pub qty_entry: Decimal,
    pub qty_exit: Decimal,
    pub realized_qty: Decimal,
    pub first_entry_time: Option<TimeMs>,
    pub last_exit_time: Option<TimeMs>,
    pub hold_time_seconds: Option<Decimal>,
}

/// Size-weighted average price of one side, `None` without fills on that side.
fn weighted_average(fills: &[Fill], fill_type: FillType) -> (Option<Decimal>, Decimal) {
    let (notional, qty) = fills
        .iter()
        .filter(|f| f.fill_type == fill_type)
        .fold((Decimal::zero(), Decimal::zero()), |(notional, qty), f| {
            (notional + f.notional(), qty + f.size)
        });
    (notional.checked_div(qty), qty)
}

/// Seconds between two instants, millisecond precision.
fn seconds_between(start: TimeMs, end: TimeMs) -> Decimal {
    Decimal::from_parts(end.as_ms() - start.as_ms(), 3)
}

/// Summarize a trade from its fills, or from the scalar fields when it has none.
pub fn aggregate(trade: &Trade, fills: &[Fill]) -> FillSummary {
    if fills.is_empty() {
        return legacy_summary(trade);
    }

    let fills = sorted_fills(fills);
    let (avg_entry_price, qty_entry) = weighted_average(&fills, FillType::Entry);
    let (avg_exit_price, qty_exit) = weighted_average(&fills, FillType::Exit);

    let first_entry_time = fills
        .iter()
        .find(|f| f.is_entry())
        .map(|f| f.time)
        .or(Some(trade.entry_time));
    let last_exit_time = fills
        .iter()
        .rev()
        .find(|f| f.is_exit())
        .map(|f| f.time)
        .or(trade.exit_time);

    FillSummary {
        avg_entry_price,
        avg_exit_price,
        qty_entry,
        qty_exit,
        realized_qty: qty_entry.min(qty_exit),
        first_entry_time,
        last_exit_time,
        hold_time_seconds: first_entry_time
            .zip(last_exit_time)
            .map(|(start, end)| seconds_between(start, end)),
    }
}

fn legacy_summary(trade: &Trade) -> FillSummary {
    let qty_exit = if trade.is_exited() {
        trade.size
    } else {
        Decimal::zero()
    };
    FillSummary {
        avg_entry_price: Some(trade.entry_price),
        avg_exit_price: trade.exit_price,
        qty_entry: trade.size,
        qty_exit,
        realized_qty: qty_exit,
        first_entry_time: Some(trade.entry_time),
        last_exit_time: trade.exit_time,
        hold_time_seconds: trade
            .exit_time
            .map(|exit| seconds_between(trade.entry_time, exit)),
    }
}
