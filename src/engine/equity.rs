//! Equity curve and per-day PnL built from realized trade results.

use crate::domain::{Decimal, TimeMs, Trade, TradeId};
use crate::engine::TradeAnalytics;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// One closed trade's contribution to equity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedEvent {
    pub trade_id: TradeId,
    pub time: TimeMs,
    pub pnl: Decimal,
}

impl RealizedEvent {
    /// Dated at the last exit, falling back to the entry time.
    pub fn from_analytics(trade: &Trade, analytics: &TradeAnalytics) -> Option<Self> {
        let pnl = analytics.pnl?;
        let time = analytics
            .summary
            .last_exit_time
            .or(trade.exit_time)
            .unwrap_or(trade.entry_time);
        Some(RealizedEvent {
            trade_id: trade.id.clone(),
            time,
            pnl,
        })
    }
}

/// Deposit (positive) or withdrawal (negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlow {
    pub time: TimeMs,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    pub time: TimeMs,
    pub equity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPnl {
    pub date: NaiveDate,
    pub pnl: Decimal,
    pub trades: usize,
}

/// Running equity after each realized event or cash flow, in time order.
///
/// At equal timestamps cash flows apply before trade results.
pub fn build_equity_curve(realized: &[RealizedEvent], cash: &[CashFlow]) -> Vec<EquityPoint> {
    let mut deltas: Vec<(TimeMs, u8, Decimal)> = cash
        .iter()
        .map(|c| (c.time, 0, c.amount))
        .chain(realized.iter().map(|r| (r.time, 1, r.pnl)))
        .collect();
    deltas.sort_by_key(|(time, order, _)| (*time, *order));

    let mut equity = Decimal::zero();
    deltas
        .into_iter()
        .map(|(time, _, delta)| {
            equity = equity + delta;
            EquityPoint { time, equity }
        })
        .collect()
}

/// Realized PnL grouped by UTC calendar day, oldest first.
pub fn daily_pnl(realized: &[RealizedEvent]) -> Vec<DailyPnl> {
    let mut days: BTreeMap<NaiveDate, (Decimal, usize)> = BTreeMap::new();
    for event in realized {
        let Some(date) = event.time.utc_date() else {
            continue;
        };
        let entry = days.entry(date).or_insert((Decimal::zero(), 0));
        entry.0 = entry.0 + event.pnl;
        entry.1 += 1;
    }
    days.into_iter()
        .map(|(date, (pnl, trades))| DailyPnl { date, pnl, trades })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 86_400_000;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn event(id: &str, time: i64, pnl: &str) -> RealizedEvent {
        RealizedEvent {
            trade_id: TradeId::new(id),
            time: TimeMs::new(time),
            pnl: d(pnl),
        }
    }

    #[test]
    fn test_equity_curve_is_cumulative_in_time_order() {
        let realized = vec![event("t2", 3_000, "-20"), event("t1", 2_000, "50")];
        let cash = vec![CashFlow {
            time: TimeMs::new(2_000),
            amount: d("1000"),
        }];

        let curve = build_equity_curve(&realized, &cash);
        let values: Vec<Decimal> = curve.iter().map(|p| p.equity).collect();
        assert_eq!(values, vec![d("1000"), d("1050"), d("1030")]);
        assert_eq!(curve[2].time, TimeMs::new(3_000));
    }

    #[test]
    fn test_daily_pnl_groups_by_utc_day() {
        let realized = vec![
            event("t1", DAY_MS + 1_000, "10"),
            event("t2", 2 * DAY_MS - 1, "-4"),
            event("t3", 2 * DAY_MS, "7.5"),
        ];

        let days = daily_pnl(&realized);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(1970, 1, 2).unwrap());
        assert_eq!(days[0].pnl, d("6"));
        assert_eq!(days[0].trades, 2);
        assert_eq!(days[1].pnl, d("7.5"));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(build_equity_curve(&[], &[]).is_empty());
        assert!(daily_pnl(&[]).is_empty());
    }
}
