//! Direction-aware realized PnL.

use crate::domain::{Decimal, Direction};
use crate::engine::aggregate::FillSummary;

/// `sign × (exit − entry) × qty × point_value − fees`.
pub fn directional_pnl(
    entry: Decimal,
    exit: Decimal,
    qty: Decimal,
    direction: Direction,
    point_value: Decimal,
    fees: Decimal,
) -> Decimal {
    let sign = Decimal::from_i64(direction.sign());
    sign * (exit - entry) * qty * point_value - fees
}

/// Realized PnL on the matched quantity; `None` while nothing is closed.
pub fn realized_pnl(
    summary: &FillSummary,
    direction: Direction,
    point_value: Decimal,
    fees: Decimal,
) -> Option<Decimal> {
    let entry = summary.avg_entry_price?;
    let exit = summary.avg_exit_price?;
    if summary.realized_qty.is_zero() {
        return None;
    }
    Some(directional_pnl(
        entry,
        exit,
        summary.realized_qty,
        direction,
        point_value,
        fees,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeMs;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn summary(entry: Option<&str>, exit: Option<&str>, realized: &str) -> FillSummary {
        FillSummary {
            avg_entry_price: entry.map(d),
            avg_exit_price: exit.map(d),
            qty_entry: d(realized),
            qty_exit: d(realized),
            realized_qty: d(realized),
            first_entry_time: Some(TimeMs::new(0)),
            last_exit_time: None,
            hold_time_seconds: None,
        }
    }

    #[test]
    fn test_long_and_short_pnl() {
        let long =
            directional_pnl(d("100"), d("105"), d("10"), Direction::Long, Decimal::one(), d("2"));
        assert_eq!(long, d("48"));

        let short =
            directional_pnl(d("100"), d("105"), d("10"), Direction::Short, Decimal::one(), d("2"));
        assert_eq!(short, d("-52"));
    }

    #[test]
    fn test_point_value_scaling() {
        let pnl = directional_pnl(d("4500"), d("4510"), d("2"), Direction::Long, d("2"), d("1"));
        assert_eq!(pnl, d("39"));
    }

    #[test]
    fn test_realized_pnl_requires_closed_quantity() {
        assert_eq!(
            realized_pnl(
                &summary(Some("100"), None, "0"),
                Direction::Long,
                Decimal::one(),
                Decimal::zero()
            ),
            None
        );
        assert_eq!(
            realized_pnl(
                &summary(Some("100"), Some("101"), "0"),
                Direction::Long,
                Decimal::one(),
                Decimal::zero()
            ),
            None
        );
        assert_eq!(
            realized_pnl(
                &summary(Some("100"), Some("101"), "3"),
                Direction::Short,
                Decimal::one(),
                Decimal::zero()
            ),
            Some(d("-3"))
        );
    }
}
