//! Stable fill ordering for deterministic aggregation.

use crate::domain::Fill;

/// Stable ordering key for fills.
///
/// Ordering: time -> fill id. Two fills at the same millisecond always sort
/// the same way, so first/last timestamps and averages never depend on
/// storage order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FillOrderingKey<'a> {
    pub time_ms: i64,
    pub fill_id: &'a str,
}

impl<'a> FillOrderingKey<'a> {
    pub fn from_fill(fill: &'a Fill) -> Self {
        FillOrderingKey {
            time_ms: fill.time.as_ms(),
            fill_id: fill.id.as_str(),
        }
    }
}

/// Sort fills deterministically.
pub fn sort_fills_deterministic(fills: &mut [Fill]) {
    fills.sort_by(|a, b| FillOrderingKey::from_fill(a).cmp(&FillOrderingKey::from_fill(b)));
}

/// Sorted copy, leaving the caller's slice untouched.
pub fn sorted_fills(fills: &[Fill]) -> Vec<Fill> {
    let mut sorted = fills.to_vec();
    sort_fills_deterministic(&mut sorted);
    sorted
}
