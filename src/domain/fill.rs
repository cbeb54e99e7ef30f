//! Fill type representing one execution of a trade's entry or exit.

use crate::domain::{Decimal, FillId, FillType, TimeMs, TradeId};
use serde::{Deserialize, Serialize};

/// A single (possibly partial) entry or exit execution.
///
/// Fills reaching the engine are assumed valid: positive size and
/// non-negative price. The journal rejects anything else at its boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    pub id: FillId,
    pub trade_id: TradeId,
    #[serde(rename = "type")]
    pub fill_type: FillType,
    pub price: Decimal,
    pub size: Decimal,
    pub time: TimeMs,
}

impl Fill {
    pub fn new(
        trade_id: TradeId,
        fill_type: FillType,
        price: Decimal,
        size: Decimal,
        time: TimeMs,
    ) -> Self {
        Fill {
            id: FillId::generate(),
            trade_id,
            fill_type,
            price,
            size,
            time,
        }
    }

    pub fn is_entry(&self) -> bool {
        self.fill_type == FillType::Entry
    }

    pub fn is_exit(&self) -> bool {
        self.fill_type == FillType::Exit
    }

    /// price × size.
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// Total size of fills of one type.
pub fn total_size(fills: &[Fill], fill_type: FillType) -> Decimal {
    fills
        .iter()
        .filter(|f| f.fill_type == fill_type)
        .map(|f| f.size)
        .sum()
}

/// Matched (closed) quantity: min(total entered, total exited).
pub fn realized_quantity(fills: &[Fill]) -> Decimal {
    total_size(fills, FillType::Entry).min(total_size(fills, FillType::Exit))
}
