//! Domain types for the trade journal.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Primitives: TimeMs, ids, Symbol, AssetClass, Direction, FillType
//! - Account fee configuration with the tagged FeeRate rule shape
//! - Trade and Fill records plus a stable fill ordering helper

pub mod account;
pub mod decimal;
pub mod fill;
pub mod ordering;
pub mod primitives;
pub mod trade;

pub use account::{Account, AccountFee, FeeRate, TickerFee};
pub use decimal::Decimal;
pub use fill::Fill;
pub use ordering::FillOrderingKey;
pub use primitives::{
    AccountId, AssetClass, Direction, FillId, FillType, Symbol, TimeMs, TradeId, UnknownVariant,
};
pub use trade::{Trade, TradeScope};
