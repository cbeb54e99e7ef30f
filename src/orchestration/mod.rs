//! Coordinates storage, fee resolution and instrument lookups.
//!
//! This module provides:
//! - Fee recalculation per trade and account-wide with bounded concurrency
//! - The journal mutation surface that keeps stored fees consistent

pub mod journal;
pub mod recalc;

pub use journal::{
    AccountPerformance, FillEdit, FillInput, Journal, NewTrade, TradeEdit, TradeView,
};
pub use recalc::{FeeRecalculator, RecalcError};
