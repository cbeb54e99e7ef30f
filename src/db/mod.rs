//! SQLite persistence for the journal.
//!
//! - `migrations` - opening the file, pragmas, schema and column upgrades
//! - `repo` - accounts, fee rules, trades and fills, plus the bundles the
//!   fee recalculation reads in one transaction

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{AccountBundle, Repository, TradeBundle};
