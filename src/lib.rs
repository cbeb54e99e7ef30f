pub mod cache;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod locks;
pub mod orchestration;

pub use cache::{Cache, MemoryCache};
pub use config::Config;
pub use datasource::{
    DataSourceError, InstrumentSource, MicroHintResolver, MockInstrumentSource,
    YahooInstrumentSource,
};
pub use db::{init_db, Repository};
pub use domain::{
    Account, AccountId, AssetClass, Decimal, Direction, FeeRate, Fill, FillType, Symbol, TimeMs,
    Trade, TradeId, TradeScope,
};
pub use error::AppError;
pub use locks::KeyedLocks;
pub use orchestration::{FeeRecalculator, Journal};
