//! Domain primitives: TimeMs, ids, Symbol, AssetClass, Direction, FillType.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// UTC calendar day containing this instant.
    pub fn utc_date(&self) -> Option<NaiveDate> {
        DateTime::<Utc>::from_timestamp_millis(self.0).map(|dt| dt.date_naive())
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            /// Fresh random (v4) identifier.
            pub fn generate() -> Self {
                $name(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Trading account identifier.
    AccountId
);
string_id!(
    /// Trade identifier.
    TradeId
);
string_id!(
    /// Fill identifier.
    FillId
);

/// Instrument symbol as entered or imported (e.g. "AAPL", "MES=F", "METX25.CME").
///
/// Fee overrides match on the exact string, so no normalization happens here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Symbol(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored enum column held a value we do not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Coarse instrument category used by the asset-class fee matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetClass {
    Stock,
    Option,
    Future,
    Forex,
    Crypto,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stock => "STOCK",
            AssetClass::Option => "OPTION",
            AssetClass::Future => "FUTURE",
            AssetClass::Forex => "FOREX",
            AssetClass::Crypto => "CRYPTO",
        }
    }
}

impl FromStr for AssetClass {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STOCK" => Ok(AssetClass::Stock),
            "OPTION" => Ok(AssetClass::Option),
            "FUTURE" => Ok(AssetClass::Future),
            "FOREX" => Ok(AssetClass::Forex),
            "CRYPTO" => Ok(AssetClass::Crypto),
            other => Err(UnknownVariant {
                kind: "asset class",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade direction. A trade without a direction is treated as long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Long,
    Short,
}

impl Direction {
    /// Signed multiplier for PnL: +1 long, -1 short.
    pub fn sign(&self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }

    /// Resolve a nullable stored direction.
    pub fn or_long(direction: Option<Direction>) -> Direction {
        direction.unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl FromStr for Direction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LONG" => Ok(Direction::Long),
            "SHORT" => Ok(Direction::Short),
            other => Err(UnknownVariant {
                kind: "direction",
                value: other.to_string(),
            }),
        }
    }
}

/// Which side of the trade a fill executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FillType {
    Entry,
    Exit,
}

impl FillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillType::Entry => "ENTRY",
            FillType::Exit => "EXIT",
        }
    }
}

impl FromStr for FillType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENTRY" => Ok(FillType::Entry),
            "EXIT" => Ok(FillType::Exit),
            other => Err(UnknownVariant {
                kind: "fill type",
                value: other.to_string(),
            }),
        }
    }
}
