//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `mod.rs` - Accounts and fee configuration
//! - `trades.rs` - Trades, fills, and the batch loaders used by fee recalculation

mod trades;

use crate::domain::{
    Account, AccountFee, AccountId, AssetClass, Decimal, FeeRate, Fill, Symbol, TickerFee, Trade,
    UnknownVariant,
};
use crate::engine::FeeSchedule;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// One trade with everything needed to compute its fee, read in a single
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeBundle {
    pub trade: Trade,
    pub fills: Vec<Fill>,
    pub account: Account,
    pub account_fees: Vec<AccountFee>,
    pub ticker_fees: Vec<TickerFee>,
}

impl TradeBundle {
    pub fn schedule(&self) -> FeeSchedule {
        FeeSchedule::from_parts(&self.account, &self.account_fees, &self.ticker_fees)
    }
}

/// An account's fee configuration plus all of its trades and their fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBundle {
    pub account: Account,
    pub account_fees: Vec<AccountFee>,
    pub ticker_fees: Vec<TickerFee>,
    pub trades: Vec<(Trade, Vec<Fill>)>,
}

impl AccountBundle {
    pub fn schedule(&self) -> FeeSchedule {
        FeeSchedule::from_parts(&self.account, &self.account_fees, &self.ticker_fees)
    }
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    // =========================================================================
    // Account operations
    // =========================================================================

    /// Insert a new account.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including a duplicate id).
    pub async fn insert_account(&self, account: &Account) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, name, currency, default_fee_per_mini_contract,
                default_fee_per_micro_contract, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.as_str())
        .bind(account.name.as_str())
        .bind(account.currency.as_str())
        .bind(account.default_fee_per_mini_contract.map(|d| d.to_canonical_string()))
        .bind(account.default_fee_per_micro_contract.map(|d| d.to_canonical_string()))
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an account by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_account(&mut conn, id).await
    }

    /// Overwrite both futures defaults. Returns false if the account is missing.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_account_defaults(
        &self,
        id: &AccountId,
        mini: Option<Decimal>,
        micro: Option<Decimal>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET default_fee_per_mini_contract = ?, default_fee_per_micro_contract = ?
            WHERE id = ?
            "#,
        )
        .bind(mini.map(|d| d.to_canonical_string()))
        .bind(micro.map(|d| d.to_canonical_string()))
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Fee configuration operations
    // =========================================================================

    /// Upsert asset-class fee rows in a single transaction.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_account_fees(
        &self,
        account_id: &AccountId,
        rules: &[(AssetClass, FeeRate)],
    ) -> Result<usize, sqlx::Error> {
        if rules.is_empty() {
            return Ok(0);
        }

        let mut written = 0usize;
        let mut tx = self.pool.begin().await?;

        for (asset_class, rate) in rules {
            let result = sqlx::query(
                r#"
                INSERT INTO account_fees (account_id, asset_class, mode, value)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(account_id, asset_class) DO UPDATE SET
                    mode = excluded.mode,
                    value = excluded.value
                "#,
            )
            .bind(account_id.as_str())
            .bind(asset_class.as_str())
            .bind(rate.mode_str())
            .bind(rate.value().to_canonical_string())
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(written)
    }

    /// Upsert or delete per-symbol overrides in a single transaction.
    ///
    /// A `None` rate removes the override for that symbol. Returns the number
    /// of rows changed.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn apply_ticker_fees(
        &self,
        account_id: &AccountId,
        changes: &[(Symbol, Option<FeeRate>)],
    ) -> Result<usize, sqlx::Error> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut changed = 0usize;
        let mut tx = self.pool.begin().await?;

        for (symbol, rate) in changes {
            let result = match rate {
                Some(rate) => {
                    sqlx::query(
                        r#"
                        INSERT INTO ticker_fees (account_id, symbol, mode, value)
                        VALUES (?, ?, ?, ?)
                        ON CONFLICT(account_id, symbol) DO UPDATE SET
                            mode = excluded.mode,
                            value = excluded.value
                        "#,
                    )
                    .bind(account_id.as_str())
                    .bind(symbol.as_str())
                    .bind(rate.mode_str())
                    .bind(rate.value().to_canonical_string())
                    .execute(&mut *tx)
                    .await?
                }
                None => {
                    sqlx::query("DELETE FROM ticker_fees WHERE account_id = ? AND symbol = ?")
                        .bind(account_id.as_str())
                        .bind(symbol.as_str())
                        .execute(&mut *tx)
                        .await?
                }
            };

            changed += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(changed)
    }

    /// List the asset-class fee matrix of an account.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored mode is unknown.
    pub async fn list_account_fees(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<AccountFee>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_account_fees(&mut conn, account_id).await
    }

    /// List the per-symbol overrides of an account.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored mode is unknown.
    pub async fn list_ticker_fees(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<TickerFee>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_ticker_fees(&mut conn, account_id).await
    }
}

// =============================================================================
// Row helpers
// =============================================================================

/// Decimal TEXT column; unparsable values are logged and defaulted.
fn decimal_column(row: &SqliteRow, column: &str, id: &str) -> Decimal {
    let raw: String = row.get(column);
    Decimal::from_str(&raw).unwrap_or_else(|e| {
        warn!(
            id = %id,
            column,
            value = %raw,
            error = %e,
            "Failed to parse decimal column, using default"
        );
        Decimal::default()
    })
}

/// Nullable decimal TEXT column; unparsable values are logged and read as null.
fn optional_decimal_column(row: &SqliteRow, column: &str, id: &str) -> Option<Decimal> {
    let raw: Option<String> = row.get(column);
    raw.and_then(|raw| match Decimal::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                id = %id,
                column,
                value = %raw,
                error = %e,
                "Failed to parse decimal column, using null"
            );
            None
        }
    })
}

/// Enum TEXT column; an unknown value is a decode error.
fn enum_column<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.get(column);
    raw.parse::<T>().map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn fee_rate_columns(row: &SqliteRow, id: &str) -> Result<FeeRate, sqlx::Error> {
    let mode: String = row.get("mode");
    let value = decimal_column(row, "value", id);
    FeeRate::from_mode(&mode, value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn account_from_row(row: &SqliteRow) -> Account {
    let id: String = row.get("id");
    Account {
        default_fee_per_mini_contract: optional_decimal_column(
            row,
            "default_fee_per_mini_contract",
            &id,
        ),
        default_fee_per_micro_contract: optional_decimal_column(
            row,
            "default_fee_per_micro_contract",
            &id,
        ),
        name: row.get("name"),
        currency: row.get("currency"),
        id: AccountId::new(id),
    }
}

async fn fetch_account(
    conn: &mut SqliteConnection,
    id: &AccountId,
) -> Result<Option<Account>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, name, currency, default_fee_per_mini_contract, default_fee_per_micro_contract
        FROM accounts
        WHERE id = ?
        "#,
    )
    .bind(id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(account_from_row))
}

async fn fetch_account_fees(
    conn: &mut SqliteConnection,
    account_id: &AccountId,
) -> Result<Vec<AccountFee>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT asset_class, mode, value
        FROM account_fees
        WHERE account_id = ?
        ORDER BY asset_class ASC
        "#,
    )
    .bind(account_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(AccountFee {
                account_id: account_id.clone(),
                asset_class: enum_column(row, "asset_class")?,
                rate: fee_rate_columns(row, account_id.as_str())?,
            })
        })
        .collect()
}

async fn fetch_ticker_fees(
    conn: &mut SqliteConnection,
    account_id: &AccountId,
) -> Result<Vec<TickerFee>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT symbol, mode, value
        FROM ticker_fees
        WHERE account_id = ?
        ORDER BY symbol ASC
        "#,
    )
    .bind(account_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let symbol: String = row.get("symbol");
            Ok(TickerFee {
                account_id: account_id.clone(),
                rate: fee_rate_columns(row, &symbol)?,
                symbol: Symbol::new(symbol),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_account() {
        let (repo, _temp) = setup_test_db().await;
        let account = Account::new("Futures", "USD").with_futures_defaults(Some(d("2.5")), None);

        repo.insert_account(&account).await.expect("insert failed");
        let loaded = repo.get_account(&account.id).await.expect("query failed");

        assert_eq!(loaded, Some(account));
        assert_eq!(
            repo.get_account(&AccountId::new("missing")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_update_account_defaults() {
        let (repo, _temp) = setup_test_db().await;
        let account = Account::new("Futures", "USD");
        repo.insert_account(&account).await.unwrap();

        let updated = repo
            .update_account_defaults(&account.id, Some(d("2.5")), Some(d("0.62")))
            .await
            .unwrap();
        assert!(updated);

        let loaded = repo.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(loaded.default_fee_per_mini_contract, Some(d("2.5")));
        assert_eq!(loaded.default_fee_per_micro_contract, Some(d("0.62")));

        let missing = repo
            .update_account_defaults(&AccountId::new("nope"), None, None)
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_upsert_account_fees_replaces_rate() {
        let (repo, _temp) = setup_test_db().await;
        let account = Account::new("Stocks", "USD");
        repo.insert_account(&account).await.unwrap();

        repo.upsert_account_fees(
            &account.id,
            &[(AssetClass::Stock, FeeRate::PerContractDollar(d("0.01")))],
        )
        .await
        .unwrap();
        repo.upsert_account_fees(
            &account.id,
            &[
                (AssetClass::Stock, FeeRate::PerContractPercent(d("0.1"))),
                (AssetClass::Crypto, FeeRate::PerContractPercent(d("0.25"))),
            ],
        )
        .await
        .unwrap();

        let fees = repo.list_account_fees(&account.id).await.unwrap();
        assert_eq!(fees.len(), 2);
        assert_eq!(fees[0].asset_class, AssetClass::Crypto);
        let stock = fees.iter().find(|f| f.asset_class == AssetClass::Stock).unwrap();
        assert_eq!(stock.rate, FeeRate::PerContractPercent(d("0.1")));
    }

    #[tokio::test]
    async fn test_apply_ticker_fees_upserts_and_deletes() {
        let (repo, _temp) = setup_test_db().await;
        let account = Account::new("Futures", "USD");
        repo.insert_account(&account).await.unwrap();

        let changed = repo
            .apply_ticker_fees(
                &account.id,
                &[
                    (Symbol::new("ES=F"), Some(FeeRate::PerContractDollar(d("2.1")))),
                    (Symbol::new("NQ=F"), Some(FeeRate::PerContractDollar(d("2.2")))),
                ],
            )
            .await
            .unwrap();
        assert_eq!(changed, 2);

        repo.apply_ticker_fees(&account.id, &[(Symbol::new("ES=F"), None)])
            .await
            .unwrap();

        let fees = repo.list_ticker_fees(&account.id).await.unwrap();
        assert_eq!(fees.len(), 1);
        assert_eq!(fees[0].symbol, Symbol::new("NQ=F"));
        assert_eq!(fees[0].rate, FeeRate::PerContractDollar(d("2.2")));
    }

    #[tokio::test]
    async fn test_unknown_fee_mode_is_decode_error() {
        let (repo, _temp) = setup_test_db().await;
        let account = Account::new("Broken", "USD");
        repo.insert_account(&account).await.unwrap();

        sqlx::query(
            "INSERT INTO account_fees (account_id, asset_class, mode, value) \
             VALUES (?, 'STOCK', 'FLAT', '1')",
        )
        .bind(account.id.as_str())
        .execute(&repo.pool)
        .await
        .unwrap();

        let err = repo.list_account_fees(&account.id).await.unwrap_err();
        assert!(matches!(err, sqlx::Error::Decode(_)));
    }
}
