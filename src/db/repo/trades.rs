//! Trade and fill operations for the repository.

use crate::domain::{
    AccountId, Decimal, Direction, Fill, FillId, Symbol, TimeMs, Trade, TradeId, TradeScope,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;

use super::{
    decimal_column, enum_column, fetch_account, fetch_account_fees, fetch_ticker_fees,
    optional_decimal_column, AccountBundle, Repository, TradeBundle,
};

const TRADE_COLUMNS: &str = "id, account_id, symbol, asset_class, direction, size, entry_price, \
     entry_time, exit_price, exit_time, stop_price, target_price, fees, deleted_at, revision";

impl Repository {
    // =========================================================================
    // Trade operations
    // =========================================================================

    /// Insert a trade together with its initial fills in one transaction.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_trade(&self, trade: &Trade, fills: &[Fill]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO trades (
                id, account_id, symbol, asset_class, direction, size, entry_price,
                entry_time, exit_price, exit_time, stop_price, target_price, fees,
                deleted_at, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trade.id.as_str())
        .bind(trade.account_id.as_str())
        .bind(trade.symbol.as_str())
        .bind(trade.asset_class.as_str())
        .bind(trade.direction.map(|d| d.as_str()))
        .bind(trade.size.to_canonical_string())
        .bind(trade.entry_price.to_canonical_string())
        .bind(trade.entry_time.as_ms())
        .bind(trade.exit_price.map(|d| d.to_canonical_string()))
        .bind(trade.exit_time.map(|t| t.as_ms()))
        .bind(trade.stop_price.map(|d| d.to_canonical_string()))
        .bind(trade.target_price.map(|d| d.to_canonical_string()))
        .bind(trade.fees.map(|d| d.to_canonical_string()))
        .bind(trade.deleted_at.map(|t| t.as_ms()))
        .bind(trade.revision)
        .execute(&mut *tx)
        .await?;

        for fill in fills {
            insert_fill_row(&mut tx, fill).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get a trade by id, soft-deleted or not.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored enum is unknown.
    pub async fn get_trade(&self, id: &TradeId) -> Result<Option<Trade>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_trade(&mut conn, id).await
    }

    /// List an account's trades ordered by entry time.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored enum is unknown.
    pub async fn list_trades(
        &self,
        account_id: &AccountId,
        scope: TradeScope,
    ) -> Result<Vec<Trade>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_account_trades(&mut conn, account_id, scope).await
    }

    /// Write every editable trade field and bump the revision.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_trade_fields(&self, trade: &Trade) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE trades SET
                symbol = ?, asset_class = ?, direction = ?, size = ?, entry_price = ?,
                entry_time = ?, exit_price = ?, exit_time = ?, stop_price = ?,
                target_price = ?, fees = ?, revision = revision + 1
            WHERE id = ?
            "#,
        )
        .bind(trade.symbol.as_str())
        .bind(trade.asset_class.as_str())
        .bind(trade.direction.map(|d| d.as_str()))
        .bind(trade.size.to_canonical_string())
        .bind(trade.entry_price.to_canonical_string())
        .bind(trade.entry_time.as_ms())
        .bind(trade.exit_price.map(|d| d.to_canonical_string()))
        .bind(trade.exit_time.map(|t| t.as_ms()))
        .bind(trade.stop_price.map(|d| d.to_canonical_string()))
        .bind(trade.target_price.map(|d| d.to_canonical_string()))
        .bind(trade.fees.map(|d| d.to_canonical_string()))
        .bind(trade.id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist a computed fee only if the trade is still at `revision`.
    ///
    /// Returns false when the trade moved on (or is gone); the caller's
    /// snapshot is stale and its result must be dropped.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_trade_fees_if_revision(
        &self,
        id: &TradeId,
        fees: Decimal,
        revision: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE trades SET fees = ? WHERE id = ? AND revision = ?")
            .bind(fees.to_canonical_string())
            .bind(id.as_str())
            .bind(revision)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set or clear the soft-delete marker.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_trade_deleted_at(
        &self,
        id: &TradeId,
        deleted_at: Option<TimeMs>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE trades SET deleted_at = ? WHERE id = ?")
            .bind(deleted_at.map(|t| t.as_ms()))
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Fill operations
    // =========================================================================

    /// Append fills to a trade and bump its revision, in one transaction.
    ///
    /// Returns the number of fills inserted.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_fills(
        &self,
        trade_id: &TradeId,
        fills: &[Fill],
    ) -> Result<usize, sqlx::Error> {
        if fills.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for fill in fills {
            insert_fill_row(&mut tx, fill).await?;
        }
        bump_revision(&mut tx, trade_id).await?;
        tx.commit().await?;

        Ok(fills.len())
    }

    /// Get a fill by id.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored enum is unknown.
    pub async fn get_fill(&self, id: &FillId) -> Result<Option<Fill>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, trade_id, fill_type, price, size, time_ms FROM fills WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(fill_from_row).transpose()
    }

    /// Fills of one trade in (time, id) order.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored enum is unknown.
    pub async fn list_fills(&self, trade_id: &TradeId) -> Result<Vec<Fill>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_trade_fills(&mut conn, trade_id).await
    }

    /// Overwrite a fill's type, price, size and time, bumping its trade's revision.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn update_fill(&self, fill: &Fill) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE fills SET fill_type = ?, price = ?, size = ?, time_ms = ? \
             WHERE id = ? AND trade_id = ?",
        )
        .bind(fill.fill_type.as_str())
        .bind(fill.price.to_canonical_string())
        .bind(fill.size.to_canonical_string())
        .bind(fill.time.as_ms())
        .bind(fill.id.as_str())
        .bind(fill.trade_id.as_str())
        .execute(&mut *tx)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            bump_revision(&mut tx, &fill.trade_id).await?;
        }
        tx.commit().await?;

        Ok(updated)
    }

    /// Delete a fill, bumping its trade's revision.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn delete_fill(&self, fill: &Fill) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM fills WHERE id = ? AND trade_id = ?")
            .bind(fill.id.as_str())
            .bind(fill.trade_id.as_str())
            .execute(&mut *tx)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            bump_revision(&mut tx, &fill.trade_id).await?;
        }
        tx.commit().await?;

        Ok(deleted)
    }

    // =========================================================================
    // Batch loaders
    // =========================================================================

    /// Trade, fills, account and fee rows read in one transaction.
    ///
    /// Returns None if the trade or its account does not exist.
    ///
    /// # Errors
    /// Returns an error if any query fails.
    pub async fn load_trade_bundle(
        &self,
        id: &TradeId,
    ) -> Result<Option<TradeBundle>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let Some(trade) = fetch_trade(&mut tx, id).await? else {
            return Ok(None);
        };
        let Some(account) = fetch_account(&mut tx, &trade.account_id).await? else {
            return Ok(None);
        };
        let fills = fetch_trade_fills(&mut tx, id).await?;
        let account_fees = fetch_account_fees(&mut tx, &account.id).await?;
        let ticker_fees = fetch_ticker_fees(&mut tx, &account.id).await?;

        tx.commit().await?;
        Ok(Some(TradeBundle {
            trade,
            fills,
            account,
            account_fees,
            ticker_fees,
        }))
    }

    /// Account, fee rows, trades in `scope` and all of their fills.
    ///
    /// Five queries regardless of the number of trades, all inside one
    /// transaction. Returns None if the account does not exist.
    ///
    /// # Errors
    /// Returns an error if any query fails.
    pub async fn load_account_bundle(
        &self,
        account_id: &AccountId,
        scope: TradeScope,
    ) -> Result<Option<AccountBundle>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let Some(account) = fetch_account(&mut tx, account_id).await? else {
            return Ok(None);
        };
        let account_fees = fetch_account_fees(&mut tx, account_id).await?;
        let ticker_fees = fetch_ticker_fees(&mut tx, account_id).await?;
        let trades = fetch_account_trades(&mut tx, account_id, scope).await?;

        let fill_sql = format!(
            r#"
            SELECT f.id, f.trade_id, f.fill_type, f.price, f.size, f.time_ms
            FROM fills f
            JOIN trades t ON t.id = f.trade_id
            WHERE t.account_id = ? {}
            ORDER BY f.trade_id ASC, f.time_ms ASC, f.id ASC
            "#,
            scope_filter(scope, "t")
        );
        let fill_rows = sqlx::query(&fill_sql)
            .bind(account_id.as_str())
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut fills_by_trade: HashMap<String, Vec<Fill>> = HashMap::new();
        for row in &fill_rows {
            let fill = fill_from_row(row)?;
            fills_by_trade
                .entry(fill.trade_id.as_str().to_string())
                .or_default()
                .push(fill);
        }

        let trades = trades
            .into_iter()
            .map(|trade| {
                let fills = fills_by_trade.remove(trade.id.as_str()).unwrap_or_default();
                (trade, fills)
            })
            .collect();

        Ok(Some(AccountBundle {
            account,
            account_fees,
            ticker_fees,
            trades,
        }))
    }
}

fn scope_filter(scope: TradeScope, alias: &str) -> String {
    match scope {
        TradeScope::All => String::new(),
        TradeScope::Active => format!("AND {}.deleted_at IS NULL", alias),
    }
}

fn trade_from_row(row: &SqliteRow) -> Result<Trade, sqlx::Error> {
    let id: String = row.get("id");
    let direction: Option<String> = row.get("direction");
    let direction = direction
        .map(|d| d.parse::<Direction>().map_err(|e| sqlx::Error::Decode(Box::new(e))))
        .transpose()?;

    Ok(Trade {
        account_id: AccountId::new(row.get::<String, _>("account_id")),
        symbol: Symbol::new(row.get::<String, _>("symbol")),
        asset_class: enum_column(row, "asset_class")?,
        direction,
        size: decimal_column(row, "size", &id),
        entry_price: decimal_column(row, "entry_price", &id),
        entry_time: TimeMs::new(row.get("entry_time")),
        exit_price: optional_decimal_column(row, "exit_price", &id),
        exit_time: row.get::<Option<i64>, _>("exit_time").map(TimeMs::new),
        stop_price: optional_decimal_column(row, "stop_price", &id),
        target_price: optional_decimal_column(row, "target_price", &id),
        fees: optional_decimal_column(row, "fees", &id),
        deleted_at: row.get::<Option<i64>, _>("deleted_at").map(TimeMs::new),
        revision: row.get("revision"),
        id: TradeId::new(id),
    })
}

fn fill_from_row(row: &SqliteRow) -> Result<Fill, sqlx::Error> {
    let id: String = row.get("id");
    Ok(Fill {
        trade_id: TradeId::new(row.get::<String, _>("trade_id")),
        fill_type: enum_column(row, "fill_type")?,
        price: decimal_column(row, "price", &id),
        size: decimal_column(row, "size", &id),
        time: TimeMs::new(row.get("time_ms")),
        id: FillId::new(id),
    })
}

async fn fetch_trade(
    conn: &mut SqliteConnection,
    id: &TradeId,
) -> Result<Option<Trade>, sqlx::Error> {
    let sql = format!("SELECT {} FROM trades WHERE id = ?", TRADE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(trade_from_row).transpose()
}

async fn fetch_account_trades(
    conn: &mut SqliteConnection,
    account_id: &AccountId,
    scope: TradeScope,
) -> Result<Vec<Trade>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM trades WHERE account_id = ? {} ORDER BY entry_time ASC, id ASC",
        TRADE_COLUMNS,
        scope_filter(scope, "trades")
    );
    let rows = sqlx::query(&sql)
        .bind(account_id.as_str())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(trade_from_row).collect()
}

async fn fetch_trade_fills(
    conn: &mut SqliteConnection,
    trade_id: &TradeId,
) -> Result<Vec<Fill>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, trade_id, fill_type, price, size, time_ms
        FROM fills
        WHERE trade_id = ?
        ORDER BY time_ms ASC, id ASC
        "#,
    )
    .bind(trade_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(fill_from_row).collect()
}

async fn insert_fill_row(conn: &mut SqliteConnection, fill: &Fill) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO fills (id, trade_id, fill_type, price, size, time_ms)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(fill.id.as_str())
    .bind(fill.trade_id.as_str())
    .bind(fill.fill_type.as_str())
    .bind(fill.price.to_canonical_string())
    .bind(fill.size.to_canonical_string())
    .bind(fill.time.as_ms())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn bump_revision(conn: &mut SqliteConnection, trade_id: &TradeId) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE trades SET revision = revision + 1 WHERE id = ?")
        .bind(trade_id.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(())
}
