//! Journal database setup: connection pragmas, schema, column upgrades.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, info};

/// Applied to every pooled connection.
const CONNECTION_PRAGMAS: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    "PRAGMA busy_timeout = 5000",
    "PRAGMA synchronous = NORMAL",
];

/// Columns that postdate the first schema. Files created before them gain
/// the column on open; `CREATE TABLE IF NOT EXISTS` alone would skip it.
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("accounts", "default_fee_per_mini_contract", "TEXT"),
    ("accounts", "default_fee_per_micro_contract", "TEXT"),
    ("trades", "fees", "TEXT"),
    ("trades", "deleted_at", "INTEGER"),
    ("trades", "revision", "INTEGER NOT NULL DEFAULT 0"),
];

/// Open (creating if needed) the journal database and bring its schema up
/// to date.
///
/// # Errors
/// Returns an error if the file cannot be opened or a schema statement fails.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { apply_pragmas(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    // Persists in the file; not needed per connection.
    let journal_mode: String = sqlx::query_scalar("PRAGMA journal_mode = WAL")
        .fetch_one(&pool)
        .await?;
    debug!(journal_mode = %journal_mode, "SQLite journal mode");

    apply_schema(&pool).await?;

    info!(path = %db_path, "Journal database ready");
    Ok(pool)
}

async fn apply_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for pragma in CONNECTION_PRAGMAS {
        sqlx::query(pragma).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Create missing tables and indexes, then add any missing columns, all in
/// one transaction.
async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let statements = include_str!("schema.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty());
    for statement in statements {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    let mut added = 0usize;
    for (table, column, definition) in ADDED_COLUMNS {
        if column_exists(&mut *tx, table, column).await? {
            continue;
        }
        let alter = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition);
        sqlx::query(&alter).execute(&mut *tx).await?;
        info!(table, column, "Added missing column");
        added += 1;
    }

    tx.commit().await?;
    debug!(added_columns = added, "Schema up to date");
    Ok(())
}

async fn column_exists(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_db_path(temp_dir: &TempDir) -> String {
        temp_dir
            .path()
            .join("journal.db")
            .to_string_lossy()
            .to_string()
    }

    #[tokio::test]
    async fn test_init_db_creates_all_tables() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_db_path(&temp_dir);
        let pool = init_db(&db_path).await.expect("init_db failed");
        assert!(Path::new(&db_path).exists());

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .expect("query failed");
        assert_eq!(
            tables,
            vec!["account_fees", "accounts", "fills", "ticker_fees", "trades"]
        );
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_db_path(&temp_dir);
        let pool = init_db(&db_path).await.expect("init_db failed");

        apply_schema(&pool).await.expect("second schema run failed");
        drop(pool);
        init_db(&db_path).await.expect("reopen failed");
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_db_path(&temp_dir)).await.expect("init_db failed");

        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(enabled, 1);

        let orphan = sqlx::query(
            "INSERT INTO fills (id, trade_id, fill_type, price, size, time_ms) \
             VALUES ('f-1', 'missing', 'ENTRY', '1', '1', 0)",
        )
        .execute(&pool)
        .await;
        assert!(orphan.is_err());
    }

    #[tokio::test]
    async fn test_old_file_gains_added_columns() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_db_path(&temp_dir);

        let old = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .expect("connect failed");
        sqlx::query(
            "CREATE TABLE accounts (id TEXT PRIMARY KEY, name TEXT NOT NULL, \
             currency TEXT NOT NULL DEFAULT 'USD', created_at INTEGER NOT NULL)",
        )
        .execute(&old)
        .await
        .expect("create accounts failed");
        sqlx::query(
            "CREATE TABLE trades (id TEXT PRIMARY KEY, account_id TEXT NOT NULL, \
             symbol TEXT NOT NULL, asset_class TEXT NOT NULL, direction TEXT, \
             size TEXT NOT NULL, entry_price TEXT NOT NULL, entry_time INTEGER NOT NULL, \
             exit_price TEXT, exit_time INTEGER, stop_price TEXT, target_price TEXT)",
        )
        .execute(&old)
        .await
        .expect("create trades failed");
        old.close().await;

        let pool = init_db(&db_path).await.expect("init_db failed");
        let mut conn = pool.acquire().await.expect("acquire failed");
        for (table, column, _) in ADDED_COLUMNS {
            assert!(
                column_exists(&mut conn, table, column).await.expect("query failed"),
                "{}.{} missing",
                table,
                column
            );
        }
    }
}
