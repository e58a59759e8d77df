use kasboek_core::{AccountId, Iban};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Connection, Pool, Sqlite, SqliteConnection};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

use crate::classify::{self, Scope};
use crate::error::StoreResult;
use crate::{accounts, counterparts};

pub type DbPool = Pool<Sqlite>;

const BACKFILL_KEY: &str = "counterpart_backfill";

pub async fn create_db(path: &Path) -> StoreResult<DbPool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .pragma("cache_size", "-32000");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    let mut conn = pool.acquire().await?;
    run_migrations(&mut conn).await?;
    backfill_counterpart_links(&mut conn).await?;
    drop(conn);

    Ok(pool)
}

async fn run_migrations(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            iban TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            category_type TEXT NOT NULL DEFAULT 'None',
            UNIQUE (owner_id, name),
            FOREIGN KEY (owner_id) REFERENCES accounts(id)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS counterparts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            category_id INTEGER,
            UNIQUE (owner_id, name),
            FOREIGN KEY (owner_id) REFERENCES accounts(id),
            FOREIGN KEY (category_id) REFERENCES categories(id)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    // Category references carry no ON DELETE action: deleting a category that
    // is still referenced fails instead of leaving half-cleared rows behind.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_iban TEXT NOT NULL,
            counterpart_id INTEGER,
            counterpart_name TEXT NOT NULL DEFAULT '',
            counterpart_account TEXT NOT NULL DEFAULT '',
            value TEXT NOT NULL,
            date_executed TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            category_id INTEGER,
            category_name TEXT,
            transaction_type TEXT NOT NULL DEFAULT 'None',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (owner_iban) REFERENCES accounts(iban) ON UPDATE CASCADE,
            FOREIGN KEY (counterpart_id) REFERENCES counterparts(id),
            FOREIGN KEY (category_id) REFERENCES categories(id)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_transactions_owner_date ON transactions(owner_iban, date_executed)",
        "CREATE INDEX IF NOT EXISTS idx_transactions_counterpart ON transactions(counterpart_id)",
        "CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id)",
        "CREATE INDEX IF NOT EXISTS idx_counterparts_category ON counterparts(category_id)",
    ] {
        sqlx::query(index).execute(&mut *conn).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Links rows stored before transactions carried a `counterpart_id`, matching
/// them by owner and normalized counterpart name. Runs once per database;
/// later rows with a null link were detached on purpose.
#[instrument(skip(conn))]
async fn backfill_counterpart_links(conn: &mut SqliteConnection) -> StoreResult<()> {
    let done = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
        .bind(BACKFILL_KEY)
        .fetch_optional(&mut *conn)
        .await?;
    if done.is_some() {
        return Ok(());
    }

    let mut tx = conn.begin().await?;

    let rows = sqlx::query_as::<_, (i64, i64, String)>(
        r#"
        SELECT t.id, a.id, t.counterpart_name
        FROM transactions t
        JOIN accounts a ON a.iban = t.owner_iban
        WHERE t.counterpart_id IS NULL
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    let mut owners = BTreeSet::new();
    for (transaction_id, owner_id, name) in &rows {
        let owner = AccountId(*owner_id);
        let counterpart = counterparts::resolve_or_create(&mut tx, owner, name).await?;
        sqlx::query("UPDATE transactions SET counterpart_id = ? WHERE id = ?")
            .bind(counterpart.id.0)
            .bind(*transaction_id)
            .execute(&mut *tx)
            .await?;
        owners.insert(owner);
    }

    for owner_id in owners {
        let owner = accounts::by_id(&mut tx, owner_id).await?;
        classify::reclassify(&mut tx, &owner, Scope::Owner).await?;
    }

    sqlx::query("INSERT INTO settings (key, value) VALUES (?, datetime('now'))")
        .bind(BACKFILL_KEY)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if !rows.is_empty() {
        info!(linked = rows.len(), "Linked legacy transactions to counterparts");
    }
    Ok(())
}

/// Parses an IBAN read back from the database.
pub(crate) fn stored_iban(raw: &str) -> StoreResult<Iban> {
    Iban::parse(raw).map_err(|e| crate::StoreError::Corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions;
    use kasboek_core::{CategoryType, NewAccount, NewCategory, Period};

    #[tokio::test]
    async fn create_db_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kasboek.db");
        let pool = create_db(&path).await.unwrap();
        pool.close().await;
        let pool = create_db(&path).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        assert!(accounts::list(&mut conn).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn backfill_links_legacy_rows_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kasboek.db");
        let pool = create_db(&path).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let owner = accounts::create(
            &mut conn,
            NewAccount {
                name: "Main".to_string(),
                iban: Iban::parse("BE68539007547034").unwrap(),
            },
        )
        .await
        .unwrap();
        crate::categories::create(
            &mut conn,
            &owner,
            NewCategory {
                name: "Groceries".to_string(),
                category_type: CategoryType::Expenses,
                counterparts: vec!["acme".into()],
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // Pre-link rows, as an older schema would have written them.
        for name in ["Acme", "  ACME ", "globex"] {
            sqlx::query(
                "INSERT INTO transactions (owner_iban, counterpart_name, value, date_executed) VALUES (?, ?, '-12.50', '2024-02-01')",
            )
            .bind(owner.iban.as_str())
            .bind(name)
            .execute(&mut *conn)
            .await
            .unwrap();
        }
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(BACKFILL_KEY)
            .execute(&mut *conn)
            .await
            .unwrap();
        drop(conn);
        pool.close().await;

        let pool = create_db(&path).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let rows = transactions::list_for_owner(&mut conn, &owner.iban, Period::all())
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|t| t.counterpart_id.is_some()));
        let groceries: Vec<_> = rows
            .iter()
            .filter(|t| t.category_name.as_deref() == Some("Groceries"))
            .collect();
        assert_eq!(groceries.len(), 2);
        assert_eq!(counterparts::list_by_owner(&mut conn, owner.id).await.unwrap().len(), 2);
    }
}
