use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};

use crate::models::{Entry, LotteryState};
use crate::settings::SpinSettings;

const LOTTERY_STATE_KEY: &str = "lotteryState";
const SPIN_SETTINGS_KEY: &str = "spinSettings";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("could not encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, serde::Serialize, FromRow)]
pub struct AuditLogItem {
    pub id: i64,
    pub action: String,
    pub metadata: Option<String>,
    pub created_at: String,
}

/// Durable home of the entry set and the lottery state. Multi-record writes
/// run in one transaction so entries and state are never seen out of step.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::migrated(pool).await
    }

    /// Private in-memory database, one connection kept alive for its lifetime.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    /* ------------------- ENTRIES ------------------- */
    pub async fn load_entries(&self) -> StoreResult<Vec<Entry>> {
        let rows = sqlx::query_as::<_, Entry>(
            "SELECT id, name, tickets, created_at FROM entry ORDER BY position ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Swaps the entry set and resets the lottery to `ready` in one commit.
    pub async fn replace_entries(&self, entries: &[Entry], imported_at: i64) -> StoreResult<LotteryState> {
        let state = LotteryState::ready(Some(imported_at));
        let encoded = state.encode()?;

        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await?;
        sqlx::query("DELETE FROM entry").execute(&mut *tx).await?;
        for (position, entry) in entries.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO entry (id, name, tickets, created_at, position)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.name)
            .bind(entry.tickets)
            .bind(entry.created_at)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }
        put_kv(&mut tx, LOTTERY_STATE_KEY, &encoded).await?;
        tx.commit().await?;
        Ok(state)
    }

    /// Empties entries and state together. Settings survive a clear.
    pub async fn clear_all(&self) -> StoreResult<()> {
        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await?;
        sqlx::query("DELETE FROM entry").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM kv WHERE key = ?1")
            .bind(LOTTERY_STATE_KEY)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /* ------------------- STATE ------------------- */
    pub async fn load_state(&self) -> StoreResult<Option<LotteryState>> {
        let raw = get_kv(&self.pool, LOTTERY_STATE_KEY).await?;
        Ok(raw.as_deref().and_then(LotteryState::decode))
    }

    pub async fn save_state(&self, state: &LotteryState) -> StoreResult<()> {
        let encoded = state.encode()?;
        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await?;
        put_kv(&mut tx, LOTTERY_STATE_KEY, &encoded).await?;
        tx.commit().await?;
        Ok(())
    }

    /* ------------------- SETTINGS ------------------- */
    pub async fn load_settings(&self) -> StoreResult<SpinSettings> {
        let raw = get_kv(&self.pool, SPIN_SETTINGS_KEY).await?;
        Ok(raw.as_deref().map(SpinSettings::decode).unwrap_or_default())
    }

    pub async fn save_settings(&self, settings: &SpinSettings) -> StoreResult<()> {
        let encoded = serde_json::to_string(settings)?;
        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await?;
        put_kv(&mut tx, SPIN_SETTINGS_KEY, &encoded).await?;
        tx.commit().await?;
        Ok(())
    }

    /* ------------------- AUDIT ------------------- */
    /// Best effort: a failed audit write is logged and otherwise ignored.
    pub async fn log_audit(&self, action: &str, metadata: Option<String>) {
        let res = sqlx::query("INSERT INTO audit_log (action, metadata) VALUES (?1, ?2)")
            .bind(action)
            .bind(metadata)
            .execute(&self.pool)
            .await;

        if let Err(e) = res {
            tracing::error!("Failed to write audit log: {}", e);
        }
    }

    pub async fn recent_activity(&self, limit: i64) -> StoreResult<Vec<AuditLogItem>> {
        let rows = sqlx::query_as::<_, AuditLogItem>(
            r#"
            SELECT id, action, metadata, created_at
            FROM audit_log
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

async fn get_kv(pool: &SqlitePool, key: &str) -> StoreResult<Option<String>> {
    let raw = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(raw)
}

async fn put_kv(tx: &mut Transaction<'_, Sqlite>, key: &str, value: &str) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO kv (key, value) VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
