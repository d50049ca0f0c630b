use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::lifecycle::error::{LifecycleError, Result};
use crate::lifecycle::traits::PersistenceStore;
use crate::lifecycle::types::{Delivery, StatusUpdate};

/// How long a writer waits for another writer's transaction to finish
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed store. Each write is one `BEGIN IMMEDIATE` transaction that
/// re-checks the version it was handed and bumps it with
/// `UPDATE ... WHERE version = ?`. Taking the write lock up front makes a
/// racing writer wait and then see the new version as a conflict.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn storage(e: sqlx::Error) -> LifecycleError {
    LifecycleError::Storage(e.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| LifecycleError::Storage(e.to_string()))
}

fn from_json<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| LifecycleError::Storage(format!("corrupted row: {e}")))
}

impl SqliteStore {
    /// Open (creating if needed) the database and run migrations
    pub async fn connect(database_url: &str) -> AnyResult<Self> {
        if !Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            Sqlite::create_database(database_url).await?;
        }

        let options = SqliteConnectOptions::from_str(database_url)?.busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(database_url, "Database migrations completed");

        Ok(Self { pool })
    }

    pub async fn shutdown(&self) {
        self.pool.close().await;
        info!("Database connections closed");
    }

    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool.begin_with("BEGIN IMMEDIATE").await.map_err(storage)
    }

    /// Stored version, status and ledger head of a delivery, inside `tx`
    async fn current_row(
        tx: &mut Transaction<'_, Sqlite>,
        tracking_code: &str,
    ) -> Result<(u64, String, u64)> {
        let row = sqlx::query(
            "SELECT version, status, ledger_head FROM deliveries WHERE tracking_code = ?1",
        )
        .bind(tracking_code)
        .fetch_optional(&mut **tx)
        .await
        .map_err(storage)?
        .ok_or_else(|| LifecycleError::not_found(tracking_code))?;

        let version: i64 = row.get("version");
        let ledger_head: i64 = row.get("ledger_head");
        Ok((version as u64, row.get("status"), ledger_head as u64))
    }

    /// Version-checked overwrite of the delivery row. Returns the committed delivery.
    async fn update_row(tx: &mut Transaction<'_, Sqlite>, delivery: &Delivery) -> Result<Delivery> {
        let mut committed = delivery.clone();
        committed.version += 1;

        let updated = sqlx::query(
            r#"
            UPDATE deliveries
            SET status = ?1, version = ?2, ledger_head = ?3, body = ?4, updated_at = ?5
            WHERE tracking_code = ?6 AND version = ?7
            "#,
        )
        .bind(committed.status.as_str())
        .bind(committed.version as i64)
        .bind(committed.ledger_head as i64)
        .bind(to_json(&committed)?)
        .bind(committed.updated_at.to_rfc3339())
        .bind(&committed.tracking_code)
        .bind(delivery.version as i64)
        .execute(&mut **tx)
        .await
        .map_err(storage)?;

        if updated.rows_affected() == 0 {
            let (found, _, _) = Self::current_row(tx, &delivery.tracking_code).await?;
            return Err(LifecycleError::ConcurrencyConflict {
                tracking_code: delivery.tracking_code.clone(),
                expected: delivery.version,
                found,
            });
        }
        Ok(committed)
    }
}

fn check_version(tracking_code: &str, stored_version: u64, incoming: &Delivery) -> Result<()> {
    if stored_version != incoming.version {
        return Err(LifecycleError::ConcurrencyConflict {
            tracking_code: tracking_code.to_string(),
            expected: incoming.version,
            found: stored_version,
        });
    }
    Ok(())
}

#[async_trait]
impl PersistenceStore for SqliteStore {
    async fn create(&self, delivery: &Delivery) -> Result<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO deliveries (tracking_code, status, version, ledger_head, body, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&delivery.tracking_code)
        .bind(delivery.status.as_str())
        .bind(delivery.version as i64)
        .bind(delivery.ledger_head as i64)
        .bind(to_json(delivery)?)
        .bind(delivery.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(LifecycleError::AlreadyExists {
                    tracking_code: delivery.tracking_code.clone(),
                })
            }
            Err(e) => Err(storage(e)),
        }
    }

    async fn load(&self, tracking_code: &str) -> Result<Delivery> {
        let row = sqlx::query("SELECT version, body FROM deliveries WHERE tracking_code = ?1")
            .bind(tracking_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| LifecycleError::not_found(tracking_code))?;

        let mut delivery: Delivery = from_json(row.get::<&str, _>("body"))?;
        delivery.version = row.get::<i64, _>("version") as u64;
        Ok(delivery)
    }

    async fn save(&self, delivery: &Delivery) -> Result<Delivery> {
        let mut tx = self.begin_write().await?;
        let (version, status, ledger_head) = Self::current_row(&mut tx, &delivery.tracking_code).await?;
        check_version(&delivery.tracking_code, version, delivery)?;
        if status != delivery.status.as_str() || ledger_head != delivery.ledger_head {
            return Err(LifecycleError::Storage(format!(
                "plain save of {} may not change its status or ledger",
                delivery.tracking_code
            )));
        }

        let committed = Self::update_row(&mut tx, delivery).await?;
        tx.commit().await.map_err(storage)?;
        debug!(tracking_code = %committed.tracking_code, version = committed.version, "Delivery saved");
        Ok(committed)
    }

    async fn save_with_ledger_entry(&self, delivery: &Delivery, entry: &StatusUpdate) -> Result<Delivery> {
        let mut tx = self.begin_write().await?;
        let (version, _, ledger_head) = Self::current_row(&mut tx, &delivery.tracking_code).await?;
        check_version(&delivery.tracking_code, version, delivery)?;
        if entry.tracking_code != delivery.tracking_code
            || entry.sequence != ledger_head + 1
            || delivery.ledger_head != entry.sequence
        {
            return Err(LifecycleError::Storage(format!(
                "ledger entry {} does not continue the ledger of {} at {}",
                entry.sequence, delivery.tracking_code, ledger_head
            )));
        }

        let committed = Self::update_row(&mut tx, delivery).await?;
        sqlx::query(
            r#"
            INSERT INTO status_updates
                (tracking_code, sequence, from_status, to_status, actor_id, created_at, body)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.tracking_code)
        .bind(entry.sequence as i64)
        .bind(entry.from.as_str())
        .bind(entry.to.as_str())
        .bind(&entry.actor.id)
        .bind(entry.created_at.to_rfc3339())
        .bind(to_json(entry)?)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        debug!(
            tracking_code = %committed.tracking_code,
            version = committed.version,
            sequence = entry.sequence,
            "Delivery saved with ledger entry"
        );
        Ok(committed)
    }

    async fn ledger_page(
        &self,
        tracking_code: &str,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<StatusUpdate>> {
        let exists = sqlx::query("SELECT 1 FROM deliveries WHERE tracking_code = ?1")
            .bind(tracking_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        if exists.is_none() {
            return Err(LifecycleError::not_found(tracking_code));
        }

        let rows = sqlx::query(
            r#"
            SELECT body FROM status_updates
            WHERE tracking_code = ?1 AND sequence > ?2
            ORDER BY sequence ASC
            LIMIT ?3
            "#,
        )
        .bind(tracking_code)
        .bind(after_sequence as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| from_json(row.get::<&str, _>("body")))
            .collect()
    }
}
