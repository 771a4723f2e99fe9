// SQLite persistence of per-interface health configs.

use crate::models::InterfaceConfig;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub struct ConfigRepo {
    pool: SqlitePool,
}

impl ConfigRepo {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS health_interface_config (
                name TEXT PRIMARY KEY,
                enabled INTEGER NOT NULL,
                ping_interval INTEGER NOT NULL,
                set_keepalive INTEGER NOT NULL,
                keepalive_value INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All stored configs; numeric values are clamped into their allowed ranges.
    #[instrument(skip(self), fields(repo = "config", operation = "load_all"))]
    pub async fn load_all(&self) -> anyhow::Result<BTreeMap<String, InterfaceConfig>> {
        let rows = sqlx::query(
            "SELECT name, enabled, ping_interval, set_keepalive, keepalive_value FROM health_interface_config",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = BTreeMap::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            let ping_interval: i64 = row.try_get("ping_interval")?;
            let keepalive: i64 = row.try_get("keepalive_value")?;
            let cfg = InterfaceConfig {
                enabled: row.try_get::<i64, _>("enabled")? != 0,
                ping_interval_seconds: ping_interval.max(0) as u64,
                keepalive_seconds: keepalive.max(0) as u64,
                set_keepalive: row.try_get::<i64, _>("set_keepalive")? != 0,
            }
            .clamped();
            out.insert(name, cfg);
        }
        Ok(out)
    }

    #[instrument(skip(self, config), fields(repo = "config", operation = "save"))]
    pub async fn save(&self, name: &str, config: &InterfaceConfig) -> anyhow::Result<()> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO health_interface_config (name, enabled, ping_interval, set_keepalive, keepalive_value, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT(name) DO UPDATE SET
                enabled = excluded.enabled,
                ping_interval = excluded.ping_interval,
                set_keepalive = excluded.set_keepalive,
                keepalive_value = excluded.keepalive_value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(config.enabled as i64)
        .bind(config.ping_interval_seconds as i64)
        .bind(config.set_keepalive as i64)
        .bind(config.keepalive_seconds as i64)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
