use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use trackbert_config::DatabaseConfig;
use trackbert_errors::TrackerResult;

use super::sqlite::SqliteEventStore;

/// SQLite连接池管理
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 根据配置创建连接池并执行迁移
    pub async fn from_config(config: &DatabaseConfig) -> TrackerResult<Self> {
        Self::connect(
            &config.url,
            config.max_connections,
            Duration::from_secs(config.connection_timeout_seconds),
        )
        .await
    }

    /// 内存数据库的每个连接都是独立的库，测试时需要 `max_connections = 1`
    pub async fn new(url: &str, max_connections: u32) -> TrackerResult<Self> {
        Self::connect(url, max_connections, Duration::from_secs(30)).await
    }

    async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> TrackerResult<Self> {
        debug!("连接数据库: {}", url);

        let mut connect_options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !url.contains(":memory:") {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(acquire_timeout)
            .connect_with(connect_options)
            .await?;

        SqliteEventStore::run_migrations(&pool).await?;

        info!("数据库已就绪: {}", url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> TrackerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// 事件存储，同时实现 `EventStore` 和 `ShipmentRepository`
    pub fn event_store(&self) -> Arc<SqliteEventStore> {
        Arc::new(SqliteEventStore::new(self.pool.clone()))
    }
}
