use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use trackbert_domain::{
    entities::{Event, NewShipment, ObservedEvent, Shipment},
    repositories::{EventStore, ShipmentRepository},
};
use trackbert_errors::{TrackerError, TrackerResult};

const SHIPMENT_COLUMNS: &str = "id, tracking_number, carrier, description, active, created_at";
const EVENT_COLUMNS: &str = "id, shipment_id, event_time, event_description, raw_event";

/// 基于SQLite的包裹与事件存储
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建表和索引，可重复执行
    pub async fn run_migrations(pool: &SqlitePool) -> TrackerResult<()> {
        debug!("执行SQLite数据库迁移");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shipments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tracking_number TEXT NOT NULL UNIQUE,
                carrier TEXT,
                description TEXT,
                active BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                shipment_id INTEGER NOT NULL,
                event_time TEXT NOT NULL,
                event_description TEXT NOT NULL,
                raw_event TEXT NOT NULL DEFAULT '{}',
                FOREIGN KEY (shipment_id) REFERENCES shipments(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_shipments_active ON shipments(active)",
            "CREATE INDEX IF NOT EXISTS idx_events_shipment_time ON events(shipment_id, event_time)",
        ];
        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        debug!("SQLite数据库迁移完成");
        Ok(())
    }

    fn row_to_shipment(row: &SqliteRow) -> TrackerResult<Shipment> {
        Ok(Shipment {
            id: row.try_get("id")?,
            tracking_number: row.try_get("tracking_number")?,
            carrier: row.try_get("carrier")?,
            description: row.try_get("description")?,
            active: row.try_get("active")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn row_to_event(row: &SqliteRow) -> TrackerResult<Event> {
        let raw: String = row.try_get("raw_event")?;
        Ok(Event {
            id: row.try_get("id")?,
            shipment_id: row.try_get("shipment_id")?,
            event_time: row.try_get("event_time")?,
            event_description: row.try_get("event_description")?,
            raw_event: Event::decode_raw(&raw)?,
        })
    }

    fn map_insert_error(err: sqlx::Error, tracking_number: &str) -> TrackerError {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                TrackerError::shipment_exists(tracking_number)
            }
            _ => TrackerError::Database(err),
        }
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    #[instrument(skip(self))]
    async fn list_tracked_shipments(&self) -> TrackerResult<Vec<Shipment>> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE active = 1 ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let shipments = rows
            .iter()
            .map(Self::row_to_shipment)
            .collect::<TrackerResult<Vec<_>>>()?;
        debug!("读取到 {} 个追踪中的包裹", shipments.len());
        Ok(shipments)
    }

    #[instrument(skip(self))]
    async fn latest_event(&self, shipment_id: i64) -> TrackerResult<Option<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE shipment_id = ? \
             ORDER BY event_time DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(shipment_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_event).transpose()
    }

    #[instrument(skip(self, event), fields(event_time = %event.event_time))]
    async fn append_event(&self, shipment_id: i64, event: &ObservedEvent) -> TrackerResult<Event> {
        let raw = Event::encode_raw(&event.raw_event)?;
        let row = sqlx::query(
            "INSERT INTO events (shipment_id, event_time, event_description, raw_event) \
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(shipment_id)
        .bind(&event.event_time)
        .bind(&event.event_description)
        .bind(&raw)
        .fetch_one(&self.pool)
        .await?;

        let stored = Event {
            id: row.try_get("id")?,
            shipment_id,
            event_time: event.event_time.clone(),
            event_description: event.event_description.clone(),
            raw_event: event.raw_event.clone(),
        };
        debug!("已保存{}", stored.entity_description());
        Ok(stored)
    }
}

#[async_trait]
impl ShipmentRepository for SqliteEventStore {
    #[instrument(skip(self, shipment), fields(tracking_number = %shipment.tracking_number))]
    async fn create_shipment(&self, shipment: &NewShipment) -> TrackerResult<Shipment> {
        let sql = format!(
            "INSERT INTO shipments (tracking_number, carrier, description, active, created_at) \
             VALUES (?, ?, ?, 1, ?) RETURNING {SHIPMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&shipment.tracking_number)
            .bind(&shipment.carrier)
            .bind(&shipment.description)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::map_insert_error(e, &shipment.tracking_number))?;

        let created = Self::row_to_shipment(&row)?;
        debug!("已创建{}", created.entity_description());
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_shipment(&self, tracking_number: &str) -> TrackerResult<Option<Shipment>> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE tracking_number = ?");
        let row = sqlx::query(&sql)
            .bind(tracking_number)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_shipment).transpose()
    }

    #[instrument(skip(self))]
    async fn update_shipment(
        &self,
        tracking_number: &str,
        carrier: Option<&str>,
        description: Option<&str>,
    ) -> TrackerResult<Shipment> {
        let result = sqlx::query(
            "UPDATE shipments SET carrier = COALESCE(?, carrier), \
             description = COALESCE(?, description) WHERE tracking_number = ?",
        )
        .bind(carrier)
        .bind(description)
        .bind(tracking_number)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TrackerError::shipment_not_found(tracking_number));
        }

        self.get_shipment(tracking_number)
            .await?
            .ok_or_else(|| TrackerError::shipment_not_found(tracking_number))
    }

    #[instrument(skip(self))]
    async fn disable_shipment(&self, tracking_number: &str) -> TrackerResult<()> {
        let result = sqlx::query("UPDATE shipments SET active = 0 WHERE tracking_number = ?")
            .bind(tracking_number)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TrackerError::shipment_not_found(tracking_number));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn shipment_events(&self, shipment_id: i64) -> TrackerResult<Vec<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE shipment_id = ? ORDER BY event_time, id"
        );
        let rows = sqlx::query(&sql)
            .bind(shipment_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_event).collect()
    }
}
