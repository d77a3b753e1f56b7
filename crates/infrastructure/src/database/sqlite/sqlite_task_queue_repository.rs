use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqlitePool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use taskstore_common::{format_datetime, normalize_queue_name};
use taskstore_domain::{
    QueueItem, QueueItemStatus, SortOrder, TaskQueueQuery, TaskQueueRepository, TimeField,
};
use taskstore_errors::{TaskStoreError, TaskStoreResult};

use crate::database::mapping::{queue_item_from_raw, RawQueueItem};
use crate::database::sql::{build_task_queue_query, TASK_QUEUE_COLUMNS};

pub struct SqliteTaskQueueRepository {
    pool: SqlitePool,
}

impl SqliteTaskQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> TaskStoreResult<QueueItem> {
        queue_item_from_raw(RawQueueItem {
            id: row.try_get("id")?,
            queue_name: row.try_get("queue_name")?,
            task_id: row.try_get("task_id")?,
            parameters: row.try_get("parameters")?,
            status: row.try_get("status")?,
            output: row.try_get("output")?,
            details: row.try_get("details")?,
            attempts: row.try_get("attempts")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            soft_deleted_at: row.try_get("soft_deleted_at")?,
        })
    }
}

#[async_trait]
impl TaskQueueRepository for SqliteTaskQueueRepository {
    #[instrument(skip(self, item), fields(queue_name = %item.queue_name))]
    async fn create(&self, item: &QueueItem) -> TaskStoreResult<QueueItem> {
        let mut stored = item.clone();
        if stored.id.trim().is_empty() {
            stored.id = Uuid::new_v4().to_string();
        }
        stored.queue_name = normalize_queue_name(&stored.queue_name);

        sqlx::query(
            "INSERT INTO task_queue (id, queue_name, task_id, parameters, status, output, \
             details, attempts, started_at, completed_at, created_at, updated_at, soft_deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(&stored.id)
        .bind(&stored.queue_name)
        .bind(&stored.task_definition_id)
        .bind(&stored.parameters)
        .bind(stored.status.as_str())
        .bind(&stored.output)
        .bind(&stored.details)
        .bind(stored.attempts)
        .bind(stored.started_at.to_storage())
        .bind(stored.completed_at.to_storage())
        .bind(format_datetime(stored.created_at))
        .bind(format_datetime(stored.updated_at))
        .bind(stored.soft_deleted_at.to_storage())
        .execute(&self.pool)
        .await?;

        debug!("队列任务已入库: {}", stored.id);
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> TaskStoreResult<Option<QueueItem>> {
        if id.trim().is_empty() {
            return Err(TaskStoreError::validation_error("queue item id is empty"));
        }

        let sql = format!("SELECT {TASK_QUEUE_COLUMNS} FROM task_queue WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_item(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, query: &TaskQueueQuery) -> TaskStoreResult<Vec<QueueItem>> {
        query.validate()?;

        let (sql, binds) = build_task_queue_query(query, false);
        let mut statement = sqlx::query(&sql);
        for bind in &binds {
            statement = statement.bind(bind);
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn count(&self, query: &TaskQueueQuery) -> TaskStoreResult<i64> {
        query.validate()?;

        let (sql, binds) = build_task_queue_query(query, true);
        let mut statement = sqlx::query(&sql);
        for bind in &binds {
            statement = statement.bind(bind);
        }

        let row = statement.fetch_one(&self.pool).await?;
        Ok(row.try_get("total")?)
    }

    #[instrument(skip(self, item), fields(item_id = %item.id, status = %item.status))]
    async fn update(&self, item: &QueueItem) -> TaskStoreResult<()> {
        let result = sqlx::query(
            "UPDATE task_queue \
             SET queue_name = $2, task_id = $3, parameters = $4, status = $5, output = $6, \
                 details = $7, attempts = $8, started_at = $9, completed_at = $10, \
                 updated_at = $11, soft_deleted_at = $12 \
             WHERE id = $1",
        )
        .bind(&item.id)
        .bind(&item.queue_name)
        .bind(&item.task_definition_id)
        .bind(&item.parameters)
        .bind(item.status.as_str())
        .bind(&item.output)
        .bind(&item.details)
        .bind(item.attempts)
        .bind(item.started_at.to_storage())
        .bind(item.completed_at.to_storage())
        .bind(format_datetime(Utc::now()))
        .bind(item.soft_deleted_at.to_storage())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TaskStoreError::queue_item_not_found(&item.id));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: &str) -> TaskStoreResult<()> {
        if id.trim().is_empty() {
            return Err(TaskStoreError::validation_error("queue item id is empty"));
        }

        let now = format_datetime(Utc::now());
        let result =
            sqlx::query("UPDATE task_queue SET soft_deleted_at = $1, updated_at = $2 WHERE id = $3")
                .bind(&now)
                .bind(&now)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(TaskStoreError::queue_item_not_found(id));
        }
        Ok(())
    }

    /// 原子认领：SQLite 没有 FOR UPDATE，改用单条带子查询的
    /// UPDATE … RETURNING，读-改-写在一条语句内完成，等价于串行事务。
    #[instrument(skip(self))]
    async fn claim_next(&self, queue_name: &str) -> TaskStoreResult<Option<QueueItem>> {
        let queue_name = normalize_queue_name(queue_name);
        let started_at = TimeField::now();
        let now_text = started_at.to_storage();

        let claim_sql = format!(
            "UPDATE task_queue SET status = $1, started_at = $2, updated_at = $3 \
             WHERE id = ( \
                 SELECT id FROM task_queue \
                 WHERE status = $4 AND queue_name = $5 AND soft_deleted_at > $6 \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
             ) \
             RETURNING {TASK_QUEUE_COLUMNS}"
        );
        let row = sqlx::query(&claim_sql)
            .bind(QueueItemStatus::Running.as_str())
            .bind(&now_text)
            .bind(&now_text)
            .bind(QueueItemStatus::Queued.as_str())
            .bind(&queue_name)
            .bind(&now_text)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let item = Self::row_to_item(&row)?;
        debug!("已认领队列任务: {} (queue={})", item.id, queue_name);
        Ok(Some(item))
    }

    async fn find_running(&self, queue_name: &str, limit: i64) -> TaskStoreResult<Vec<QueueItem>> {
        let queue_name = normalize_queue_name(queue_name);
        let query = TaskQueueQuery::new()
            .with_status(QueueItemStatus::Running)
            .with_queue_name(&queue_name)
            .with_sort(SortOrder::CreatedAtAsc)
            .with_limit(limit);
        self.list(&query).await
    }
}
