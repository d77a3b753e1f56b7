use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqlitePool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use taskstore_common::{format_datetime, normalize_queue_name};
use taskstore_domain::{Schedule, ScheduleQuery, ScheduleRepository};
use taskstore_errors::{TaskStoreError, TaskStoreResult};

use crate::database::mapping::{schedule_from_raw, RawSchedule};
use crate::database::sql::{build_due_schedules_query, build_schedule_query, SCHEDULE_COLUMNS};

pub struct SqliteScheduleRepository {
    pool: SqlitePool,
}

impl SqliteScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_schedule(row: &sqlx::sqlite::SqliteRow) -> TaskStoreResult<Schedule> {
        schedule_from_raw(RawSchedule {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            recurrence_rule: row.try_get("recurrence_rule")?,
            queue_name: row.try_get("queue_name")?,
            task_definition_id: row.try_get("task_definition_id")?,
            parameters: row.try_get("parameters")?,
            start_at: row.try_get("start_at")?,
            end_at: row.try_get("end_at")?,
            execution_count: row.try_get("execution_count")?,
            max_execution_count: row.try_get("max_execution_count")?,
            last_run_at: row.try_get("last_run_at")?,
            next_run_at: row.try_get("next_run_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            soft_deleted_at: row.try_get("soft_deleted_at")?,
        })
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepository {
    #[instrument(skip(self, schedule), fields(schedule_name = %schedule.name))]
    async fn create(&self, schedule: &Schedule) -> TaskStoreResult<Schedule> {
        let mut stored = schedule.clone();
        if stored.id.trim().is_empty() {
            stored.id = Uuid::new_v4().to_string();
        }
        stored.queue_name = normalize_queue_name(&stored.queue_name);

        let rule_json = serde_json::to_string(&stored.recurrence_rule)?;
        let parameters_json = serde_json::to_string(&stored.parameters)?;

        sqlx::query(
            "INSERT INTO schedules (id, name, description, status, recurrence_rule, queue_name, \
             task_definition_id, parameters, start_at, end_at, execution_count, \
             max_execution_count, last_run_at, next_run_at, created_at, updated_at, \
             soft_deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(&stored.id)
        .bind(&stored.name)
        .bind(&stored.description)
        .bind(stored.status.as_str())
        .bind(&rule_json)
        .bind(&stored.queue_name)
        .bind(&stored.task_definition_id)
        .bind(&parameters_json)
        .bind(stored.start_at.to_storage())
        .bind(stored.end_at.to_storage())
        .bind(stored.execution_count)
        .bind(stored.max_execution_count)
        .bind(stored.last_run_at.to_storage())
        .bind(stored.next_run_at.to_storage())
        .bind(format_datetime(stored.created_at))
        .bind(format_datetime(stored.updated_at))
        .bind(stored.soft_deleted_at.to_storage())
        .execute(&self.pool)
        .await?;

        debug!("调度计划已入库: {} ({})", stored.name, stored.id);
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> TaskStoreResult<Option<Schedule>> {
        if id.trim().is_empty() {
            return Err(TaskStoreError::validation_error("schedule id is empty"));
        }

        let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_schedule(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, query: &ScheduleQuery) -> TaskStoreResult<Vec<Schedule>> {
        query.validate()?;

        let (sql, binds) = build_schedule_query(query);
        let mut statement = sqlx::query(&sql);
        for bind in &binds {
            statement = statement.bind(bind);
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_schedule).collect()
    }

    #[instrument(skip(self, schedule), fields(schedule_id = %schedule.id))]
    async fn update(&self, schedule: &Schedule) -> TaskStoreResult<()> {
        let rule_json = serde_json::to_string(&schedule.recurrence_rule)?;
        let parameters_json = serde_json::to_string(&schedule.parameters)?;

        let result = sqlx::query(
            "UPDATE schedules \
             SET name = $2, description = $3, status = $4, recurrence_rule = $5, \
                 queue_name = $6, task_definition_id = $7, parameters = $8, start_at = $9, \
                 end_at = $10, execution_count = $11, max_execution_count = $12, \
                 last_run_at = $13, next_run_at = $14, updated_at = $15, soft_deleted_at = $16 \
             WHERE id = $1",
        )
        .bind(&schedule.id)
        .bind(&schedule.name)
        .bind(&schedule.description)
        .bind(schedule.status.as_str())
        .bind(&rule_json)
        .bind(&schedule.queue_name)
        .bind(&schedule.task_definition_id)
        .bind(&parameters_json)
        .bind(schedule.start_at.to_storage())
        .bind(schedule.end_at.to_storage())
        .bind(schedule.execution_count)
        .bind(schedule.max_execution_count)
        .bind(schedule.last_run_at.to_storage())
        .bind(schedule.next_run_at.to_storage())
        .bind(format_datetime(Utc::now()))
        .bind(schedule.soft_deleted_at.to_storage())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TaskStoreError::schedule_not_found(&schedule.id));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: &str) -> TaskStoreResult<()> {
        if id.trim().is_empty() {
            return Err(TaskStoreError::validation_error("schedule id is empty"));
        }

        let now = format_datetime(Utc::now());
        let result =
            sqlx::query("UPDATE schedules SET soft_deleted_at = $1, updated_at = $2 WHERE id = $3")
                .bind(&now)
                .bind(&now)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(TaskStoreError::schedule_not_found(id));
        }
        Ok(())
    }

    async fn list_due(&self, now: DateTime<Utc>) -> TaskStoreResult<Vec<Schedule>> {
        let (sql, binds) = build_due_schedules_query(&format_datetime(now));
        let mut statement = sqlx::query(&sql);
        for bind in &binds {
            statement = statement.bind(bind);
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_schedule).collect()
    }
}
