use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use taskstore_common::format_datetime;
use taskstore_domain::{TaskDefinition, TaskDefinitionQuery, TaskDefinitionRepository};
use taskstore_errors::{TaskStoreError, TaskStoreResult};

use crate::database::mapping::{task_definition_from_raw, RawTaskDefinition};
use crate::database::sql::{build_task_definition_query, TASK_DEFINITION_COLUMNS};

pub struct PostgresTaskDefinitionRepository {
    pool: PgPool,
}

impl PostgresTaskDefinitionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_definition(row: &sqlx::postgres::PgRow) -> TaskStoreResult<TaskDefinition> {
        use sqlx::Row;
        task_definition_from_raw(RawTaskDefinition {
            id: row.try_get("id")?,
            alias: row.try_get("alias")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            memo: row.try_get("memo")?,
            is_recurring: row.try_get("is_recurring")?,
            recurrence_rule: row.try_get("recurrence_rule")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            soft_deleted_at: row.try_get("soft_deleted_at")?,
        })
    }
}

#[async_trait]
impl TaskDefinitionRepository for PostgresTaskDefinitionRepository {
    #[instrument(skip(self, definition), fields(alias = %definition.alias))]
    async fn create(&self, definition: &TaskDefinition) -> TaskStoreResult<TaskDefinition> {
        if definition.alias.trim().is_empty() {
            return Err(TaskStoreError::validation_error("alias is empty"));
        }

        let mut stored = definition.clone();
        if stored.id.trim().is_empty() {
            stored.id = Uuid::new_v4().to_string();
        }

        sqlx::query(
            "INSERT INTO task_definitions (id, alias, title, description, memo, is_recurring, \
             recurrence_rule, status, created_at, updated_at, soft_deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&stored.id)
        .bind(&stored.alias)
        .bind(&stored.title)
        .bind(&stored.description)
        .bind(&stored.memo)
        .bind(stored.is_recurring as i64)
        .bind(&stored.recurrence_rule)
        .bind(stored.status.as_str())
        .bind(format_datetime(stored.created_at))
        .bind(format_datetime(stored.updated_at))
        .bind(stored.soft_deleted_at.to_storage())
        .execute(&self.pool)
        .await?;

        debug!("任务定义已入库: {} ({})", stored.alias, stored.id);
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> TaskStoreResult<Option<TaskDefinition>> {
        if id.trim().is_empty() {
            return Err(TaskStoreError::validation_error("definition id is empty"));
        }

        let sql = format!("SELECT {TASK_DEFINITION_COLUMNS} FROM task_definitions WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_definition(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_alias(&self, alias: &str) -> TaskStoreResult<Option<TaskDefinition>> {
        if alias.trim().is_empty() {
            return Err(TaskStoreError::validation_error("alias is empty"));
        }

        let query = TaskDefinitionQuery::new().with_alias(alias).with_limit(1);
        let definitions = self.list(&query).await?;
        Ok(definitions.into_iter().next())
    }

    async fn list(&self, query: &TaskDefinitionQuery) -> TaskStoreResult<Vec<TaskDefinition>> {
        query.validate()?;

        let (sql, binds) = build_task_definition_query(query);
        let mut statement = sqlx::query(&sql);
        for bind in &binds {
            statement = statement.bind(bind);
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_definition).collect()
    }

    #[instrument(skip(self, definition), fields(definition_id = %definition.id))]
    async fn update(&self, definition: &TaskDefinition) -> TaskStoreResult<()> {
        let result = sqlx::query(
            "UPDATE task_definitions \
             SET alias = $2, title = $3, description = $4, memo = $5, is_recurring = $6, \
                 recurrence_rule = $7, status = $8, updated_at = $9, soft_deleted_at = $10 \
             WHERE id = $1",
        )
        .bind(&definition.id)
        .bind(&definition.alias)
        .bind(&definition.title)
        .bind(&definition.description)
        .bind(&definition.memo)
        .bind(definition.is_recurring as i64)
        .bind(&definition.recurrence_rule)
        .bind(definition.status.as_str())
        .bind(format_datetime(Utc::now()))
        .bind(definition.soft_deleted_at.to_storage())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TaskStoreError::definition_not_found(&definition.id));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: &str) -> TaskStoreResult<()> {
        if id.trim().is_empty() {
            return Err(TaskStoreError::validation_error("definition id is empty"));
        }

        let now = format_datetime(Utc::now());
        let result = sqlx::query(
            "UPDATE task_definitions SET soft_deleted_at = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TaskStoreError::definition_not_found(id));
        }
        Ok(())
    }
}
