use std::sync::Arc;

use taskstore_domain::{ScheduleRepository, TaskDefinitionRepository, TaskQueueRepository};
use taskstore_errors::{TaskStoreError, TaskStoreResult};

use super::migrations::SCHEMA_STATEMENTS;
use super::postgres::{
    PostgresScheduleRepository, PostgresTaskDefinitionRepository, PostgresTaskQueueRepository,
};
use super::sqlite::{
    SqliteScheduleRepository, SqliteTaskDefinitionRepository, SqliteTaskQueueRepository,
};

/// Database type detection from the connection URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    PostgreSql,
    Sqlite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DatabaseType::PostgreSql
        } else {
            DatabaseType::Sqlite
        }
    }
}

/// Connection pool wrapper covering both supported backends
pub enum DatabasePool {
    PostgreSql(sqlx::PgPool),
    Sqlite(sqlx::SqlitePool),
}

impl DatabasePool {
    /// Create a pool from a URL with automatic backend detection
    pub async fn connect(url: &str, max_connections: u32) -> TaskStoreResult<Self> {
        match DatabaseType::from_url(url) {
            DatabaseType::PostgreSql => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await
                    .map_err(TaskStoreError::Database)?;
                Ok(DatabasePool::PostgreSql(pool))
            }
            DatabaseType::Sqlite => {
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await
                    .map_err(TaskStoreError::Database)?;
                Ok(DatabasePool::Sqlite(pool))
            }
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            DatabasePool::PostgreSql(_) => DatabaseType::PostgreSql,
            DatabasePool::Sqlite(_) => DatabaseType::Sqlite,
        }
    }

    /// Create the three core tables when they do not exist yet
    pub async fn automigrate(&self) -> TaskStoreResult<()> {
        for statement in SCHEMA_STATEMENTS {
            match self {
                DatabasePool::PostgreSql(pool) => {
                    sqlx::query(statement)
                        .execute(pool)
                        .await
                        .map_err(TaskStoreError::Database)?;
                }
                DatabasePool::Sqlite(pool) => {
                    sqlx::query(statement)
                        .execute(pool)
                        .await
                        .map_err(TaskStoreError::Database)?;
                }
            }
        }
        Ok(())
    }

    pub async fn health_check(&self) -> TaskStoreResult<()> {
        match self {
            DatabasePool::PostgreSql(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(TaskStoreError::Database)?;
            }
            DatabasePool::Sqlite(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(TaskStoreError::Database)?;
            }
        }
        Ok(())
    }

    pub async fn close(&self) {
        match self {
            DatabasePool::PostgreSql(pool) => pool.close().await,
            DatabasePool::Sqlite(pool) => pool.close().await,
        }
    }
}

/// Repository factory over a shared pool
pub struct DatabaseManager {
    pool: Arc<DatabasePool>,
}

impl DatabaseManager {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(url: &str, max_connections: u32) -> TaskStoreResult<Self> {
        Ok(Self::new(DatabasePool::connect(url, max_connections).await?))
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub async fn automigrate(&self) -> TaskStoreResult<()> {
        self.pool.automigrate().await
    }

    pub fn task_queue_repository(&self) -> Arc<dyn TaskQueueRepository> {
        match self.pool.as_ref() {
            DatabasePool::PostgreSql(pool) => {
                Arc::new(PostgresTaskQueueRepository::new(pool.clone()))
            }
            DatabasePool::Sqlite(pool) => Arc::new(SqliteTaskQueueRepository::new(pool.clone())),
        }
    }

    pub fn task_definition_repository(&self) -> Arc<dyn TaskDefinitionRepository> {
        match self.pool.as_ref() {
            DatabasePool::PostgreSql(pool) => {
                Arc::new(PostgresTaskDefinitionRepository::new(pool.clone()))
            }
            DatabasePool::Sqlite(pool) => {
                Arc::new(SqliteTaskDefinitionRepository::new(pool.clone()))
            }
        }
    }

    pub fn schedule_repository(&self) -> Arc<dyn ScheduleRepository> {
        match self.pool.as_ref() {
            DatabasePool::PostgreSql(pool) => {
                Arc::new(PostgresScheduleRepository::new(pool.clone()))
            }
            DatabasePool::Sqlite(pool) => Arc::new(SqliteScheduleRepository::new(pool.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_detection() {
        assert_eq!(
            DatabaseType::from_url("postgres://localhost/taskstore"),
            DatabaseType::PostgreSql
        );
        assert_eq!(
            DatabaseType::from_url("postgresql://localhost/taskstore"),
            DatabaseType::PostgreSql
        );
        assert_eq!(
            DatabaseType::from_url("sqlite://taskstore.db"),
            DatabaseType::Sqlite
        );
        assert_eq!(DatabaseType::from_url("sqlite::memory:"), DatabaseType::Sqlite);
    }

    #[tokio::test]
    async fn test_sqlite_pool_with_automigrate() {
        let manager = DatabaseManager::connect("sqlite::memory:", 1).await.unwrap();
        manager.automigrate().await.unwrap();
        // Second run must be a no-op
        manager.automigrate().await.unwrap();
        manager.pool().health_check().await.unwrap();
    }
}
