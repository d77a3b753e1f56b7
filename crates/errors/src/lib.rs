use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("任务定义未找到: {id}")]
    TaskDefinitionNotFound { id: String },
    #[error("task with alias '{alias}' not found")]
    TaskDefinitionAliasNotFound { alias: String },
    #[error("队列任务未找到: {id}")]
    QueueItemNotFound { id: String },
    #[error("调度计划未找到: {id}")]
    ScheduleNotFound { id: String },
    #[error("task not found")]
    HandlerTaskMissing,
    #[error("无效的重复规则: {0}")]
    InvalidRecurrenceRule(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("数据验证失败: {0}")]
    Validation(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

impl TaskStoreError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn definition_not_found<S: Into<String>>(id: S) -> Self {
        Self::TaskDefinitionNotFound { id: id.into() }
    }
    pub fn alias_not_found<S: Into<String>>(alias: S) -> Self {
        Self::TaskDefinitionAliasNotFound {
            alias: alias.into(),
        }
    }
    pub fn queue_item_not_found<S: Into<String>>(id: S) -> Self {
        Self::QueueItemNotFound { id: id.into() }
    }
    pub fn schedule_not_found<S: Into<String>>(id: S) -> Self {
        Self::ScheduleNotFound { id: id.into() }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskStoreError::Database(_) | TaskStoreError::DatabaseOperation(_)
        )
    }
    pub fn is_validation(&self) -> bool {
        matches!(self, TaskStoreError::Validation(_))
    }
}

impl From<serde_json::Error> for TaskStoreError {
    fn from(err: serde_json::Error) -> Self {
        TaskStoreError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for TaskStoreError {
    fn from(err: anyhow::Error) -> Self {
        TaskStoreError::Internal(err.to_string())
    }
}
