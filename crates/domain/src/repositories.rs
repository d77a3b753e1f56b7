//! # 仓储抽象
//!
//! 存储网关的窄接口。核心只依赖这些 trait，Postgres 与 SQLite
//! 的实现位于 infrastructure crate。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use taskstore_errors::TaskStoreResult;

use crate::entities::{QueueItem, Schedule, TaskDefinition};
use crate::queries::{ScheduleQuery, TaskDefinitionQuery, TaskQueueQuery};

/// 队列任务仓储
///
/// `claim_next` 是并发安全的核心原语：在同一事务内选出最旧的
/// queued 任务并置为 running，同一任务至多交给一个调用方。
#[async_trait]
pub trait TaskQueueRepository: Send + Sync {
    async fn create(&self, item: &QueueItem) -> TaskStoreResult<QueueItem>;
    async fn find_by_id(&self, id: &str) -> TaskStoreResult<Option<QueueItem>>;
    async fn list(&self, query: &TaskQueueQuery) -> TaskStoreResult<Vec<QueueItem>>;
    async fn count(&self, query: &TaskQueueQuery) -> TaskStoreResult<i64>;
    async fn update(&self, item: &QueueItem) -> TaskStoreResult<()>;
    async fn soft_delete(&self, id: &str) -> TaskStoreResult<()>;

    /// 原子认领指定队列中最旧的排队任务；无任务可认领时返回 None
    async fn claim_next(&self, queue_name: &str) -> TaskStoreResult<Option<QueueItem>>;

    /// 按创建时间升序列出指定队列中运行中的任务
    async fn find_running(&self, queue_name: &str, limit: i64) -> TaskStoreResult<Vec<QueueItem>>;
}

/// 任务定义仓储
#[async_trait]
pub trait TaskDefinitionRepository: Send + Sync {
    async fn create(&self, definition: &TaskDefinition) -> TaskStoreResult<TaskDefinition>;
    async fn find_by_id(&self, id: &str) -> TaskStoreResult<Option<TaskDefinition>>;
    async fn find_by_alias(&self, alias: &str) -> TaskStoreResult<Option<TaskDefinition>>;
    async fn list(&self, query: &TaskDefinitionQuery) -> TaskStoreResult<Vec<TaskDefinition>>;
    async fn update(&self, definition: &TaskDefinition) -> TaskStoreResult<()>;
    async fn soft_delete(&self, id: &str) -> TaskStoreResult<()>;
}

/// 调度计划仓储
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create(&self, schedule: &Schedule) -> TaskStoreResult<Schedule>;
    async fn find_by_id(&self, id: &str) -> TaskStoreResult<Option<Schedule>>;
    async fn list(&self, query: &ScheduleQuery) -> TaskStoreResult<Vec<Schedule>>;
    async fn update(&self, schedule: &Schedule) -> TaskStoreResult<()>;
    async fn soft_delete(&self, id: &str) -> TaskStoreResult<()>;

    /// 列出所有到期的活跃计划：status=active 且 next_run_at <= now
    async fn list_due(&self, now: DateTime<Utc>) -> TaskStoreResult<Vec<Schedule>>;
}
