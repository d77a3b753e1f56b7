//! # taskstore
//!
//! 以关系型存储为底座的持久化多队列任务执行平台。生产者入队引用
//! 任务定义的工作项，后台 worker 原子认领并调用进程内处理器，
//! 调度引擎按重复规则把计划物化为队列任务。
//!
//! 本 crate 是装配层：嵌入方通过 [`Application`] 组装平台，
//! 注册处理器后调用 `run`。各子系统位于 `taskstore-*` 成员 crate。

pub mod app;
pub mod shutdown;

pub use app::Application;
pub use shutdown::ShutdownManager;

pub use taskstore_application::EnqueueService;
pub use taskstore_common::{Shutdown, DEFAULT_QUEUE_NAME};
pub use taskstore_config::AppConfig;
pub use taskstore_dispatcher::{ScheduleRunner, ScheduleRunnerOptions};
pub use taskstore_domain::{
    next_run_at, Frequency, NextOccurrence, QueueItem, QueueItemStatus, RecurrenceRule, Schedule,
    ScheduleRepository, ScheduleStatus, TaskDefinition, TaskDefinitionRepository,
    TaskQueueRepository, TimeField,
};
pub use taskstore_errors::{TaskStoreError, TaskStoreResult};
pub use taskstore_infrastructure::{DatabaseManager, DatabasePool};
pub use taskstore_worker::{
    TaskHandler, TaskHandlerRegistry, TaskInvocation, TaskQueueRunner, TaskQueueRunnerOptions,
    Unstucker,
};
