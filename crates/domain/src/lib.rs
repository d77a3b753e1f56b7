//! # taskstore-domain
//!
//! 任务执行平台的核心领域模型：实体、值对象、重复规则求值器
//! 与仓储抽象。本 crate 不依赖具体的存储实现。

pub mod entities;
pub mod queries;
pub mod recurrence;
pub mod repositories;
pub mod value_objects;

pub use entities::*;
pub use queries::*;
pub use recurrence::{next_run_at, NextOccurrence, RecurrenceRule, MAX_FILTER_SCAN_STEPS};
pub use repositories::*;
pub use value_objects::*;

pub use taskstore_errors::{TaskStoreError, TaskStoreResult};
