//! # 查询对象
//!
//! 仓储列表操作的过滤条件。条件在进入存储层前校验，
//! 默认排除软删除行，需要时显式带上。

use chrono::{DateTime, Utc};

use taskstore_errors::{TaskStoreError, TaskStoreResult};

use crate::value_objects::{QueueItemStatus, ScheduleStatus, TaskDefinitionStatus};

/// 列表排序方向，按创建时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    CreatedAtAsc,
    #[default]
    CreatedAtDesc,
}

/// 队列任务查询条件
#[derive(Debug, Clone, Default)]
pub struct TaskQueueQuery {
    pub id: Option<String>,
    pub status: Option<QueueItemStatus>,
    pub statuses: Option<Vec<QueueItemStatus>>,
    pub queue_name: Option<String>,
    pub task_definition_id: Option<String>,
    pub created_at_gte: Option<DateTime<Utc>>,
    pub created_at_lte: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: SortOrder,
    pub with_soft_deleted: bool,
}

impl TaskQueueQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_status(mut self, status: QueueItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_statuses(mut self, statuses: Vec<QueueItemStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn with_queue_name(mut self, queue_name: &str) -> Self {
        self.queue_name = Some(queue_name.to_string());
        self
    }

    pub fn with_task_definition_id(mut self, task_definition_id: &str) -> Self {
        self.task_definition_id = Some(task_definition_id.to_string());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_soft_deleted(mut self) -> Self {
        self.with_soft_deleted = true;
        self
    }

    pub fn validate(&self) -> TaskStoreResult<()> {
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(TaskStoreError::validation_error("queue item id is empty"));
            }
        }
        if matches!(self.limit, Some(limit) if limit < 0) {
            return Err(TaskStoreError::validation_error("limit is negative"));
        }
        if matches!(self.offset, Some(offset) if offset < 0) {
            return Err(TaskStoreError::validation_error("offset is negative"));
        }
        // SQLite 的 OFFSET 必须伴随 LIMIT，两个后端统一要求
        if self.offset.is_some() && self.limit.is_none() {
            return Err(TaskStoreError::validation_error("offset requires limit"));
        }
        Ok(())
    }
}

/// 任务定义查询条件
#[derive(Debug, Clone, Default)]
pub struct TaskDefinitionQuery {
    pub id: Option<String>,
    pub alias: Option<String>,
    pub status: Option<TaskDefinitionStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub with_soft_deleted: bool,
}

impl TaskDefinitionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn with_status(mut self, status: TaskDefinitionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> TaskStoreResult<()> {
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(TaskStoreError::validation_error("definition id is empty"));
            }
        }
        if let Some(alias) = &self.alias {
            if alias.trim().is_empty() {
                return Err(TaskStoreError::validation_error("alias is empty"));
            }
        }
        if matches!(self.limit, Some(limit) if limit < 0) {
            return Err(TaskStoreError::validation_error("limit is negative"));
        }
        if self.offset.is_some() && self.limit.is_none() {
            return Err(TaskStoreError::validation_error("offset requires limit"));
        }
        Ok(())
    }
}

/// 调度计划查询条件
#[derive(Debug, Clone, Default)]
pub struct ScheduleQuery {
    pub id: Option<String>,
    pub status: Option<ScheduleStatus>,
    pub queue_name: Option<String>,
    pub task_definition_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub with_soft_deleted: bool,
}

impl ScheduleQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_status(mut self, status: ScheduleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_queue_name(mut self, queue_name: &str) -> Self {
        self.queue_name = Some(queue_name.to_string());
        self
    }

    pub fn with_task_definition_id(mut self, task_definition_id: &str) -> Self {
        self.task_definition_id = Some(task_definition_id.to_string());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> TaskStoreResult<()> {
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(TaskStoreError::validation_error("schedule id is empty"));
            }
        }
        if matches!(self.limit, Some(limit) if limit < 0) {
            return Err(TaskStoreError::validation_error("limit is negative"));
        }
        if self.offset.is_some() && self.limit.is_none() {
            return Err(TaskStoreError::validation_error("offset requires limit"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_queue_query_validation() {
        assert!(TaskQueueQuery::new().validate().is_ok());
        assert!(TaskQueueQuery::new()
            .with_status(QueueItemStatus::Queued)
            .with_queue_name("emails")
            .with_limit(10)
            .validate()
            .is_ok());

        assert!(TaskQueueQuery::new().with_id("  ").validate().is_err());
        assert!(TaskQueueQuery::new().with_limit(-1).validate().is_err());
        assert!(TaskQueueQuery::new().with_offset(-5).validate().is_err());
        assert!(TaskQueueQuery::new().with_offset(5).validate().is_err());
        assert!(TaskQueueQuery::new()
            .with_limit(10)
            .with_offset(5)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_definition_query_validation() {
        assert!(TaskDefinitionQuery::new()
            .with_alias("send-email")
            .validate()
            .is_ok());
        assert!(TaskDefinitionQuery::new().with_alias("").validate().is_err());
        assert!(TaskDefinitionQuery::new().with_id("").validate().is_err());
    }

    #[test]
    fn test_schedule_query_validation() {
        assert!(ScheduleQuery::new()
            .with_status(ScheduleStatus::Active)
            .validate()
            .is_ok());
        assert!(ScheduleQuery::new().with_id(" ").validate().is_err());
        assert!(ScheduleQuery::new().with_limit(-2).validate().is_err());
    }
}
