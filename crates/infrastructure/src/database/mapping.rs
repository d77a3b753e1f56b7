//! # 行映射
//!
//! 数据库行与领域实体之间的转换。行先被读成纯字符串/整数的
//! 原始结构，再集中解析，两个后端共享同一套解析规则。

use chrono::{DateTime, Utc};

use taskstore_common::parse_datetime;
use taskstore_domain::{QueueItem, RecurrenceRule, Schedule, TaskDefinition, TimeField};
use taskstore_errors::{TaskStoreError, TaskStoreResult};

fn parse_required(text: &str, column: &str) -> TaskStoreResult<DateTime<Utc>> {
    parse_datetime(text)
        .ok_or_else(|| TaskStoreError::database_error(format!("无法解析 {column} 列: {text}")))
}

/// task_queue 表的原始行
pub struct RawQueueItem {
    pub id: String,
    pub queue_name: String,
    pub task_id: String,
    pub parameters: String,
    pub status: String,
    pub output: String,
    pub details: String,
    pub attempts: i64,
    pub started_at: String,
    pub completed_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub soft_deleted_at: String,
}

pub fn queue_item_from_raw(raw: RawQueueItem) -> TaskStoreResult<QueueItem> {
    Ok(QueueItem {
        id: raw.id,
        queue_name: raw.queue_name,
        task_definition_id: raw.task_id,
        parameters: raw.parameters,
        status: raw.status.parse()?,
        output: raw.output,
        details: raw.details,
        attempts: raw.attempts,
        started_at: TimeField::from_storage(&raw.started_at),
        completed_at: TimeField::from_storage(&raw.completed_at),
        created_at: parse_required(&raw.created_at, "created_at")?,
        updated_at: parse_required(&raw.updated_at, "updated_at")?,
        soft_deleted_at: TimeField::from_storage(&raw.soft_deleted_at),
    })
}

/// task_definitions 表的原始行
pub struct RawTaskDefinition {
    pub id: String,
    pub alias: String,
    pub title: String,
    pub description: String,
    pub memo: String,
    pub is_recurring: i64,
    pub recurrence_rule: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub soft_deleted_at: String,
}

pub fn task_definition_from_raw(raw: RawTaskDefinition) -> TaskStoreResult<TaskDefinition> {
    Ok(TaskDefinition {
        id: raw.id,
        alias: raw.alias,
        title: raw.title,
        description: raw.description,
        memo: raw.memo,
        is_recurring: raw.is_recurring != 0,
        recurrence_rule: raw.recurrence_rule,
        status: raw.status.parse()?,
        created_at: parse_required(&raw.created_at, "created_at")?,
        updated_at: parse_required(&raw.updated_at, "updated_at")?,
        soft_deleted_at: TimeField::from_storage(&raw.soft_deleted_at),
    })
}

/// schedules 表的原始行
pub struct RawSchedule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub recurrence_rule: String,
    pub queue_name: String,
    pub task_definition_id: String,
    pub parameters: String,
    pub start_at: String,
    pub end_at: String,
    pub execution_count: i64,
    pub max_execution_count: i64,
    pub last_run_at: String,
    pub next_run_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub soft_deleted_at: String,
}

pub fn schedule_from_raw(raw: RawSchedule) -> TaskStoreResult<Schedule> {
    let recurrence_rule = if raw.recurrence_rule.trim().is_empty() {
        RecurrenceRule::default()
    } else {
        serde_json::from_str(&raw.recurrence_rule)?
    };
    let parameters = if raw.parameters.trim().is_empty() {
        serde_json::Map::new()
    } else {
        serde_json::from_str(&raw.parameters)?
    };

    Ok(Schedule {
        id: raw.id,
        name: raw.name,
        description: raw.description,
        status: raw.status.parse()?,
        recurrence_rule,
        queue_name: raw.queue_name,
        task_definition_id: raw.task_definition_id,
        parameters,
        start_at: TimeField::from_storage(&raw.start_at),
        end_at: TimeField::from_storage(&raw.end_at),
        execution_count: raw.execution_count,
        max_execution_count: raw.max_execution_count,
        last_run_at: TimeField::from_storage(&raw.last_run_at),
        next_run_at: TimeField::from_storage(&raw.next_run_at),
        created_at: parse_required(&raw.created_at, "created_at")?,
        updated_at: parse_required(&raw.updated_at, "updated_at")?,
        soft_deleted_at: TimeField::from_storage(&raw.soft_deleted_at),
    })
}
