//! # 领域实体
//!
//! 队列任务、任务定义与调度计划。实体是带辅助方法的普通结构体，
//! 不感知存储后端；时间字段使用 `TimeField` 表达三值语义。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use taskstore_common::{format_datetime, normalize_queue_name, DEFAULT_QUEUE_NAME};
use taskstore_errors::TaskStoreResult;

use crate::recurrence::{next_run_at, RecurrenceRule};
use crate::value_objects::{
    Frequency, QueueItemStatus, ScheduleStatus, TaskDefinitionStatus, TimeField,
};

// ============================================================================
// 队列任务
// ============================================================================

/// 队列中的一个工作单元
///
/// 生命周期：由入队服务以 queued 状态创建；只能经由原子认领进入
/// running；由执行它的 worker 恰好一次地置为 success 或 failed；
/// 卡死恢复可将超时的 running 任务强制置为 failed。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub queue_name: String,
    /// 指向任务定义的外键，处理时经由定义解析出处理器别名
    pub task_definition_id: String,
    /// JSON 对象文本，入队时已写入保留键 task_alias
    pub parameters: String,
    pub status: QueueItemStatus,
    pub output: String,
    /// 追加式审计日志，每行带时间戳
    pub details: String,
    pub attempts: i64,
    pub started_at: TimeField,
    pub completed_at: TimeField,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub soft_deleted_at: TimeField,
}

impl QueueItem {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            task_definition_id: String::new(),
            parameters: "{}".to_string(),
            status: QueueItemStatus::Queued,
            output: String::new(),
            details: String::new(),
            attempts: 0,
            started_at: TimeField::Unset,
            completed_at: TimeField::Unset,
            created_at: now,
            updated_at: now,
            soft_deleted_at: TimeField::Indefinite,
        }
    }

    pub fn is_queued(&self) -> bool {
        self.status == QueueItemStatus::Queued
    }

    pub fn is_running(&self) -> bool {
        self.status == QueueItemStatus::Running
    }

    pub fn is_success(&self) -> bool {
        self.status == QueueItemStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == QueueItemStatus::Failed
    }

    pub fn is_soft_deleted(&self) -> bool {
        match self.soft_deleted_at {
            TimeField::At(deleted_at) => deleted_at <= Utc::now(),
            _ => false,
        }
    }

    /// 追加一行审计日志，不负责持久化
    pub fn append_details(&mut self, message: &str) {
        let line = format!("{} : {}", format_datetime(Utc::now()), message);
        if !self.details.is_empty() {
            self.details.push('\n');
        }
        self.details.push_str(&line);
    }

    /// 解析参数 JSON 为对象
    pub fn parameters_map(&self) -> TaskStoreResult<Map<String, Value>> {
        if self.parameters.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&self.parameters)?)
    }

    pub fn set_parameters_map(&mut self, parameters: &Map<String, Value>) -> TaskStoreResult<()> {
        self.parameters = serde_json::to_string(parameters)?;
        Ok(())
    }

    /// 置为运行中并打点开始时间
    pub fn mark_running(&mut self) {
        self.status = QueueItemStatus::Running;
        self.started_at = TimeField::now();
    }

    pub fn mark_success(&mut self) {
        self.status = QueueItemStatus::Success;
        self.completed_at = TimeField::now();
    }

    pub fn mark_failed(&mut self) {
        self.status = QueueItemStatus::Failed;
        self.completed_at = TimeField::now();
    }

    /// 运行时间是否超过阈值；未真正开始的任务永远不算超时
    pub fn is_overdue(&self, threshold_minutes: i64, now: DateTime<Utc>) -> bool {
        match self.started_at.as_datetime() {
            Some(started_at) => now > started_at + Duration::minutes(threshold_minutes),
            None => false,
        }
    }
}

impl Default for QueueItem {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 任务定义
// ============================================================================

/// 任务定义：队列任务引用的持久化处理器描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    /// 唯一别名，查找时忽略大小写与 `-`/`_`
    pub alias: String,
    pub title: String,
    pub description: String,
    pub memo: String,
    pub is_recurring: bool,
    /// 历史遗留列，调度核心从 schedules 表读取规则
    pub recurrence_rule: String,
    pub status: TaskDefinitionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub soft_deleted_at: TimeField,
}

impl TaskDefinition {
    pub fn new(alias: &str, title: &str, description: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            alias: alias.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            memo: String::new(),
            is_recurring: false,
            recurrence_rule: String::new(),
            status: TaskDefinitionStatus::Active,
            created_at: now,
            updated_at: now,
            soft_deleted_at: TimeField::Indefinite,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TaskDefinitionStatus::Active
    }

    pub fn is_soft_deleted(&self) -> bool {
        match self.soft_deleted_at {
            TimeField::At(deleted_at) => deleted_at <= Utc::now(),
            _ => false,
        }
    }
}

// ============================================================================
// 调度计划
// ============================================================================

/// 调度计划：在计算出的触发时刻将任务物化进队列的持久化描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: ScheduleStatus,
    pub recurrence_rule: RecurrenceRule,
    pub queue_name: String,
    pub task_definition_id: String,
    pub parameters: Map<String, Value>,
    pub start_at: TimeField,
    pub end_at: TimeField,
    pub execution_count: i64,
    /// 0 表示不限次数
    pub max_execution_count: i64,
    pub last_run_at: TimeField,
    pub next_run_at: TimeField,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub soft_deleted_at: TimeField,
}

impl Schedule {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: String::new(),
            description: String::new(),
            status: ScheduleStatus::Draft,
            recurrence_rule: RecurrenceRule::new(),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            task_definition_id: String::new(),
            parameters: Map::new(),
            start_at: TimeField::Unset,
            end_at: TimeField::Indefinite,
            execution_count: 0,
            max_execution_count: 0,
            last_run_at: TimeField::Unset,
            next_run_at: TimeField::Unset,
            created_at: now,
            updated_at: now,
            soft_deleted_at: TimeField::Indefinite,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ScheduleStatus::Active
    }

    pub fn is_soft_deleted(&self) -> bool {
        match self.soft_deleted_at {
            TimeField::At(deleted_at) => deleted_at <= Utc::now(),
            _ => false,
        }
    }

    pub fn set_queue_name(&mut self, queue_name: &str) {
        self.queue_name = normalize_queue_name(queue_name);
    }

    /// 结束时间是否已过
    pub fn has_reached_end_date(&self, now: DateTime<Utc>) -> bool {
        match self.end_at {
            TimeField::At(end_at) => now > end_at,
            _ => false,
        }
    }

    /// 是否达到最大执行次数；上限为 0 表示不限
    pub fn has_reached_max_executions(&self) -> bool {
        self.max_execution_count > 0 && self.execution_count >= self.max_execution_count
    }

    /// 单次触发的计划是否已经执行过
    pub fn has_spent_single_run(&self) -> bool {
        self.recurrence_rule.frequency == Frequency::None && self.execution_count >= 1
    }

    /// 规则是否已耗尽（游标被置为无限期后不会再触发）
    pub fn is_rule_exhausted(&self) -> bool {
        matches!(self.next_run_at, TimeField::Indefinite)
    }

    /// 是否到期：下次触发时刻存在且不晚于参考时间
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_run_at {
            TimeField::At(next_run_at) => next_run_at <= now,
            _ => false,
        }
    }

    /// 由重复规则计算下一次触发时刻
    pub fn next_occurrence(&self, now: DateTime<Utc>) -> TaskStoreResult<TimeField> {
        Ok(next_run_at(&self.recurrence_rule, now)?.to_time_field())
    }

    /// 重新计算并写入下次触发游标
    pub fn update_next_run_at(&mut self, now: DateTime<Utc>) -> TaskStoreResult<()> {
        self.next_run_at = self.next_occurrence(now)?;
        Ok(())
    }

    pub fn update_last_run_at(&mut self) {
        self.last_run_at = TimeField::now();
    }

    pub fn increment_execution_count(&mut self) {
        self.execution_count += 1;
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}
