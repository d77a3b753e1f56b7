//! Test data builders
//!
//! Builder helpers creating entities with sensible defaults and easy
//! per-field customization.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use taskstore_domain::{
    Frequency, QueueItem, QueueItemStatus, RecurrenceRule, Schedule, ScheduleStatus,
    TaskDefinition, TimeField,
};

/// Builder for queue items
pub struct QueueItemBuilder {
    item: QueueItem,
}

impl QueueItemBuilder {
    pub fn new() -> Self {
        Self {
            item: QueueItem::new(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.item.id = id.to_string();
        self
    }

    pub fn with_queue_name(mut self, queue_name: &str) -> Self {
        self.item.queue_name = queue_name.to_string();
        self
    }

    pub fn with_task_definition_id(mut self, task_definition_id: &str) -> Self {
        self.item.task_definition_id = task_definition_id.to_string();
        self
    }

    pub fn with_status(mut self, status: QueueItemStatus) -> Self {
        self.item.status = status;
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.item
            .set_parameters_map(&parameters)
            .expect("parameters must encode");
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.item.created_at = created_at;
        self
    }

    pub fn with_started_at(mut self, started_at: TimeField) -> Self {
        self.item.started_at = started_at;
        self
    }

    pub fn with_attempts(mut self, attempts: i64) -> Self {
        self.item.attempts = attempts;
        self
    }

    pub fn build(self) -> QueueItem {
        self.item
    }
}

impl Default for QueueItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for task definitions
pub struct TaskDefinitionBuilder {
    definition: TaskDefinition,
}

impl TaskDefinitionBuilder {
    pub fn new(alias: &str) -> Self {
        Self {
            definition: TaskDefinition::new(alias, "Test Task", "a task used in tests"),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.definition.id = id.to_string();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.definition.title = title.to_string();
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.definition
    }
}

/// Builder for schedules
pub struct ScheduleBuilder {
    schedule: Schedule,
}

impl ScheduleBuilder {
    pub fn new() -> Self {
        Self {
            schedule: Schedule::new(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.schedule.id = id.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.schedule.name = name.to_string();
        self
    }

    pub fn with_status(mut self, status: ScheduleStatus) -> Self {
        self.schedule.status = status;
        self
    }

    pub fn with_queue_name(mut self, queue_name: &str) -> Self {
        self.schedule.queue_name = queue_name.to_string();
        self
    }

    pub fn with_task_definition_id(mut self, task_definition_id: &str) -> Self {
        self.schedule.task_definition_id = task_definition_id.to_string();
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.schedule.recurrence_rule.frequency = frequency;
        self
    }

    pub fn with_rule(mut self, rule: RecurrenceRule) -> Self {
        self.schedule.recurrence_rule = rule;
        self
    }

    pub fn with_starts_at(mut self, starts_at: DateTime<Utc>) -> Self {
        self.schedule.recurrence_rule.starts_at = TimeField::At(starts_at);
        self
    }

    pub fn with_next_run_at(mut self, next_run_at: TimeField) -> Self {
        self.schedule.next_run_at = next_run_at;
        self
    }

    pub fn with_max_execution_count(mut self, max_execution_count: i64) -> Self {
        self.schedule.max_execution_count = max_execution_count;
        self
    }

    pub fn with_end_at(mut self, end_at: TimeField) -> Self {
        self.schedule.end_at = end_at;
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.schedule.parameters = parameters;
        self
    }

    pub fn build(self) -> Schedule {
        self.schedule
    }
}

impl Default for ScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
