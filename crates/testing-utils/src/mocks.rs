//! Mock implementations for the repository traits
//!
//! In-memory implementations used by unit tests that do not need a
//! real database. The queue mock reproduces the claim semantics
//! (oldest queued item per queue, moved to running atomically under
//! the map lock).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use taskstore_common::normalize_queue_name;
use taskstore_domain::{
    QueueItem, QueueItemStatus, Schedule, ScheduleQuery, ScheduleRepository, ScheduleStatus,
    SortOrder, TaskDefinition, TaskDefinitionQuery, TaskDefinitionRepository, TaskQueueQuery,
    TaskQueueRepository, TimeField,
};
use taskstore_errors::{TaskStoreError, TaskStoreResult};

// ============================================================================
// Task queue mock
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MockTaskQueueRepository {
    items: Arc<Mutex<HashMap<String, QueueItem>>>,
    failing_updates: Arc<Mutex<std::collections::HashSet<String>>>,
}

impl MockTaskQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `update` call for the given item id fail, to exercise
    /// store-error paths.
    pub fn fail_updates_for(&self, id: &str) {
        self.failing_updates.lock().unwrap().insert(id.to_string());
    }

    pub fn insert(&self, item: QueueItem) {
        self.items.lock().unwrap().insert(item.id.clone(), item);
    }

    pub fn count(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn get(&self, id: &str) -> Option<QueueItem> {
        self.items.lock().unwrap().get(id).cloned()
    }

    pub fn all(&self) -> Vec<QueueItem> {
        self.items.lock().unwrap().values().cloned().collect()
    }

    fn matches(query: &TaskQueueQuery, item: &QueueItem) -> bool {
        if let Some(id) = &query.id {
            if &item.id != id {
                return false;
            }
        }
        if let Some(status) = query.status {
            if item.status != status {
                return false;
            }
        }
        if let Some(statuses) = &query.statuses {
            if !statuses.contains(&item.status) {
                return false;
            }
        }
        if let Some(queue_name) = &query.queue_name {
            if &item.queue_name != queue_name {
                return false;
            }
        }
        if let Some(task_definition_id) = &query.task_definition_id {
            if &item.task_definition_id != task_definition_id {
                return false;
            }
        }
        if let Some(gte) = query.created_at_gte {
            if item.created_at < gte {
                return false;
            }
        }
        if let Some(lte) = query.created_at_lte {
            if item.created_at > lte {
                return false;
            }
        }
        if !query.with_soft_deleted && item.is_soft_deleted() {
            return false;
        }
        true
    }

    fn apply_order_and_window(query: &TaskQueueQuery, mut items: Vec<QueueItem>) -> Vec<QueueItem> {
        match query.sort {
            SortOrder::CreatedAtAsc => items.sort_by_key(|item| item.created_at),
            SortOrder::CreatedAtDesc => {
                items.sort_by_key(|item| std::cmp::Reverse(item.created_at))
            }
        }
        if let Some(offset) = query.offset {
            items = items.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = query.limit {
            items.truncate(limit as usize);
        }
        items
    }
}

#[async_trait]
impl TaskQueueRepository for MockTaskQueueRepository {
    async fn create(&self, item: &QueueItem) -> TaskStoreResult<QueueItem> {
        let mut stored = item.clone();
        if stored.id.trim().is_empty() {
            stored.id = Uuid::new_v4().to_string();
        }
        stored.queue_name = normalize_queue_name(&stored.queue_name);
        self.items
            .lock()
            .unwrap()
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> TaskStoreResult<Option<QueueItem>> {
        if id.trim().is_empty() {
            return Err(TaskStoreError::validation_error("queue item id is empty"));
        }
        Ok(self.items.lock().unwrap().get(id).cloned())
    }

    async fn list(&self, query: &TaskQueueQuery) -> TaskStoreResult<Vec<QueueItem>> {
        query.validate()?;
        let items = self.items.lock().unwrap();
        let filtered = items
            .values()
            .filter(|item| Self::matches(query, item))
            .cloned()
            .collect();
        Ok(Self::apply_order_and_window(query, filtered))
    }

    async fn count(&self, query: &TaskQueueQuery) -> TaskStoreResult<i64> {
        query.validate()?;
        let items = self.items.lock().unwrap();
        Ok(items
            .values()
            .filter(|item| Self::matches(query, item))
            .count() as i64)
    }

    async fn update(&self, item: &QueueItem) -> TaskStoreResult<()> {
        if self.failing_updates.lock().unwrap().contains(&item.id) {
            return Err(TaskStoreError::database_error("update failure injected"));
        }
        let mut items = self.items.lock().unwrap();
        if !items.contains_key(&item.id) {
            return Err(TaskStoreError::queue_item_not_found(&item.id));
        }
        let mut updated = item.clone();
        updated.updated_at = Utc::now();
        items.insert(item.id.clone(), updated);
        Ok(())
    }

    async fn soft_delete(&self, id: &str) -> TaskStoreResult<()> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(id)
            .ok_or_else(|| TaskStoreError::queue_item_not_found(id))?;
        item.soft_deleted_at = TimeField::now();
        Ok(())
    }

    async fn claim_next(&self, queue_name: &str) -> TaskStoreResult<Option<QueueItem>> {
        let queue_name = normalize_queue_name(queue_name);
        let mut items = self.items.lock().unwrap();

        let next_id = items
            .values()
            .filter(|item| {
                item.status == QueueItemStatus::Queued
                    && item.queue_name == queue_name
                    && !item.is_soft_deleted()
            })
            .min_by_key(|item| (item.created_at, item.id.clone()))
            .map(|item| item.id.clone());

        let Some(id) = next_id else {
            return Ok(None);
        };

        let item = items.get_mut(&id).expect("claimed id must exist");
        item.status = QueueItemStatus::Running;
        item.started_at = TimeField::now();
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn find_running(&self, queue_name: &str, limit: i64) -> TaskStoreResult<Vec<QueueItem>> {
        let query = TaskQueueQuery::new()
            .with_status(QueueItemStatus::Running)
            .with_queue_name(&normalize_queue_name(queue_name))
            .with_sort(SortOrder::CreatedAtAsc)
            .with_limit(limit);
        self.list(&query).await
    }
}

// ============================================================================
// Task definition mock
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MockTaskDefinitionRepository {
    definitions: Arc<Mutex<HashMap<String, TaskDefinition>>>,
}

impl MockTaskDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, definition: TaskDefinition) {
        self.definitions
            .lock()
            .unwrap()
            .insert(definition.id.clone(), definition);
    }

    pub fn count(&self) -> usize {
        self.definitions.lock().unwrap().len()
    }
}

#[async_trait]
impl TaskDefinitionRepository for MockTaskDefinitionRepository {
    async fn create(&self, definition: &TaskDefinition) -> TaskStoreResult<TaskDefinition> {
        if definition.alias.trim().is_empty() {
            return Err(TaskStoreError::validation_error("alias is empty"));
        }
        let mut stored = definition.clone();
        if stored.id.trim().is_empty() {
            stored.id = Uuid::new_v4().to_string();
        }
        self.definitions
            .lock()
            .unwrap()
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> TaskStoreResult<Option<TaskDefinition>> {
        if id.trim().is_empty() {
            return Err(TaskStoreError::validation_error("definition id is empty"));
        }
        Ok(self.definitions.lock().unwrap().get(id).cloned())
    }

    async fn find_by_alias(&self, alias: &str) -> TaskStoreResult<Option<TaskDefinition>> {
        if alias.trim().is_empty() {
            return Err(TaskStoreError::validation_error("alias is empty"));
        }
        Ok(self
            .definitions
            .lock()
            .unwrap()
            .values()
            .find(|definition| definition.alias == alias && !definition.is_soft_deleted())
            .cloned())
    }

    async fn list(&self, query: &TaskDefinitionQuery) -> TaskStoreResult<Vec<TaskDefinition>> {
        query.validate()?;
        let definitions = self.definitions.lock().unwrap();
        let mut result: Vec<TaskDefinition> = definitions
            .values()
            .filter(|definition| {
                if let Some(id) = &query.id {
                    if &definition.id != id {
                        return false;
                    }
                }
                if let Some(alias) = &query.alias {
                    if &definition.alias != alias {
                        return false;
                    }
                }
                if let Some(status) = query.status {
                    if definition.status != status {
                        return false;
                    }
                }
                if !query.with_soft_deleted && definition.is_soft_deleted() {
                    return false;
                }
                true
            })
            .cloned()
            .collect();
        result.sort_by_key(|definition| std::cmp::Reverse(definition.created_at));
        if let Some(limit) = query.limit {
            result.truncate(limit as usize);
        }
        Ok(result)
    }

    async fn update(&self, definition: &TaskDefinition) -> TaskStoreResult<()> {
        let mut definitions = self.definitions.lock().unwrap();
        if !definitions.contains_key(&definition.id) {
            return Err(TaskStoreError::definition_not_found(&definition.id));
        }
        let mut updated = definition.clone();
        updated.updated_at = Utc::now();
        definitions.insert(definition.id.clone(), updated);
        Ok(())
    }

    async fn soft_delete(&self, id: &str) -> TaskStoreResult<()> {
        let mut definitions = self.definitions.lock().unwrap();
        let definition = definitions
            .get_mut(id)
            .ok_or_else(|| TaskStoreError::definition_not_found(id))?;
        definition.soft_deleted_at = TimeField::now();
        Ok(())
    }
}

// ============================================================================
// Schedule mock
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MockScheduleRepository {
    schedules: Arc<Mutex<HashMap<String, Schedule>>>,
}

impl MockScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, schedule: Schedule) {
        self.schedules
            .lock()
            .unwrap()
            .insert(schedule.id.clone(), schedule);
    }

    pub fn get(&self, id: &str) -> Option<Schedule> {
        self.schedules.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl ScheduleRepository for MockScheduleRepository {
    async fn create(&self, schedule: &Schedule) -> TaskStoreResult<Schedule> {
        let mut stored = schedule.clone();
        if stored.id.trim().is_empty() {
            stored.id = Uuid::new_v4().to_string();
        }
        self.schedules
            .lock()
            .unwrap()
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> TaskStoreResult<Option<Schedule>> {
        if id.trim().is_empty() {
            return Err(TaskStoreError::validation_error("schedule id is empty"));
        }
        Ok(self.schedules.lock().unwrap().get(id).cloned())
    }

    async fn list(&self, query: &ScheduleQuery) -> TaskStoreResult<Vec<Schedule>> {
        query.validate()?;
        let schedules = self.schedules.lock().unwrap();
        let mut result: Vec<Schedule> = schedules
            .values()
            .filter(|schedule| {
                if let Some(id) = &query.id {
                    if &schedule.id != id {
                        return false;
                    }
                }
                if let Some(status) = query.status {
                    if schedule.status != status {
                        return false;
                    }
                }
                if let Some(queue_name) = &query.queue_name {
                    if &schedule.queue_name != queue_name {
                        return false;
                    }
                }
                if let Some(task_definition_id) = &query.task_definition_id {
                    if &schedule.task_definition_id != task_definition_id {
                        return false;
                    }
                }
                if !query.with_soft_deleted && schedule.is_soft_deleted() {
                    return false;
                }
                true
            })
            .cloned()
            .collect();
        result.sort_by_key(|schedule| std::cmp::Reverse(schedule.created_at));
        if let Some(limit) = query.limit {
            result.truncate(limit as usize);
        }
        Ok(result)
    }

    async fn update(&self, schedule: &Schedule) -> TaskStoreResult<()> {
        let mut schedules = self.schedules.lock().unwrap();
        if !schedules.contains_key(&schedule.id) {
            return Err(TaskStoreError::schedule_not_found(&schedule.id));
        }
        let mut updated = schedule.clone();
        updated.updated_at = Utc::now();
        schedules.insert(schedule.id.clone(), updated);
        Ok(())
    }

    async fn soft_delete(&self, id: &str) -> TaskStoreResult<()> {
        let mut schedules = self.schedules.lock().unwrap();
        let schedule = schedules
            .get_mut(id)
            .ok_or_else(|| TaskStoreError::schedule_not_found(id))?;
        schedule.soft_deleted_at = TimeField::now();
        Ok(())
    }

    async fn list_due(&self, now: DateTime<Utc>) -> TaskStoreResult<Vec<Schedule>> {
        let schedules = self.schedules.lock().unwrap();
        let mut due: Vec<Schedule> = schedules
            .values()
            .filter(|schedule| {
                schedule.status == ScheduleStatus::Active
                    && !schedule.is_soft_deleted()
                    && schedule.is_due(now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|schedule| schedule.next_run_at.to_storage());
        Ok(due)
    }
}
