//! # 入队服务
//!
//! 按别名解析任务定义并创建排队任务。保留键 `task_alias` 总是被
//! 覆盖写入参数，消费侧可以据此区分任务来源。

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use taskstore_common::{normalize_queue_name, TASK_ALIAS_PARAMETER};
use taskstore_domain::{QueueItem, TaskDefinitionRepository, TaskQueueRepository};
use taskstore_errors::{TaskStoreError, TaskStoreResult};

pub struct EnqueueService {
    queue_repository: Arc<dyn TaskQueueRepository>,
    definition_repository: Arc<dyn TaskDefinitionRepository>,
}

impl EnqueueService {
    pub fn new(
        queue_repository: Arc<dyn TaskQueueRepository>,
        definition_repository: Arc<dyn TaskDefinitionRepository>,
    ) -> Self {
        Self {
            queue_repository,
            definition_repository,
        }
    }

    /// 创建一条排队任务并返回持久化后的结果
    #[instrument(skip(self, parameters))]
    pub async fn enqueue(
        &self,
        queue_name: &str,
        alias: &str,
        parameters: Map<String, Value>,
    ) -> TaskStoreResult<QueueItem> {
        if alias.trim().is_empty() {
            return Err(TaskStoreError::validation_error("alias is empty"));
        }

        let definition = self
            .definition_repository
            .find_by_alias(alias)
            .await?
            .ok_or_else(|| TaskStoreError::alias_not_found(alias))?;

        let mut parameters = parameters;
        parameters.insert(TASK_ALIAS_PARAMETER.to_string(), Value::from(alias));

        let mut item = QueueItem::new();
        item.queue_name = normalize_queue_name(queue_name);
        item.task_definition_id = definition.id.clone();
        item.attempts = 0;
        item.set_parameters_map(&parameters)?;

        let stored = self.queue_repository.create(&item).await?;
        debug!(
            "任务已入队: {} (alias={}, queue={})",
            stored.id, alias, stored.queue_name
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskstore_domain::{QueueItemStatus, TaskDefinition};
    use taskstore_testing_utils::{MockTaskDefinitionRepository, MockTaskQueueRepository};

    fn service_with_definition(alias: &str) -> (EnqueueService, Arc<MockTaskQueueRepository>) {
        let queue_repo = Arc::new(MockTaskQueueRepository::new());
        let definition_repo = Arc::new(MockTaskDefinitionRepository::new());
        definition_repo.insert(TaskDefinition::new(alias, "Send Email", "sends an email"));
        let service = EnqueueService::new(queue_repo.clone(), definition_repo);
        (service, queue_repo)
    }

    #[tokio::test]
    async fn test_enqueue_creates_queued_item() {
        let (service, queue_repo) = service_with_definition("send-email");

        let mut parameters = Map::new();
        parameters.insert("user_id".to_string(), Value::from(7));

        let item = service
            .enqueue("emails", "send-email", parameters)
            .await
            .unwrap();

        assert_eq!(item.status, QueueItemStatus::Queued);
        assert_eq!(item.queue_name, "emails");
        assert_eq!(item.attempts, 0);
        assert!(!item.task_definition_id.is_empty());
        assert_eq!(queue_repo.count(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_injects_task_alias() {
        let (service, _queue_repo) = service_with_definition("send-email");

        let mut parameters = Map::new();
        parameters.insert("user_id".to_string(), Value::from(7));
        // 尝试伪造保留键，必须被覆盖
        parameters.insert("task_alias".to_string(), Value::from("spoofed"));

        let item = service
            .enqueue("", "send-email", parameters)
            .await
            .unwrap();

        let decoded = item.parameters_map().unwrap();
        assert_eq!(decoded.get("task_alias"), Some(&Value::from("send-email")));
        assert_eq!(decoded.get("user_id"), Some(&Value::from(7)));
        // 空队列名归一化为默认队列
        assert_eq!(item.queue_name, "default");
    }

    #[tokio::test]
    async fn test_enqueue_unknown_alias_fails() {
        let (service, queue_repo) = service_with_definition("send-email");

        let err = service
            .enqueue("default", "no-such-task", Map::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "task with alias 'no-such-task' not found"
        );
        assert_eq!(queue_repo.count(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_empty_alias_is_validation_error() {
        let (service, _) = service_with_definition("send-email");
        let err = service.enqueue("default", " ", Map::new()).await.unwrap_err();
        assert!(err.is_validation());
    }
}
