//! # 单条任务执行
//!
//! 对一条已认领的任务完整执行一次：累加尝试次数、解析任务定义、
//! 查找处理器、调用处理器并落盘终态。每一步的审计行都写入任务的
//! details 字段。

use std::sync::Arc;
use tracing::instrument;

use taskstore_common::Shutdown;
use taskstore_domain::{QueueItem, TaskDefinitionRepository, TaskQueueRepository};
use taskstore_errors::TaskStoreResult;

use crate::handler::TaskInvocation;
use crate::registry::TaskHandlerRegistry;

pub struct TaskProcessor {
    queue_repository: Arc<dyn TaskQueueRepository>,
    definition_repository: Arc<dyn TaskDefinitionRepository>,
    registry: Arc<TaskHandlerRegistry>,
}

impl TaskProcessor {
    pub fn new(
        queue_repository: Arc<dyn TaskQueueRepository>,
        definition_repository: Arc<dyn TaskDefinitionRepository>,
        registry: Arc<TaskHandlerRegistry>,
    ) -> Self {
        Self {
            queue_repository,
            definition_repository,
            registry,
        }
    }

    /// 执行一条任务，返回处理器是否成功
    ///
    /// 处理器 panic 或永不返回时任务停留在 running，由卡死恢复
    /// 在后续节拍强制置为 failed。
    #[instrument(skip(self, item, shutdown), fields(item_id = %item.id, queue = %item.queue_name))]
    pub async fn process(&self, mut item: QueueItem, shutdown: &Shutdown) -> TaskStoreResult<bool> {
        item.attempts += 1;
        item.mark_running();
        item.append_details("Task started");
        self.queue_repository.update(&item).await?;

        let definition = self
            .definition_repository
            .find_by_id(&item.task_definition_id)
            .await?;

        let Some(definition) = definition else {
            item.append_details("Task DOES NOT exist");
            item.mark_failed();
            self.queue_repository.update(&item).await?;
            return Ok(false);
        };

        let Some(handler) = self.registry.find(&definition.alias) else {
            item.append_details(&format!("No handler for alias: {}", definition.alias));
            item.mark_failed();
            self.queue_repository.update(&item).await?;
            return Ok(false);
        };

        let success = {
            let mut invocation = TaskInvocation::from_item(&mut item);
            handler
                .handle_with_shutdown(&mut invocation, shutdown)
                .await
        };

        if success {
            item.append_details("Task completed");
            item.mark_success();
        } else {
            item.append_details("Task failed");
            item.mark_failed();
        }
        self.queue_repository.update(&item).await?;

        Ok(success)
    }
}
