//! # 处理器注册表
//!
//! 进程内的别名到处理器映射。查找按归一化别名比较（忽略大小写
//! 与 `-`/`_`）；注册时可选择为缺失的别名自动创建任务定义。

use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use taskstore_common::normalize_alias;
use taskstore_domain::{TaskDefinition, TaskDefinitionRepository};
use taskstore_errors::{TaskStoreError, TaskStoreResult};

use crate::handler::TaskHandler;

pub struct TaskHandlerRegistry {
    definition_repository: Arc<dyn TaskDefinitionRepository>,
    handlers: RwLock<Vec<Arc<dyn TaskHandler>>>,
}

impl TaskHandlerRegistry {
    pub fn new(definition_repository: Arc<dyn TaskDefinitionRepository>) -> Self {
        Self {
            definition_repository,
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// 注册处理器
    ///
    /// 别名没有对应的任务定义时：`create_if_missing` 为真则自动
    /// 创建一条 active 定义（首次启动自举），否则注册失败。
    pub async fn register(
        &self,
        handler: Arc<dyn TaskHandler>,
        create_if_missing: bool,
    ) -> TaskStoreResult<()> {
        let alias = handler.alias();
        if alias.trim().is_empty() {
            return Err(TaskStoreError::validation_error("handler alias is empty"));
        }

        let existing = self.definition_repository.find_by_alias(&alias).await?;

        if existing.is_none() {
            if !create_if_missing {
                return Err(TaskStoreError::HandlerTaskMissing);
            }
            let definition =
                TaskDefinition::new(&alias, &handler.title(), &handler.description());
            self.definition_repository.create(&definition).await?;
            info!("已为处理器自动创建任务定义: {alias}");
        }

        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handler);
        debug!("处理器已注册: {alias}");
        Ok(())
    }

    /// 按归一化别名查找处理器
    pub fn find(&self, alias: &str) -> Option<Arc<dyn TaskHandler>> {
        let target = normalize_alias(alias);
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|handler| normalize_alias(&handler.alias()) == target)
            .cloned()
    }

    pub fn list(&self) -> Vec<Arc<dyn TaskHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
