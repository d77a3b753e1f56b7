//! # 任务处理器接口
//!
//! 处理器是进程内代码，按别名注册，分发时被调用。`TaskInvocation`
//! 抽掉两种调用来源的差异：队列任务携带参数 JSON，CLI 调用携带
//! 命令行选项，处理器两种场景下使用同一套取参与日志接口。

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

use taskstore_common::Shutdown;
use taskstore_domain::QueueItem;

/// 一次处理器调用的上下文
pub struct TaskInvocation<'a> {
    item: Option<&'a mut QueueItem>,
    options: HashMap<String, String>,
}

impl<'a> TaskInvocation<'a> {
    /// 队列分发：绑定被认领的任务
    pub fn from_item(item: &'a mut QueueItem) -> Self {
        Self {
            item: Some(item),
            options: HashMap::new(),
        }
    }

    /// CLI 直接调用：只有选项映射
    pub fn from_options(options: HashMap<String, String>) -> Self {
        Self {
            item: None,
            options,
        }
    }

    pub fn has_queue_item(&self) -> bool {
        self.item.is_some()
    }

    pub fn queue_item(&self) -> Option<&QueueItem> {
        self.item.as_deref()
    }

    /// 读取参数：优先队列任务的参数 JSON，其次 CLI 选项
    pub fn param(&self, name: &str) -> Option<String> {
        if let Some(item) = &self.item {
            let parameters = item.parameters_map().ok()?;
            return parameters.get(name).map(value_to_string);
        }
        self.options.get(name).cloned()
    }

    /// 读取以 `;` 分隔的列表参数
    pub fn param_list(&self, name: &str) -> Vec<String> {
        match self.param(name) {
            Some(value) if !value.is_empty() => {
                value.split(';').map(|part| part.to_string()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// 记录一行处理日志：写入任务审计日志，脱离队列时走 tracing
    pub fn log(&mut self, message: &str) {
        match self.item.as_deref_mut() {
            Some(item) => item.append_details(message),
            None => info!("{message}"),
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// 任务处理器
///
/// 实现方至少提供 `alias` 与 `handle`。需要感知关闭信号的处理器
/// 覆写 `handle_with_shutdown`；分发侧总是调用后者，默认实现退回
/// 普通的 `handle`。
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn alias(&self) -> String;

    fn title(&self) -> String {
        String::new()
    }

    fn description(&self) -> String {
        String::new()
    }

    /// 执行任务，返回是否成功
    async fn handle(&self, task: &mut TaskInvocation<'_>) -> bool;

    /// 可感知关闭信号的执行入口
    async fn handle_with_shutdown(
        &self,
        task: &mut TaskInvocation<'_>,
        _shutdown: &Shutdown,
    ) -> bool {
        self.handle(task).await
    }
}
