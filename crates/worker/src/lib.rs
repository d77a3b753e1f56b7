//! # taskstore-worker
//!
//! 队列消费侧：处理器接口与注册表、单条任务执行、卡死恢复与
//! 队列运行器。

pub mod handler;
pub mod processor;
pub mod registry;
pub mod runner;
pub mod unstucker;

pub use handler::{TaskHandler, TaskInvocation};
pub use processor::TaskProcessor;
pub use registry::TaskHandlerRegistry;
pub use runner::{DispatchErrorHandler, TaskQueueRunner, TaskQueueRunnerOptions};
pub use unstucker::Unstucker;
