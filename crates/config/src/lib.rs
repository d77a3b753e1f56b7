//! # taskstore-config
//!
//! 应用配置模型：数据库、队列运行器、调度计划运行器与日志。
//! 通过 `config` crate 支持 TOML 文件加载与环境变量覆盖。

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::ConfigValidator;

pub type ConfigResult<T> = taskstore_errors::TaskStoreResult<T>;
