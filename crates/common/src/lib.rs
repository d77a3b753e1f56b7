//! # taskstore-common
//!
//! 任务执行平台的共享常量、工具函数与关闭信号。

pub mod constants;
pub mod shutdown;
pub mod utils;

pub use constants::*;
pub use shutdown::Shutdown;
pub use utils::*;

pub use taskstore_errors::{TaskStoreError, TaskStoreResult};
