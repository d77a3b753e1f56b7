//! # taskstore-application
//!
//! 面向生产者的应用服务层，目前只有入队服务。

pub mod services;

pub use services::EnqueueService;
