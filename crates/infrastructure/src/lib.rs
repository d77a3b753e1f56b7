//! # taskstore-infrastructure
//!
//! 存储网关实现：Postgres 与 SQLite 两套仓储、连接池管理与表结构迁移。
//! 两个后端实现同一组领域仓储 trait，核心代码不感知具体后端。

pub mod database;

pub use database::manager::{DatabaseManager, DatabasePool, DatabaseType};
pub use database::postgres::{
    PostgresScheduleRepository, PostgresTaskDefinitionRepository, PostgresTaskQueueRepository,
};
pub use database::sqlite::{
    SqliteScheduleRepository, SqliteTaskDefinitionRepository, SqliteTaskQueueRepository,
};
