//! # 系统常量定义
//!
//! 任务执行平台的常量：队列默认值、时间哨兵值、各运行器的默认节拍

/// 默认队列名称，空队列名在所有边界统一归一化为该值
pub const DEFAULT_QUEUE_NAME: &str = "default";

/// 存储层日期时间格式（UTC）
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 时间哨兵值：未设置（"从未发生"）
pub const NULL_DATETIME: &str = "0001-01-01 00:00:00";

/// 时间哨兵值：无限期（"永不过期"）
pub const MAX_DATETIME: &str = "9999-12-31 23:59:59";

/// 队列运行器默认轮询间隔（秒）
pub const DEFAULT_QUEUE_TICK_SECONDS: u64 = 10;

/// 卡死任务强制失败阈值（分钟）
pub const DEFAULT_UNSTUCK_MINUTES: i64 = 1;

/// 队列运行器默认并发上限（1 = 串行）
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;

/// 调度计划运行器默认扫描间隔（秒）
pub const DEFAULT_SCHEDULE_TICK_SECONDS: u64 = 60;

/// 卡死扫描单次处理的最大任务数
pub const UNSTUCK_SCAN_LIMIT: i64 = 100;

/// 参数中保留的任务别名键，入队时总是被覆盖写入
pub const TASK_ALIAS_PARAMETER: &str = "task_alias";

/// 默认数据库连接池大小
pub const DEFAULT_DB_POOL_SIZE: u32 = 10;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "TASKSTORE";

