//! # 表结构迁移
//!
//! 三张核心表的建表语句。只使用两个后端都支持的类型与语法，
//! 时间列以定长字符串存储（哨兵值也写入同一列），整型统一 BIGINT
//! 以保证解码宽度一致。

/// 建表与索引语句，按序执行；全部幂等
pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS task_queue (
        id VARCHAR(50) PRIMARY KEY,
        queue_name VARCHAR(100) NOT NULL,
        task_id VARCHAR(50) NOT NULL,
        parameters TEXT NOT NULL,
        status VARCHAR(50) NOT NULL,
        output TEXT NOT NULL,
        details TEXT NOT NULL,
        attempts BIGINT NOT NULL,
        started_at VARCHAR(19) NOT NULL,
        completed_at VARCHAR(19) NOT NULL,
        created_at VARCHAR(19) NOT NULL,
        updated_at VARCHAR(19) NOT NULL,
        soft_deleted_at VARCHAR(19) NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_task_queue_claim
        ON task_queue (status, queue_name, created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS task_definitions (
        id VARCHAR(50) PRIMARY KEY,
        alias VARCHAR(100) NOT NULL UNIQUE,
        title VARCHAR(255) NOT NULL,
        description VARCHAR(255) NOT NULL,
        memo TEXT NOT NULL,
        is_recurring BIGINT NOT NULL,
        recurrence_rule VARCHAR(500) NOT NULL,
        status VARCHAR(50) NOT NULL,
        created_at VARCHAR(19) NOT NULL,
        updated_at VARCHAR(19) NOT NULL,
        soft_deleted_at VARCHAR(19) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schedules (
        id VARCHAR(50) PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        description TEXT NOT NULL,
        status VARCHAR(50) NOT NULL,
        recurrence_rule TEXT NOT NULL,
        queue_name VARCHAR(100) NOT NULL,
        task_definition_id VARCHAR(50) NOT NULL,
        parameters TEXT NOT NULL,
        start_at VARCHAR(19) NOT NULL,
        end_at VARCHAR(19) NOT NULL,
        execution_count BIGINT NOT NULL,
        max_execution_count BIGINT NOT NULL,
        last_run_at VARCHAR(19) NOT NULL,
        next_run_at VARCHAR(19) NOT NULL,
        created_at VARCHAR(19) NOT NULL,
        updated_at VARCHAR(19) NOT NULL,
        soft_deleted_at VARCHAR(19) NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_schedules_due
        ON schedules (status, next_run_at)
    "#,
];
