//! # 列表查询构建
//!
//! 由查询对象拼出 WHERE 子句与绑定参数。所有绑定值统一为字符串，
//! limit/offset 经过校验后内联。两个后端共用同一套 `$n` 占位符。

use chrono::Utc;

use taskstore_common::{format_datetime, NULL_DATETIME};
use taskstore_domain::{ScheduleQuery, SortOrder, TaskDefinitionQuery, TaskQueueQuery};

pub const TASK_QUEUE_COLUMNS: &str = "id, queue_name, task_id, parameters, status, output, \
     details, attempts, started_at, completed_at, created_at, updated_at, soft_deleted_at";

pub const TASK_DEFINITION_COLUMNS: &str = "id, alias, title, description, memo, is_recurring, \
     recurrence_rule, status, created_at, updated_at, soft_deleted_at";

pub const SCHEDULE_COLUMNS: &str = "id, name, description, status, recurrence_rule, queue_name, \
     task_definition_id, parameters, start_at, end_at, execution_count, max_execution_count, \
     last_run_at, next_run_at, created_at, updated_at, soft_deleted_at";

/// 队列任务列表查询；`count_only` 时只生成 COUNT 头
pub fn build_task_queue_query(query: &TaskQueueQuery, count_only: bool) -> (String, Vec<String>) {
    let head = if count_only {
        "SELECT COUNT(*) AS total FROM task_queue".to_string()
    } else {
        format!("SELECT {TASK_QUEUE_COLUMNS} FROM task_queue")
    };

    let mut sql = format!("{head} WHERE 1 = 1");
    let mut binds: Vec<String> = Vec::new();

    if let Some(id) = &query.id {
        binds.push(id.clone());
        sql.push_str(&format!(" AND id = ${}", binds.len()));
    }
    if let Some(status) = query.status {
        binds.push(status.as_str().to_string());
        sql.push_str(&format!(" AND status = ${}", binds.len()));
    }
    if let Some(statuses) = &query.statuses {
        if !statuses.is_empty() {
            let mut placeholders = Vec::with_capacity(statuses.len());
            for status in statuses {
                binds.push(status.as_str().to_string());
                placeholders.push(format!("${}", binds.len()));
            }
            sql.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));
        }
    }
    if let Some(queue_name) = &query.queue_name {
        binds.push(queue_name.clone());
        sql.push_str(&format!(" AND queue_name = ${}", binds.len()));
    }
    if let Some(task_definition_id) = &query.task_definition_id {
        binds.push(task_definition_id.clone());
        sql.push_str(&format!(" AND task_id = ${}", binds.len()));
    }
    if let Some(gte) = query.created_at_gte {
        binds.push(format_datetime(gte));
        sql.push_str(&format!(" AND created_at >= ${}", binds.len()));
    }
    if let Some(lte) = query.created_at_lte {
        binds.push(format_datetime(lte));
        sql.push_str(&format!(" AND created_at <= ${}", binds.len()));
    }
    if !query.with_soft_deleted {
        binds.push(format_datetime(Utc::now()));
        sql.push_str(&format!(" AND soft_deleted_at > ${}", binds.len()));
    }

    if !count_only {
        match query.sort {
            SortOrder::CreatedAtAsc => sql.push_str(" ORDER BY created_at ASC"),
            SortOrder::CreatedAtDesc => sql.push_str(" ORDER BY created_at DESC"),
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    (sql, binds)
}

/// 任务定义列表查询
pub fn build_task_definition_query(query: &TaskDefinitionQuery) -> (String, Vec<String>) {
    let mut sql = format!("SELECT {TASK_DEFINITION_COLUMNS} FROM task_definitions WHERE 1 = 1");
    let mut binds: Vec<String> = Vec::new();

    if let Some(id) = &query.id {
        binds.push(id.clone());
        sql.push_str(&format!(" AND id = ${}", binds.len()));
    }
    if let Some(alias) = &query.alias {
        binds.push(alias.clone());
        sql.push_str(&format!(" AND alias = ${}", binds.len()));
    }
    if let Some(status) = query.status {
        binds.push(status.as_str().to_string());
        sql.push_str(&format!(" AND status = ${}", binds.len()));
    }
    if !query.with_soft_deleted {
        binds.push(format_datetime(Utc::now()));
        sql.push_str(&format!(" AND soft_deleted_at > ${}", binds.len()));
    }

    sql.push_str(" ORDER BY created_at DESC");
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = query.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    (sql, binds)
}

/// 调度计划列表查询
pub fn build_schedule_query(query: &ScheduleQuery) -> (String, Vec<String>) {
    let mut sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE 1 = 1");
    let mut binds: Vec<String> = Vec::new();

    if let Some(id) = &query.id {
        binds.push(id.clone());
        sql.push_str(&format!(" AND id = ${}", binds.len()));
    }
    if let Some(status) = query.status {
        binds.push(status.as_str().to_string());
        sql.push_str(&format!(" AND status = ${}", binds.len()));
    }
    if let Some(queue_name) = &query.queue_name {
        binds.push(queue_name.clone());
        sql.push_str(&format!(" AND queue_name = ${}", binds.len()));
    }
    if let Some(task_definition_id) = &query.task_definition_id {
        binds.push(task_definition_id.clone());
        sql.push_str(&format!(" AND task_definition_id = ${}", binds.len()));
    }
    if !query.with_soft_deleted {
        binds.push(format_datetime(Utc::now()));
        sql.push_str(&format!(" AND soft_deleted_at > ${}", binds.len()));
    }

    sql.push_str(" ORDER BY created_at DESC");
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = query.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    (sql, binds)
}

/// 到期计划查询：活跃、未软删除、游标已初始化且不晚于参考时间
pub fn build_due_schedules_query(now_text: &str) -> (String, Vec<String>) {
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules \
         WHERE status = $1 AND soft_deleted_at > $2 \
           AND next_run_at > $3 AND next_run_at <= $4 \
         ORDER BY next_run_at ASC"
    );
    let binds = vec![
        "active".to_string(),
        now_text.to_string(),
        NULL_DATETIME.to_string(),
        now_text.to_string(),
    ];
    (sql, binds)
}
