//! 平台端到端测试：真实 SQLite 存储上的 入队 → 认领 → 执行 → 调度 全链路

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use taskstore::{
    EnqueueService, QueueItemStatus, ScheduleRunner, ScheduleRunnerOptions, ScheduleStatus,
    Shutdown, TaskHandler, TaskHandlerRegistry, TaskInvocation, TaskQueueRunner,
    TaskQueueRunnerOptions, TimeField, Unstucker,
};
use taskstore_domain::{
    Frequency, RecurrenceRule, Schedule, ScheduleRepository, TaskDefinitionRepository,
    TaskQueueQuery, TaskQueueRepository,
};
use taskstore_infrastructure::database::migrations::SCHEMA_STATEMENTS;
use taskstore_infrastructure::{
    SqliteScheduleRepository, SqliteTaskDefinitionRepository, SqliteTaskQueueRepository,
};

struct CountingHandler {
    alias: &'static str,
    invocations: AtomicUsize,
}

#[async_trait]
impl TaskHandler for CountingHandler {
    fn alias(&self) -> String {
        self.alias.to_string()
    }

    fn title(&self) -> String {
        "Counting".to_string()
    }

    async fn handle(&self, task: &mut TaskInvocation<'_>) -> bool {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        task.log("counted one invocation");
        true
    }
}

/// 内存库 + 单连接：sqlite::memory: 的每个连接都是独立数据库
async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool
}

struct Platform {
    queue_repo: Arc<SqliteTaskQueueRepository>,
    definition_repo: Arc<SqliteTaskDefinitionRepository>,
    schedule_repo: Arc<SqliteScheduleRepository>,
    enqueue: Arc<EnqueueService>,
    handler: Arc<CountingHandler>,
    runner: TaskQueueRunner,
}

async fn platform(queue_name: &str, max_concurrency: usize) -> Platform {
    let pool = test_pool().await;
    let queue_repo = Arc::new(SqliteTaskQueueRepository::new(pool.clone()));
    let definition_repo = Arc::new(SqliteTaskDefinitionRepository::new(pool.clone()));
    let schedule_repo = Arc::new(SqliteScheduleRepository::new(pool));

    let registry = Arc::new(TaskHandlerRegistry::new(definition_repo.clone()));
    let handler = Arc::new(CountingHandler {
        alias: "count",
        invocations: AtomicUsize::new(0),
    });
    // 首次启动自举：注册时自动创建任务定义
    registry.register(handler.clone(), true).await.unwrap();

    let enqueue = Arc::new(EnqueueService::new(
        queue_repo.clone(),
        definition_repo.clone(),
    ));

    let runner = TaskQueueRunner::new(
        queue_repo.clone(),
        definition_repo.clone(),
        registry,
        TaskQueueRunnerOptions {
            queue_name: queue_name.to_string(),
            max_concurrency,
            ..TaskQueueRunnerOptions::default()
        },
    );

    Platform {
        queue_repo,
        definition_repo,
        schedule_repo,
        enqueue,
        handler,
        runner,
    }
}

#[tokio::test]
async fn test_enqueue_claim_execute_round_trip() {
    let p = platform("default", 1).await;

    let mut parameters = Map::new();
    parameters.insert("n".to_string(), Value::from(1));
    let item = p.enqueue.enqueue("", "count", parameters).await.unwrap();
    assert_eq!(item.status, QueueItemStatus::Queued);
    assert_eq!(item.queue_name, "default");

    p.runner.run_once(&Shutdown::new()).await.unwrap();

    assert_eq!(p.handler.invocations.load(Ordering::SeqCst), 1);
    let stored = p.queue_repo.find_by_id(&item.id).await.unwrap().unwrap();
    assert_eq!(stored.status, QueueItemStatus::Success);
    assert_eq!(stored.attempts, 1);
    assert!(stored.details.contains("Task started"));
    assert!(stored.details.contains("counted one invocation"));
    assert!(stored.details.contains("Task completed"));
}

#[tokio::test]
async fn test_schedule_materializes_and_worker_executes() {
    let p = platform("default", 1).await;

    let definition = p
        .definition_repo
        .find_by_alias("count")
        .await
        .unwrap()
        .unwrap();

    // 一条到期的 minutely 计划，最多执行一次
    let one_minute_ago = Utc::now() - chrono::Duration::minutes(1);
    let mut schedule = Schedule::new();
    schedule.name = "count-every-minute".to_string();
    schedule.status = ScheduleStatus::Active;
    schedule.task_definition_id = definition.id.clone();
    schedule.recurrence_rule = RecurrenceRule {
        frequency: Frequency::Minutely,
        starts_at: TimeField::At(one_minute_ago),
        ..RecurrenceRule::default()
    };
    schedule.next_run_at = TimeField::At(one_minute_ago);
    schedule.max_execution_count = 1;
    let schedule = p.schedule_repo.create(&schedule).await.unwrap();

    let schedule_runner = ScheduleRunner::new(
        p.schedule_repo.clone(),
        p.definition_repo.clone(),
        p.enqueue.clone(),
        ScheduleRunnerOptions::default(),
    );

    schedule_runner.run_once().await.unwrap();

    // 计划物化出恰好一条任务并退役
    let queued = p
        .queue_repo
        .list(&TaskQueueQuery::new().with_status(QueueItemStatus::Queued))
        .await
        .unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].task_definition_id, definition.id);

    let stored_schedule = p
        .schedule_repo
        .find_by_id(&schedule.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_schedule.execution_count, 1);
    assert!(stored_schedule.last_run_at.is_set());
    assert_eq!(stored_schedule.status, ScheduleStatus::Completed);

    // worker 消费物化出的任务
    p.runner.run_once(&Shutdown::new()).await.unwrap();
    assert_eq!(p.handler.invocations.load(Ordering::SeqCst), 1);

    // 再跑一轮调度：已退役，不再物化
    schedule_runner.run_once().await.unwrap();
    let queued = p
        .queue_repo
        .list(&TaskQueueQuery::new().with_status(QueueItemStatus::Queued))
        .await
        .unwrap();
    assert!(queued.is_empty());
}

#[tokio::test]
async fn test_unstucker_recovers_crashed_item() {
    let p = platform("default", 1).await;

    // 模拟处理器崩溃后的残留：running 且开始于 5 分钟前
    let item = p.enqueue.enqueue("", "count", Map::new()).await.unwrap();
    let mut crashed = p.queue_repo.find_by_id(&item.id).await.unwrap().unwrap();
    crashed.status = QueueItemStatus::Running;
    crashed.started_at = TimeField::At(Utc::now() - chrono::Duration::minutes(5));
    p.queue_repo.update(&crashed).await.unwrap();

    let unstucker = Unstucker::new(p.queue_repo.clone(), 1);
    assert_eq!(unstucker.run("default").await.unwrap(), 1);

    let recovered = p.queue_repo.find_by_id(&item.id).await.unwrap().unwrap();
    assert_eq!(recovered.status, QueueItemStatus::Failed);
    assert!(recovered.completed_at.is_set());
    assert!(recovered
        .details
        .contains("Failed forcefully after 1 minutes timeout"));
}

#[tokio::test]
async fn test_runner_lifecycle_against_real_store() {
    let p = platform("default", 2).await;

    for _ in 0..4 {
        p.enqueue.enqueue("", "count", Map::new()).await.unwrap();
    }

    let shutdown = Shutdown::new();
    p.runner.start(shutdown.clone()).await;
    assert!(p.runner.is_running());

    tokio::time::sleep(Duration::from_millis(300)).await;
    p.runner.stop().await;
    assert!(!p.runner.is_running());

    assert_eq!(p.handler.invocations.load(Ordering::SeqCst), 4);
    let done = p
        .queue_repo
        .list(&TaskQueueQuery::new().with_status(QueueItemStatus::Success))
        .await
        .unwrap();
    assert_eq!(done.len(), 4);
}
