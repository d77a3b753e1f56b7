//! # 队列运行器
//!
//! 每个运行器拥有一条调度循环：每个节拍先做卡死恢复，再把队列
//! 认领到空。串行模式逐条处理；并发模式用信号量限制在飞任务数，
//! 并在返回前等待全部已派发任务结束。
//!
//! 状态机：stopped → running → stopping → stopped。`start` 幂等；
//! `stop` 阻塞到调度循环退出且所有处理器调用完成。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tracing::{debug, error, info};

use taskstore_common::{
    normalize_queue_name, Shutdown, DEFAULT_MAX_CONCURRENCY, DEFAULT_QUEUE_TICK_SECONDS,
    DEFAULT_UNSTUCK_MINUTES,
};
use taskstore_domain::{TaskDefinitionRepository, TaskQueueRepository};
use taskstore_errors::{TaskStoreError, TaskStoreResult};

use crate::processor::TaskProcessor;
use crate::registry::TaskHandlerRegistry;
use crate::unstucker::Unstucker;

/// 并发模式下单次派发失败的回调：(队列名, 任务 id, 错误)
pub type DispatchErrorHandler = Arc<dyn Fn(&str, &str, &TaskStoreError) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct TaskQueueRunnerOptions {
    pub queue_name: String,
    pub tick_interval: Duration,
    pub unstuck_minutes: i64,
    /// 1 为串行，大于 1 为并发
    pub max_concurrency: usize,
}

impl Default for TaskQueueRunnerOptions {
    fn default() -> Self {
        Self {
            queue_name: String::new(),
            tick_interval: Duration::from_secs(DEFAULT_QUEUE_TICK_SECONDS),
            unstuck_minutes: DEFAULT_UNSTUCK_MINUTES,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl TaskQueueRunnerOptions {
    fn normalized(mut self) -> Self {
        self.queue_name = normalize_queue_name(&self.queue_name);
        if self.tick_interval.is_zero() {
            self.tick_interval = Duration::from_secs(DEFAULT_QUEUE_TICK_SECONDS);
        }
        if self.unstuck_minutes <= 0 {
            self.unstuck_minutes = DEFAULT_UNSTUCK_MINUTES;
        }
        if self.max_concurrency == 0 {
            self.max_concurrency = DEFAULT_MAX_CONCURRENCY;
        }
        self
    }
}

pub struct TaskQueueRunner {
    queue_repository: Arc<dyn TaskQueueRepository>,
    processor: Arc<TaskProcessor>,
    unstucker: Arc<Unstucker>,
    options: TaskQueueRunnerOptions,
    running: Arc<AtomicBool>,
    stop_signal: Arc<StdMutex<Shutdown>>,
    dispatcher: Arc<Mutex<Option<JoinHandle<()>>>>,
    error_handler: Option<DispatchErrorHandler>,
}

impl Clone for TaskQueueRunner {
    fn clone(&self) -> Self {
        Self {
            queue_repository: Arc::clone(&self.queue_repository),
            processor: Arc::clone(&self.processor),
            unstucker: Arc::clone(&self.unstucker),
            options: self.options.clone(),
            running: Arc::clone(&self.running),
            stop_signal: Arc::clone(&self.stop_signal),
            dispatcher: Arc::clone(&self.dispatcher),
            error_handler: self.error_handler.clone(),
        }
    }
}

impl TaskQueueRunner {
    pub fn new(
        queue_repository: Arc<dyn TaskQueueRepository>,
        definition_repository: Arc<dyn TaskDefinitionRepository>,
        registry: Arc<TaskHandlerRegistry>,
        options: TaskQueueRunnerOptions,
    ) -> Self {
        let options = options.normalized();
        let processor = Arc::new(TaskProcessor::new(
            Arc::clone(&queue_repository),
            definition_repository,
            registry,
        ));
        let unstucker = Arc::new(Unstucker::new(
            Arc::clone(&queue_repository),
            options.unstuck_minutes,
        ));

        Self {
            queue_repository,
            processor,
            unstucker,
            options,
            running: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(StdMutex::new(Shutdown::new())),
            dispatcher: Arc::new(Mutex::new(None)),
            error_handler: None,
        }
    }

    pub fn with_error_handler(mut self, handler: DispatchErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn queue_name(&self) -> &str {
        &self.options.queue_name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 启动调度循环；重复调用是空操作
    pub async fn start(&self, shutdown: Shutdown) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let stop = Shutdown::new();
        {
            let mut guard = self
                .stop_signal
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = stop.clone();
        }
        // 外部关闭与内部 stop 合并成调度循环使用的单一信号
        let signal = Shutdown::merged(&shutdown, &stop);

        let runner = self.clone();
        let handle = tokio::spawn(async move {
            info!(
                "队列运行器启动: queue={}, concurrency={}",
                runner.options.queue_name, runner.options.max_concurrency
            );

            loop {
                if signal.is_triggered() {
                    break;
                }

                if let Err(err) = runner.unstucker.run(&runner.options.queue_name).await {
                    error!(
                        "卡死恢复失败: queue={} - {err}",
                        runner.options.queue_name
                    );
                }

                if let Err(err) = runner.run_once(&signal).await {
                    error!("RunOnce 失败: queue={} - {err}", runner.options.queue_name);
                }

                tokio::select! {
                    _ = sleep(runner.options.tick_interval) => {}
                    _ = signal.cancelled() => break,
                }
            }

            runner.running.store(false, Ordering::SeqCst);
            info!("队列运行器已退出: queue={}", runner.options.queue_name);
        });

        *self.dispatcher.lock().await = Some(handle);
    }

    /// 停止并等待：调度循环退出、所有在飞处理器调用完成后返回。
    /// 重复调用是空操作。
    pub async fn stop(&self) {
        {
            let guard = self
                .stop_signal
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.trigger();
        }

        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!("调度循环异常退出: {err}");
            }
        }
    }

    /// 把队列认领到空（或信号触发）。可独立于调度循环调用。
    pub async fn run_once(&self, signal: &Shutdown) -> TaskStoreResult<()> {
        if self.options.max_concurrency <= 1 {
            self.run_once_serial(signal).await
        } else {
            self.run_once_concurrent(signal).await
        }
    }

    async fn run_once_serial(&self, signal: &Shutdown) -> TaskStoreResult<()> {
        loop {
            if signal.is_triggered() {
                return Ok(());
            }

            let claimed = self
                .queue_repository
                .claim_next(&self.options.queue_name)
                .await?;

            let Some(item) = claimed else {
                return Ok(());
            };

            // 串行模式：处理错误直接作为 RunOnce 的结果返回
            self.processor.process(item, signal).await?;
        }
    }

    async fn run_once_concurrent(&self, signal: &Shutdown) -> TaskStoreResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency));
        let mut workers: JoinSet<()> = JoinSet::new();
        let mut result = Ok(());

        loop {
            if signal.is_triggered() {
                break;
            }

            // 先拿并发额度再认领，认领成功的任务一定能立即开始执行
            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    }
                }
                _ = signal.cancelled() => break,
            };

            match self
                .queue_repository
                .claim_next(&self.options.queue_name)
                .await
            {
                Ok(Some(item)) => {
                    let processor = Arc::clone(&self.processor);
                    let signal = signal.clone();
                    let error_handler = self.error_handler.clone();
                    let queue_name = self.options.queue_name.clone();

                    workers.spawn(async move {
                        let item_id = item.id.clone();
                        if let Err(err) = processor.process(item, &signal).await {
                            match &error_handler {
                                Some(handler) => handler(&queue_name, &item_id, &err),
                                None => {
                                    error!("处理队列任务失败: {item_id} - {err}");
                                }
                            }
                        }
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    break;
                }
                Err(err) => {
                    drop(permit);
                    result = Err(err);
                    break;
                }
            }
        }

        // 等待所有已派发的任务结束后才返回
        while workers.join_next().await.is_some() {}

        debug!("RunOnce 完成: queue={}", self.options.queue_name);
        result
    }
}
