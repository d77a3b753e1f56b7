//! # 调度计划运行器
//!
//! 周期扫描活跃计划：到期的计划入队一条任务、推进游标并重算下次
//! 触发时刻；到达结束时间、超出最大执行次数、单次计划已执行或
//! 规则耗尽的计划置为 completed。
//!
//! 求值器返回的时刻严格大于参考时间，且游标在成功入队后立即重算，
//! 因此单次 RunOnce 对每个计划至多产生一条入队。运行器按单实例
//! 设计，多实例并发扫描不在支持范围内。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use taskstore_application::EnqueueService;
use taskstore_common::{Shutdown, DEFAULT_SCHEDULE_TICK_SECONDS};
use taskstore_domain::{
    Schedule, ScheduleQuery, ScheduleRepository, ScheduleStatus, TaskDefinitionRepository,
    TimeField,
};
use taskstore_errors::TaskStoreResult;

#[derive(Debug, Clone)]
pub struct ScheduleRunnerOptions {
    pub tick_interval: Duration,
}

impl Default for ScheduleRunnerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(DEFAULT_SCHEDULE_TICK_SECONDS),
        }
    }
}

pub struct ScheduleRunner {
    schedule_repository: Arc<dyn ScheduleRepository>,
    definition_repository: Arc<dyn TaskDefinitionRepository>,
    enqueue_service: Arc<EnqueueService>,
    options: ScheduleRunnerOptions,
    running: Arc<AtomicBool>,
    stop_signal: Arc<StdMutex<Shutdown>>,
    dispatcher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Clone for ScheduleRunner {
    fn clone(&self) -> Self {
        Self {
            schedule_repository: Arc::clone(&self.schedule_repository),
            definition_repository: Arc::clone(&self.definition_repository),
            enqueue_service: Arc::clone(&self.enqueue_service),
            options: self.options.clone(),
            running: Arc::clone(&self.running),
            stop_signal: Arc::clone(&self.stop_signal),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl ScheduleRunner {
    pub fn new(
        schedule_repository: Arc<dyn ScheduleRepository>,
        definition_repository: Arc<dyn TaskDefinitionRepository>,
        enqueue_service: Arc<EnqueueService>,
        options: ScheduleRunnerOptions,
    ) -> Self {
        let mut options = options;
        if options.tick_interval.is_zero() {
            options.tick_interval = Duration::from_secs(DEFAULT_SCHEDULE_TICK_SECONDS);
        }

        Self {
            schedule_repository,
            definition_repository,
            enqueue_service,
            options,
            running: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(StdMutex::new(Shutdown::new())),
            dispatcher: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 启动扫描循环；重复调用是空操作
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
        let signal = Shutdown::merged(&shutdown, &stop);

        let runner = self.clone();
        let handle = tokio::spawn(async move {
            info!("调度计划运行器启动");

            loop {
                if signal.is_triggered() {
                    break;
                }

                if let Err(err) = runner.run_once().await {
                    error!("调度扫描失败: {err}");
                }

                tokio::select! {
                    _ = sleep(runner.options.tick_interval) => {}
                    _ = signal.cancelled() => break,
                }
            }

            runner.running.store(false, Ordering::SeqCst);
            info!("调度计划运行器已退出");
        });

        *self.dispatcher.lock().await = Some(handle);
    }

    /// 停止扫描循环；重复调用是空操作
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
                error!("调度扫描循环异常退出: {err}");
            }
        }
    }

    /// 启动时一次性初始化：为游标未设置的活跃计划计算下次触发时刻
    pub async fn set_initial_runs(&self) -> TaskStoreResult<()> {
        let schedules = self.list_active().await?;

        for mut schedule in schedules {
            if schedule.next_run_at != TimeField::Unset {
                continue;
            }

            match schedule.next_occurrence(Utc::now()) {
                Ok(next_run_at) => {
                    schedule.next_run_at = next_run_at;
                    if let Err(err) = self.schedule_repository.update(&schedule).await {
                        error!("初始化计划游标失败: {} - {err}", schedule.id);
                    }
                }
                Err(err) => {
                    warn!("计算计划初始触发时刻失败: {} - {err}", schedule.id);
                }
            }
        }

        Ok(())
    }

    /// 扫描一轮：退役已完结的计划、初始化缺失的游标、运行到期计划
    pub async fn run_once(&self) -> TaskStoreResult<()> {
        let now = Utc::now();
        let schedules = self.list_active().await?;

        for mut schedule in schedules {
            if self.should_retire(&schedule, now) {
                schedule.status = ScheduleStatus::Completed;
                if let Err(err) = self.schedule_repository.update(&schedule).await {
                    error!("退役计划失败: {} - {err}", schedule.id);
                }
                continue;
            }

            // 游标缺失的计划本轮只初始化，不运行
            if schedule.next_run_at == TimeField::Unset {
                match schedule.next_occurrence(now) {
                    Ok(next_run_at) => {
                        schedule.next_run_at = next_run_at;
                        if let Err(err) = self.schedule_repository.update(&schedule).await {
                            error!("初始化计划游标失败: {} - {err}", schedule.id);
                        }
                    }
                    Err(err) => {
                        warn!("计算计划触发时刻失败: {} - {err}", schedule.id);
                    }
                }
                continue;
            }

            if !schedule.is_due(now) {
                continue;
            }

            if let Err(err) = self.run_schedule(&mut schedule).await {
                error!("运行计划失败: {} - {err}", schedule.id);
            }
        }

        Ok(())
    }

    async fn list_active(&self) -> TaskStoreResult<Vec<Schedule>> {
        let query = ScheduleQuery::new().with_status(ScheduleStatus::Active);
        self.schedule_repository.list(&query).await
    }

    /// 计划是否应退役：结束时间已过、达到最大执行次数、
    /// 单次计划已执行或规则已耗尽
    fn should_retire(&self, schedule: &Schedule, now: chrono::DateTime<chrono::Utc>) -> bool {
        schedule.has_reached_end_date(now)
            || schedule.has_reached_max_executions()
            || schedule.has_spent_single_run()
            || schedule.is_rule_exhausted()
    }

    /// 运行一个到期计划：入队、推进游标、必要时退役
    async fn run_schedule(&self, schedule: &mut Schedule) -> TaskStoreResult<()> {
        let now = Utc::now();

        // 列表读取与此处之间状态可能已经变化，再核对一次
        if schedule.has_reached_end_date(now) || schedule.has_reached_max_executions() {
            schedule.status = ScheduleStatus::Completed;
            return self.schedule_repository.update(schedule).await;
        }

        if !schedule.is_due(now) {
            return Ok(());
        }

        let definition = self
            .definition_repository
            .find_by_id(&schedule.task_definition_id)
            .await?;

        // 定义缺失时不推进游标，等待运维修复引用
        let Some(definition) = definition else {
            warn!(
                "计划引用的任务定义不存在: schedule={}, definition={}",
                schedule.id, schedule.task_definition_id
            );
            return Ok(());
        };

        self.enqueue_service
            .enqueue(
                &schedule.queue_name,
                &definition.alias,
                schedule.parameters.clone(),
            )
            .await?;

        schedule.update_last_run_at();
        schedule.increment_execution_count();

        // 入队成功后立刻重算游标，保证同一节拍不会再次触发；
        // 求值出错时保留旧游标，留给下一轮重试
        match schedule.next_occurrence(Utc::now()) {
            Ok(next_run_at) => schedule.next_run_at = next_run_at,
            Err(err) => {
                warn!("重算计划触发时刻失败: {} - {err}", schedule.id);
            }
        }

        if schedule.has_reached_end_date(Utc::now()) || schedule.has_reached_max_executions() {
            schedule.status = ScheduleStatus::Completed;
        }

        self.schedule_repository.update(schedule).await?;
        debug!(
            "计划已触发: {} (count={}, next={})",
            schedule.id, schedule.execution_count, schedule.next_run_at
        );
        Ok(())
    }
}
