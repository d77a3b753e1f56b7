//! # 应用装配
//!
//! 由配置装配出完整的平台实例：连接池、仓储、处理器注册表、
//! 各队列的运行器与调度计划运行器。嵌入方在 `run` 之前注册
//! 自己的处理器。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use taskstore_application::EnqueueService;
use taskstore_common::Shutdown;
use taskstore_config::AppConfig;
use taskstore_dispatcher::{ScheduleRunner, ScheduleRunnerOptions};
use taskstore_errors::TaskStoreResult;
use taskstore_infrastructure::DatabaseManager;
use taskstore_worker::{
    TaskHandler, TaskHandlerRegistry, TaskQueueRunner, TaskQueueRunnerOptions,
};

pub struct Application {
    config: AppConfig,
    registry: Arc<TaskHandlerRegistry>,
    enqueue_service: Arc<EnqueueService>,
    queue_runners: Vec<TaskQueueRunner>,
    schedule_runner: Option<ScheduleRunner>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化 taskstore 应用");

        let manager = DatabaseManager::connect(
            &config.database.url,
            config.database.max_connections,
        )
        .await
        .context("连接数据库失败")?;

        if config.database.automigrate {
            manager.automigrate().await.context("执行表迁移失败")?;
        }

        let queue_repository = manager.task_queue_repository();
        let definition_repository = manager.task_definition_repository();
        let schedule_repository = manager.schedule_repository();

        let registry = Arc::new(TaskHandlerRegistry::new(definition_repository.clone()));
        let enqueue_service = Arc::new(EnqueueService::new(
            queue_repository.clone(),
            definition_repository.clone(),
        ));

        let queue_runners = config
            .queues
            .iter()
            .map(|queue_config| {
                TaskQueueRunner::new(
                    queue_repository.clone(),
                    definition_repository.clone(),
                    registry.clone(),
                    TaskQueueRunnerOptions {
                        queue_name: queue_config.queue_name.clone(),
                        tick_interval: Duration::from_secs(queue_config.tick_seconds),
                        unstuck_minutes: queue_config.unstuck_minutes,
                        max_concurrency: queue_config.max_concurrency,
                    },
                )
            })
            .collect();

        let schedule_runner = if config.schedule_runner.enabled {
            Some(ScheduleRunner::new(
                schedule_repository,
                definition_repository,
                enqueue_service.clone(),
                ScheduleRunnerOptions {
                    tick_interval: Duration::from_secs(config.schedule_runner.tick_seconds),
                },
            ))
        } else {
            None
        };

        Ok(Self {
            config,
            registry,
            enqueue_service,
            queue_runners,
            schedule_runner,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TaskHandlerRegistry> {
        &self.registry
    }

    pub fn enqueue_service(&self) -> &Arc<EnqueueService> {
        &self.enqueue_service
    }

    /// 注册处理器，缺失定义时按需自动创建
    pub async fn register_handler(
        &self,
        handler: Arc<dyn TaskHandler>,
        create_if_missing: bool,
    ) -> TaskStoreResult<()> {
        self.registry.register(handler, create_if_missing).await
    }

    /// 启动全部运行器并阻塞到关闭信号触发，随后优雅停止
    pub async fn run(&self, shutdown: Shutdown) -> Result<()> {
        if let Some(schedule_runner) = &self.schedule_runner {
            schedule_runner
                .set_initial_runs()
                .await
                .context("初始化计划游标失败")?;
        }

        for runner in &self.queue_runners {
            runner.start(shutdown.clone()).await;
            info!("队列运行器已启动: {}", runner.queue_name());
        }
        if let Some(schedule_runner) = &self.schedule_runner {
            schedule_runner.start(shutdown.clone()).await;
        }

        shutdown.cancelled().await;
        info!("收到关闭信号，等待运行器退出");
        self.stop().await;
        Ok(())
    }

    /// 停止全部运行器，阻塞到所有在飞任务完成
    pub async fn stop(&self) {
        for runner in &self.queue_runners {
            runner.stop().await;
        }
        if let Some(schedule_runner) = &self.schedule_runner {
            schedule_runner.stop().await;
        }
        info!("全部运行器已停止");
    }
}
