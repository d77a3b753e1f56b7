//! # 卡死任务恢复
//!
//! 处理器异常退出或永不返回时任务会停在 running。恢复扫描把
//! 超过阈值的 running 任务强制置为 failed，避免队列被占死。
//! started_at 未设置的任务被跳过：认领事务提交前的短暂窗口内
//! 不能把任务误判为卡死。

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use taskstore_common::{normalize_queue_name, UNSTUCK_SCAN_LIMIT};
use taskstore_domain::TaskQueueRepository;
use taskstore_errors::TaskStoreResult;

pub struct Unstucker {
    queue_repository: Arc<dyn TaskQueueRepository>,
    threshold_minutes: i64,
}

impl Unstucker {
    pub fn new(queue_repository: Arc<dyn TaskQueueRepository>, threshold_minutes: i64) -> Self {
        let threshold_minutes = if threshold_minutes <= 0 {
            taskstore_common::DEFAULT_UNSTUCK_MINUTES
        } else {
            threshold_minutes
        };
        Self {
            queue_repository,
            threshold_minutes,
        }
    }

    /// 扫描指定队列并强制失败超时任务，返回处理的条数
    pub async fn run(&self, queue_name: &str) -> TaskStoreResult<u64> {
        let queue_name = normalize_queue_name(queue_name);
        let running = self
            .queue_repository
            .find_running(&queue_name, UNSTUCK_SCAN_LIMIT)
            .await?;

        if running.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut forced = 0;

        for mut item in running {
            if !item.is_overdue(self.threshold_minutes, now) {
                continue;
            }

            item.append_details(&format!(
                "Failed forcefully after {} minutes timeout",
                self.threshold_minutes
            ));
            item.mark_failed();
            self.queue_repository.update(&item).await?;

            warn!(
                "强制失败卡死任务: {} (queue={}, threshold={}m)",
                item.id, queue_name, self.threshold_minutes
            );
            forced += 1;
        }

        Ok(forced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use taskstore_domain::{QueueItemStatus, TimeField};
    use taskstore_testing_utils::{MockTaskQueueRepository, QueueItemBuilder};

    #[tokio::test]
    async fn test_force_fails_overdue_running_item() {
        let repo = Arc::new(MockTaskQueueRepository::new());
        let item = QueueItemBuilder::new()
            .with_status(QueueItemStatus::Running)
            .with_started_at(TimeField::At(Utc::now() - Duration::minutes(5)))
            .build();
        repo.insert(item.clone());

        let unstucker = Unstucker::new(repo.clone(), 1);
        let forced = unstucker.run("default").await.unwrap();
        assert_eq!(forced, 1);

        let stored = repo.get(&item.id).unwrap();
        assert_eq!(stored.status, QueueItemStatus::Failed);
        assert!(stored.completed_at.is_set());
        assert!(stored
            .details
            .contains("Failed forcefully after 1 minutes timeout"));
    }

    #[tokio::test]
    async fn test_skips_unstarted_running_item() {
        let repo = Arc::new(MockTaskQueueRepository::new());
        // running 但 started_at 未设置：认领提交前的窗口，不能动
        let item = QueueItemBuilder::new()
            .with_status(QueueItemStatus::Running)
            .with_started_at(TimeField::Unset)
            .with_created_at(Utc::now() - Duration::days(2))
            .build();
        repo.insert(item.clone());

        let unstucker = Unstucker::new(repo.clone(), 1);
        assert_eq!(unstucker.run("default").await.unwrap(), 0);
        assert_eq!(repo.get(&item.id).unwrap().status, QueueItemStatus::Running);
    }

    #[tokio::test]
    async fn test_skips_fresh_running_item() {
        let repo = Arc::new(MockTaskQueueRepository::new());
        let item = QueueItemBuilder::new()
            .with_status(QueueItemStatus::Running)
            .with_started_at(TimeField::now())
            .build();
        repo.insert(item.clone());

        let unstucker = Unstucker::new(repo.clone(), 1);
        assert_eq!(unstucker.run("default").await.unwrap(), 0);
        assert_eq!(repo.get(&item.id).unwrap().status, QueueItemStatus::Running);
    }

    #[tokio::test]
    async fn test_only_scans_target_queue() {
        let repo = Arc::new(MockTaskQueueRepository::new());
        let other_queue = QueueItemBuilder::new()
            .with_queue_name("emails")
            .with_status(QueueItemStatus::Running)
            .with_started_at(TimeField::At(Utc::now() - Duration::minutes(30)))
            .build();
        repo.insert(other_queue.clone());

        let unstucker = Unstucker::new(repo.clone(), 1);
        assert_eq!(unstucker.run("default").await.unwrap(), 0);
        assert_eq!(
            repo.get(&other_queue.id).unwrap().status,
            QueueItemStatus::Running
        );
    }

    #[tokio::test]
    async fn test_non_positive_threshold_falls_back_to_default() {
        let repo = Arc::new(MockTaskQueueRepository::new());
        let item = QueueItemBuilder::new()
            .with_status(QueueItemStatus::Running)
            .with_started_at(TimeField::At(Utc::now() - Duration::minutes(5)))
            .build();
        repo.insert(item.clone());

        let unstucker = Unstucker::new(repo.clone(), 0);
        assert_eq!(unstucker.run("default").await.unwrap(), 1);
        let stored = repo.get(&item.id).unwrap();
        assert!(stored
            .details
            .contains("Failed forcefully after 1 minutes timeout"));
    }
}
