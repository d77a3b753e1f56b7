use serde::{Deserialize, Serialize};

use taskstore_common::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_QUEUE_NAME, DEFAULT_QUEUE_TICK_SECONDS,
    DEFAULT_SCHEDULE_TICK_SECONDS, DEFAULT_UNSTUCK_MINUTES,
};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 单个队列运行器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRunnerConfig {
    pub queue_name: String,
    pub tick_seconds: u64,
    pub unstuck_minutes: i64,
    pub max_concurrency: usize,
}

impl Default for QueueRunnerConfig {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            tick_seconds: DEFAULT_QUEUE_TICK_SECONDS,
            unstuck_minutes: DEFAULT_UNSTUCK_MINUTES,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl ConfigValidator for QueueRunnerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_timeout_seconds(self.tick_seconds, "queue.tick_seconds")?;
        if self.unstuck_minutes <= 0 {
            return Err(taskstore_errors::TaskStoreError::config_error(
                "queue.unstuck_minutes must be positive",
            ));
        }
        ValidationUtils::validate_count(self.max_concurrency, "queue.max_concurrency")?;
        Ok(())
    }
}

/// 调度计划运行器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRunnerConfig {
    pub enabled: bool,
    pub tick_seconds: u64,
}

impl Default for ScheduleRunnerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_seconds: DEFAULT_SCHEDULE_TICK_SECONDS,
        }
    }
}

impl ConfigValidator for ScheduleRunnerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_timeout_seconds(self.tick_seconds, "schedule.tick_seconds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_runner_config_validation() {
        let config = QueueRunnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_seconds, 10);
        assert_eq!(config.unstuck_minutes, 1);
        assert_eq!(config.max_concurrency, 1);

        let mut invalid = config.clone();
        invalid.unstuck_minutes = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.max_concurrency = 0;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_schedule_runner_config_validation() {
        let config = ScheduleRunnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_seconds, 60);

        let mut invalid = config;
        invalid.tick_seconds = 0;
        assert!(invalid.validate().is_err());
    }
}
