use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use taskstore_common::ENV_PREFIX;

use super::database::DatabaseConfig;
use super::logging::LoggingConfig;
use super::runners::{QueueRunnerConfig, ScheduleRunnerConfig};
use crate::validation::ConfigValidator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    /// 每个条目对应一个独立队列的运行器
    pub queues: Vec<QueueRunnerConfig>,
    pub schedule_runner: ScheduleRunnerConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            queues: vec![QueueRunnerConfig::default()],
            schedule_runner: ScheduleRunnerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置：TOML 文件（可选）+ `TASKSTORE_` 环境变量覆盖
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                anyhow::bail!("配置文件不存在: {path}");
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let loaded: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize::<PartialAppConfig>()
            .context("解析配置失败")?
            .into();

        loaded.validate().map_err(anyhow::Error::new)?;
        Ok(loaded)
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.database.validate()?;
        for queue in &self.queues {
            queue.validate()?;
        }
        self.schedule_runner.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// 反序列化中间层：所有节都可缺省，缺省时落到 Default
#[derive(Debug, Deserialize, Default)]
struct PartialAppConfig {
    database: Option<DatabaseConfig>,
    queues: Option<Vec<QueueRunnerConfig>>,
    schedule_runner: Option<ScheduleRunnerConfig>,
    logging: Option<LoggingConfig>,
}

impl From<PartialAppConfig> for AppConfig {
    fn from(partial: PartialAppConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            database: partial.database.unwrap_or(defaults.database),
            queues: partial.queues.unwrap_or(defaults.queues),
            schedule_runner: partial.schedule_runner.unwrap_or(defaults.schedule_runner),
            logging: partial.logging.unwrap_or(defaults.logging),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queues.len(), 1);
        assert_eq!(config.queues[0].queue_name, "default");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.schedule_runner.tick_seconds, 60);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/nonexistent/taskstore.toml")).is_err());
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "sqlite::memory:"
max_connections = 2
connection_timeout_seconds = 10
automigrate = true

[[queues]]
queue_name = "emails"
tick_seconds = 5
unstuck_minutes = 2
max_concurrency = 3

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.queues.len(), 1);
        assert_eq!(config.queues[0].queue_name, "emails");
        assert_eq!(config.queues[0].max_concurrency, 3);
        assert_eq!(config.logging.level, "debug");
        // 未出现的节回落到默认值
        assert_eq!(config.schedule_runner.tick_seconds, 60);
    }
}
