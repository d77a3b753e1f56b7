use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// postgres:// 或 sqlite:// 连接串，按前缀自动选择后端
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
    /// 启动时自动创建缺失的表
    pub automigrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://taskstore.db".to_string(),
            max_connections: taskstore_common::DEFAULT_DB_POOL_SIZE,
            connection_timeout_seconds: 30,
            automigrate: true,
        }
    }
}

impl ConfigValidator for DatabaseConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.url, "database.url")?;

        let supported = self.url.starts_with("postgres://")
            || self.url.starts_with("postgresql://")
            || self.url.starts_with("sqlite:");
        if !supported {
            return Err(taskstore_errors::TaskStoreError::config_error(
                "database.url must start with postgres://, postgresql:// or sqlite:",
            ));
        }

        ValidationUtils::validate_count(self.max_connections as usize, "database.max_connections")?;
        ValidationUtils::validate_timeout_seconds(
            self.connection_timeout_seconds,
            "database.connection_timeout_seconds",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ConfigValidator;

    #[test]
    fn test_database_config_validation() {
        let config = DatabaseConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid = config.clone();
        invalid.url = String::new();
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.url = "mysql://localhost/taskstore".to_string();
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.max_connections = 0;
        assert!(invalid.validate().is_err());

        let mut valid_pg = config.clone();
        valid_pg.url = "postgresql://localhost/taskstore".to_string();
        assert!(valid_pg.validate().is_ok());
    }
}
