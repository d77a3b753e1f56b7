use serde::{Deserialize, Serialize};

use crate::validation::ConfigValidator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// pretty 或 json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ConfigValidator for LoggingConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(taskstore_errors::TaskStoreError::config_error(format!(
                "logging.level 无效: {}",
                self.level
            )));
        }
        if self.format != "pretty" && self.format != "json" {
            return Err(taskstore_errors::TaskStoreError::config_error(format!(
                "logging.format 无效: {}",
                self.format
            )));
        }
        Ok(())
    }
}
