//! 配置校验工具

use taskstore_errors::{TaskStoreError, TaskStoreResult};

pub trait ConfigValidator {
    fn validate(&self) -> TaskStoreResult<()>;
}

pub struct ValidationUtils;

impl ValidationUtils {
    pub fn validate_not_empty(value: &str, field: &str) -> TaskStoreResult<()> {
        if value.trim().is_empty() {
            return Err(TaskStoreError::config_error(format!("{field} 不能为空")));
        }
        Ok(())
    }

    pub fn validate_count(value: usize, field: &str) -> TaskStoreResult<()> {
        if value == 0 {
            return Err(TaskStoreError::config_error(format!("{field} 必须大于 0")));
        }
        Ok(())
    }

    pub fn validate_timeout_seconds(value: u64, field: &str) -> TaskStoreResult<()> {
        if value == 0 {
            return Err(TaskStoreError::config_error(format!("{field} 必须大于 0")));
        }
        Ok(())
    }
}
