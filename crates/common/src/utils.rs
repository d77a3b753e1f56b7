//! # 通用工具函数
//!
//! 别名与队列名归一化、存储层时间格式化、CLI参数解析

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;

use crate::constants::{DATETIME_FORMAT, DEFAULT_QUEUE_NAME};

/// 归一化任务别名：忽略大小写并去掉 `-` 和 `_`
///
/// 注册与查找两侧必须使用同一归一化结果，别名比较才是一致的。
pub fn normalize_alias(alias: &str) -> String {
    alias
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_lowercase()
}

/// 归一化队列名：空队列名替换为默认队列
pub fn normalize_queue_name(queue_name: &str) -> String {
    if queue_name.trim().is_empty() {
        DEFAULT_QUEUE_NAME.to_string()
    } else {
        queue_name.to_string()
    }
}

/// 按存储层格式（UTC，精确到秒）格式化时间
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// 解析存储层格式的时间字符串
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// 将命令行参数转换为键值映射
///
/// 支持 `--key=value`、`--key value` 与独立的 `--flag` 三种形式。
pub fn args_to_map(args: &[String]) -> HashMap<String, String> {
    let mut kv = HashMap::new();
    let mut i = 0;
    while i < args.len() {
        let current = args[i].trim();
        if let Some(stripped) = current.strip_prefix("--") {
            if let Some((key, value)) = stripped.split_once('=') {
                kv.insert(key.to_string(), value.to_string());
            } else {
                let next = args.get(i + 1).map(|s| s.trim()).unwrap_or("");
                if next.starts_with("--") || next.is_empty() {
                    kv.insert(stripped.to_string(), String::new());
                } else {
                    kv.insert(stripped.to_string(), next.to_string());
                    i += 1;
                }
            }
        }
        i += 1;
    }
    kv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_alias() {
        assert_eq!(normalize_alias("Send-Email"), "sendemail");
        assert_eq!(normalize_alias("send_email"), "sendemail");
        assert_eq!(normalize_alias("SENDEMAIL"), "sendemail");
        assert_eq!(normalize_alias("clean-up_logs"), "cleanuplogs");
    }

    #[test]
    fn test_normalize_queue_name() {
        assert_eq!(normalize_queue_name(""), "default");
        assert_eq!(normalize_queue_name("  "), "default");
        assert_eq!(normalize_queue_name("emails"), "emails");
    }

    #[test]
    fn test_datetime_round_trip() {
        let text = "2024-01-01 00:00:03";
        let parsed = parse_datetime(text).unwrap();
        assert_eq!(format_datetime(parsed), text);
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime("not a datetime").is_none());
        assert!(parse_datetime("").is_none());
    }

    #[test]
    fn test_args_to_map() {
        let args: Vec<String> = vec![
            "--user=12".into(),
            "--force".into(),
            "--name".into(),
            "report".into(),
        ];
        let kv = args_to_map(&args);
        assert_eq!(kv.get("user").map(String::as_str), Some("12"));
        assert_eq!(kv.get("force").map(String::as_str), Some(""));
        assert_eq!(kv.get("name").map(String::as_str), Some("report"));
    }

    #[test]
    fn test_args_to_map_trailing_flag() {
        let args: Vec<String> = vec!["--dry-run".into()];
        let kv = args_to_map(&args);
        assert_eq!(kv.get("dry-run").map(String::as_str), Some(""));
    }
}
