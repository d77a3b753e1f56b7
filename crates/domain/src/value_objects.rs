//! # 领域值对象
//!
//! 三值时间戳 `TimeField`、各实体的状态枚举，以及重复规则使用的
//! 频率、星期、月份枚举。状态以字符串形式持久化，编码与解码集中在
//! 这里，存储层不再各自维护映射。

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use taskstore_common::{format_datetime, parse_datetime, MAX_DATETIME, NULL_DATETIME};
use taskstore_errors::TaskStoreError;

// ============================================================================
// 时间字段
// ============================================================================

/// 三值时间戳：未设置 / 具体时刻 / 无限期
///
/// 存储层以哨兵字符串表达前后两种状态（NULL_DATETIME 与 MAX_DATETIME），
/// 领域层只在编解码时接触这些字符串。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeField {
    #[default]
    Unset,
    At(DateTime<Utc>),
    Indefinite,
}

impl TimeField {
    /// 当前时刻
    pub fn now() -> Self {
        // 截断到秒，与存储格式的精度保持一致
        let now = Utc::now();
        match parse_datetime(&format_datetime(now)) {
            Some(truncated) => Self::At(truncated),
            None => Self::At(now),
        }
    }

    pub fn at(value: DateTime<Utc>) -> Self {
        Self::At(value)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::At(_))
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::At(value) => Some(*value),
            _ => None,
        }
    }

    /// 编码为存储层字符串
    pub fn to_storage(&self) -> String {
        match self {
            Self::Unset => NULL_DATETIME.to_string(),
            Self::At(value) => format_datetime(*value),
            Self::Indefinite => MAX_DATETIME.to_string(),
        }
    }

    /// 从存储层字符串解码，无法解析的输入一律视为未设置
    pub fn from_storage(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == NULL_DATETIME {
            return Self::Unset;
        }
        if trimmed == MAX_DATETIME {
            return Self::Indefinite;
        }
        match parse_datetime(trimmed) {
            Some(parsed) => Self::At(parsed),
            None => Self::Unset,
        }
    }
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage())
    }
}

impl Serialize for TimeField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_storage())
    }
}

impl<'de> Deserialize<'de> for TimeField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(TimeField::from_storage(&text))
    }
}

// ============================================================================
// 队列任务状态
// ============================================================================

/// 队列任务状态
///
/// 合法迁移：queued→running（仅经由原子认领）、running→success/failed、
/// 任意状态→deleted（软删除）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    Queued,
    Running,
    Success,
    Failed,
    Paused,
    Canceled,
    Deleted,
}

impl QueueItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Paused => "paused",
            Self::Canceled => "canceled",
            Self::Deleted => "deleted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl FromStr for QueueItemStatus {
    type Err = TaskStoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "paused" => Ok(Self::Paused),
            "canceled" => Ok(Self::Canceled),
            "deleted" => Ok(Self::Deleted),
            other => Err(TaskStoreError::Validation(format!(
                "无效的队列任务状态: {other}"
            ))),
        }
    }
}

impl fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// 任务定义状态
// ============================================================================

/// 任务定义状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskDefinitionStatus {
    Active,
    Canceled,
}

impl TaskDefinitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
        }
    }
}

impl FromStr for TaskDefinitionStatus {
    type Err = TaskStoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            other => Err(TaskStoreError::Validation(format!(
                "无效的任务定义状态: {other}"
            ))),
        }
    }
}

impl fmt::Display for TaskDefinitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// 调度计划状态
// ============================================================================

/// 调度计划状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Draft,
    Active,
    Completed,
    Inactive,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = TaskStoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "inactive" => Ok(Self::Inactive),
            other => Err(TaskStoreError::Validation(format!(
                "无效的调度计划状态: {other}"
            ))),
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// 重复规则枚举
// ============================================================================

/// 重复频率
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// 单次触发，仅在 starts_at 执行一次
    #[default]
    None,
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Secondly => "secondly",
            Self::Minutely => "minutely",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// 重复规则中的星期过滤项
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn to_weekday(&self) -> Weekday {
        match self {
            Self::Monday => Weekday::Mon,
            Self::Tuesday => Weekday::Tue,
            Self::Wednesday => Weekday::Wed,
            Self::Thursday => Weekday::Thu,
            Self::Friday => Weekday::Fri,
            Self::Saturday => Weekday::Sat,
            Self::Sunday => Weekday::Sun,
        }
    }
}

/// 重复规则中的月份过滤项，序列化形式沿用大写月份名
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonthOfYear {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl MonthOfYear {
    /// 月份序号，1 到 12
    pub fn number(&self) -> u32 {
        match self {
            Self::January => 1,
            Self::February => 2,
            Self::March => 3,
            Self::April => 4,
            Self::May => 5,
            Self::June => 6,
            Self::July => 7,
            Self::August => 8,
            Self::September => 9,
            Self::October => 10,
            Self::November => 11,
            Self::December => 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_field_storage_round_trip() {
        assert_eq!(TimeField::Unset.to_storage(), NULL_DATETIME);
        assert_eq!(TimeField::Indefinite.to_storage(), MAX_DATETIME);

        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 3).unwrap();
        let field = TimeField::At(instant);
        assert_eq!(field.to_storage(), "2024-01-01 00:00:03");
        assert_eq!(TimeField::from_storage(&field.to_storage()), field);

        assert_eq!(TimeField::from_storage(NULL_DATETIME), TimeField::Unset);
        assert_eq!(TimeField::from_storage(MAX_DATETIME), TimeField::Indefinite);
        assert_eq!(TimeField::from_storage(""), TimeField::Unset);
        assert_eq!(TimeField::from_storage("garbage"), TimeField::Unset);
    }

    #[test]
    fn test_time_field_json() {
        let instant = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap();
        let json = serde_json::to_string(&TimeField::At(instant)).unwrap();
        assert_eq!(json, "\"2024-06-15 12:30:00\"");

        let back: TimeField = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TimeField::At(instant));

        let indefinite: TimeField =
            serde_json::from_str(&format!("\"{MAX_DATETIME}\"")).unwrap();
        assert_eq!(indefinite, TimeField::Indefinite);
    }

    #[test]
    fn test_queue_item_status_codec() {
        for status in [
            QueueItemStatus::Queued,
            QueueItemStatus::Running,
            QueueItemStatus::Success,
            QueueItemStatus::Failed,
            QueueItemStatus::Paused,
            QueueItemStatus::Canceled,
            QueueItemStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<QueueItemStatus>().unwrap(), status);
        }
        assert!("unknown".parse::<QueueItemStatus>().is_err());
        assert!(QueueItemStatus::Success.is_terminal());
        assert!(!QueueItemStatus::Running.is_terminal());
    }

    #[test]
    fn test_schedule_status_codec() {
        assert_eq!("active".parse::<ScheduleStatus>().unwrap(), ScheduleStatus::Active);
        assert_eq!(ScheduleStatus::Completed.as_str(), "completed");
        assert!("done".parse::<ScheduleStatus>().is_err());
    }

    #[test]
    fn test_month_of_year_serde_uses_uppercase_names() {
        let json = serde_json::to_string(&MonthOfYear::January).unwrap();
        assert_eq!(json, "\"JANUARY\"");
        let back: MonthOfYear = serde_json::from_str("\"DECEMBER\"").unwrap();
        assert_eq!(back, MonthOfYear::December);
        assert_eq!(back.number(), 12);
    }
}
