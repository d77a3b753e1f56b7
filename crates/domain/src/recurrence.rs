//! # 重复规则与求值器
//!
//! `RecurrenceRule` 是嵌入调度计划的值对象，`next_run_at` 是纯函数求值器。
//! 求值结果严格大于参考时间，保证同一时钟节拍不会重复触发。

use chrono::{DateTime, Datelike, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use taskstore_errors::{TaskStoreError, TaskStoreResult};

use crate::value_objects::{DayOfWeek, Frequency, MonthOfYear, TimeField};

/// 过滤器步进扫描的上限，超过后视为规则已耗尽
///
/// 无界规则配合无法满足的过滤组合（如 2 月 30 日）会无限步进，
/// 必须有一个硬上限。
pub const MAX_FILTER_SCAN_STEPS: u32 = 100_000;

/// 重复规则
///
/// JSON 形式使用 camelCase 键名与存储层时间字符串：
/// `{"frequency":"daily","startsAt":"2024-01-01 00:00:00",...}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub starts_at: TimeField,
    #[serde(default = "default_ends_at")]
    pub ends_at: TimeField,
    #[serde(default = "default_interval")]
    pub interval: i64,
    #[serde(default)]
    pub days_of_week: Vec<DayOfWeek>,
    #[serde(default)]
    pub days_of_month: Vec<u32>,
    #[serde(default)]
    pub months_of_year: Vec<MonthOfYear>,
}

fn default_interval() -> i64 {
    1
}

fn default_ends_at() -> TimeField {
    TimeField::Indefinite
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self {
            frequency: Frequency::None,
            starts_at: TimeField::Unset,
            ends_at: TimeField::Indefinite,
            interval: 1,
            days_of_week: Vec::new(),
            days_of_month: Vec::new(),
            months_of_year: Vec::new(),
        }
    }
}

impl RecurrenceRule {
    pub fn new() -> Self {
        Self::default()
    }

    fn has_filters(&self) -> bool {
        !self.days_of_week.is_empty()
            || !self.days_of_month.is_empty()
            || !self.months_of_year.is_empty()
    }

    fn matches_filters(&self, candidate: DateTime<Utc>) -> bool {
        if !self.days_of_week.is_empty()
            && !self
                .days_of_week
                .iter()
                .any(|day| day.to_weekday() == candidate.weekday())
        {
            return false;
        }
        if !self.days_of_month.is_empty() && !self.days_of_month.contains(&candidate.day()) {
            return false;
        }
        if !self.months_of_year.is_empty()
            && !self
                .months_of_year
                .iter()
                .any(|month| month.number() == candidate.month())
        {
            return false;
        }
        true
    }
}

/// 求值结果：下一次触发时刻，或者规则已耗尽
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextOccurrence {
    At(DateTime<Utc>),
    Exhausted,
}

impl NextOccurrence {
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::At(value) => Some(*value),
            Self::Exhausted => None,
        }
    }

    /// 转换为调度计划游标字段：耗尽映射为无限期（永不再触发）
    pub fn to_time_field(&self) -> TimeField {
        match self {
            Self::At(value) => TimeField::At(*value),
            Self::Exhausted => TimeField::Indefinite,
        }
    }
}

/// 计算规则相对参考时间的下一次触发时刻
///
/// 规则次序与语义：
/// 1. 参考时间已过结束时间，规则耗尽；
/// 2. 间隔必须为正，否则返回错误；
/// 3. 参考时间早于开始时间，首次触发即开始时间；
/// 4. 频率为 none 时始终返回开始时间（单次触发，由调用方负责退役）；
/// 5. 其余频率从开始时间按 频率×间隔 步进，返回第一个严格大于参考时间、
///    不超出结束时间且满足星期/日/月过滤器的时刻。
pub fn next_run_at(rule: &RecurrenceRule, now: DateTime<Utc>) -> TaskStoreResult<NextOccurrence> {
    let ends_at = match rule.ends_at {
        TimeField::Indefinite => None,
        TimeField::At(value) => Some(value),
        // 未设置的结束时间视为立即过期，与原始行为一致
        TimeField::Unset => Some(DateTime::UNIX_EPOCH),
    };

    if let Some(ends) = ends_at {
        if now > ends {
            return Ok(NextOccurrence::Exhausted);
        }
    }

    if rule.interval <= 0 {
        return Err(TaskStoreError::InvalidRecurrenceRule(
            "interval must be positive".to_string(),
        ));
    }

    let starts_at = rule
        .starts_at
        .as_datetime()
        .unwrap_or(DateTime::UNIX_EPOCH);

    if now < starts_at {
        return Ok(NextOccurrence::At(starts_at));
    }

    match rule.frequency {
        Frequency::None => Ok(NextOccurrence::At(starts_at)),
        Frequency::Secondly => step_fixed(rule, now, starts_at, ends_at, Duration::seconds(1)),
        Frequency::Minutely => step_fixed(rule, now, starts_at, ends_at, Duration::minutes(1)),
        Frequency::Hourly => step_fixed(rule, now, starts_at, ends_at, Duration::hours(1)),
        Frequency::Daily => step_fixed(rule, now, starts_at, ends_at, Duration::days(1)),
        Frequency::Weekly => step_fixed(rule, now, starts_at, ends_at, Duration::weeks(1)),
        Frequency::Monthly => step_calendar(rule, now, starts_at, ends_at, 1),
        Frequency::Yearly => step_calendar(rule, now, starts_at, ends_at, 12),
    }
}

/// 固定宽度频率：先按整倍数跳到第一个严格大于 now 的网格点，再逐步过滤
fn step_fixed(
    rule: &RecurrenceRule,
    now: DateTime<Utc>,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    unit: Duration,
) -> TaskStoreResult<NextOccurrence> {
    let step_seconds = unit.num_seconds() * rule.interval;
    let elapsed = (now - starts_at).num_seconds();
    let k = elapsed.div_euclid(step_seconds) + 1;
    let mut candidate = starts_at + Duration::seconds(k * step_seconds);

    if !rule.has_filters() {
        return Ok(bounded(candidate, ends_at));
    }

    let mut scanned: u32 = 0;
    loop {
        if let Some(ends) = ends_at {
            if candidate > ends {
                return Ok(NextOccurrence::Exhausted);
            }
        }
        if rule.matches_filters(candidate) {
            return Ok(NextOccurrence::At(candidate));
        }
        scanned += 1;
        if scanned >= MAX_FILTER_SCAN_STEPS {
            return Ok(NextOccurrence::Exhausted);
        }
        candidate = candidate + Duration::seconds(step_seconds);
    }
}

/// 月/年频率：按日历月步进，chrono 会把锚点日钳制到目标月的最后一天
fn step_calendar(
    rule: &RecurrenceRule,
    now: DateTime<Utc>,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    months_per_unit: i64,
) -> TaskStoreResult<NextOccurrence> {
    let months_step = rule.interval * months_per_unit;
    let elapsed_months = (now.year() as i64 - starts_at.year() as i64) * 12
        + (now.month() as i64 - starts_at.month() as i64);
    let mut k = (elapsed_months.div_euclid(months_step)).max(0);

    let mut scanned: u32 = 0;
    loop {
        let offset = k * months_step;
        let candidate = match add_months(starts_at, offset) {
            Some(value) => value,
            None => return Ok(NextOccurrence::Exhausted),
        };
        if candidate > now {
            if let Some(ends) = ends_at {
                if candidate > ends {
                    return Ok(NextOccurrence::Exhausted);
                }
            }
            if !rule.has_filters() || rule.matches_filters(candidate) {
                return Ok(NextOccurrence::At(candidate));
            }
        }
        scanned += 1;
        if scanned >= MAX_FILTER_SCAN_STEPS {
            return Ok(NextOccurrence::Exhausted);
        }
        k += 1;
    }
}

fn add_months(anchor: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let months = u32::try_from(months).ok()?;
    anchor.checked_add_months(Months::new(months))
}

fn bounded(candidate: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> NextOccurrence {
    match ends_at {
        Some(ends) if candidate > ends => NextOccurrence::Exhausted,
        _ => NextOccurrence::At(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn minutely_from(starts: DateTime<Utc>) -> RecurrenceRule {
        RecurrenceRule {
            frequency: Frequency::Minutely,
            starts_at: TimeField::At(starts),
            ..RecurrenceRule::default()
        }
    }

    #[test]
    fn test_past_end_date_is_exhausted() {
        let mut rule = minutely_from(at(2024, 1, 1, 0, 0, 0));
        rule.ends_at = TimeField::At(at(2024, 1, 2, 0, 0, 0));

        let result = next_run_at(&rule, at(2024, 1, 3, 0, 0, 0)).unwrap();
        assert_eq!(result, NextOccurrence::Exhausted);
    }

    #[test]
    fn test_non_positive_interval_is_an_error() {
        let mut rule = minutely_from(at(2024, 1, 1, 0, 0, 0));
        rule.interval = 0;

        let err = next_run_at(&rule, at(2024, 1, 1, 0, 30, 0)).unwrap_err();
        assert!(matches!(err, TaskStoreError::InvalidRecurrenceRule(_)));
    }

    #[test]
    fn test_before_start_returns_start() {
        let rule = minutely_from(at(2024, 6, 1, 12, 0, 0));
        let result = next_run_at(&rule, at(2024, 6, 1, 11, 0, 0)).unwrap();
        assert_eq!(result, NextOccurrence::At(at(2024, 6, 1, 12, 0, 0)));
    }

    #[test]
    fn test_frequency_none_returns_start() {
        let rule = RecurrenceRule {
            frequency: Frequency::None,
            starts_at: TimeField::At(at(2024, 6, 1, 12, 0, 0)),
            ..RecurrenceRule::default()
        };
        let result = next_run_at(&rule, at(2024, 6, 2, 0, 0, 0)).unwrap();
        assert_eq!(result, NextOccurrence::At(at(2024, 6, 1, 12, 0, 0)));
    }

    #[test]
    fn test_minutely_steps_from_start() {
        let rule = minutely_from(at(2024, 1, 1, 0, 0, 30));
        let result = next_run_at(&rule, at(2024, 1, 1, 0, 5, 0)).unwrap();
        assert_eq!(result, NextOccurrence::At(at(2024, 1, 1, 0, 5, 30)));
    }

    #[test]
    fn test_result_is_strictly_greater_than_now() {
        // 参考时间正好落在网格点上时，必须返回下一个网格点
        let rule = minutely_from(at(2024, 1, 1, 0, 0, 0));
        let now = at(2024, 1, 1, 0, 10, 0);
        let result = next_run_at(&rule, now).unwrap();
        assert_eq!(result, NextOccurrence::At(at(2024, 1, 1, 0, 11, 0)));
        assert!(result.as_datetime().unwrap() > now);
    }

    #[test]
    fn test_interval_stepping() {
        let mut rule = RecurrenceRule {
            frequency: Frequency::Hourly,
            starts_at: TimeField::At(at(2024, 1, 1, 0, 0, 0)),
            ..RecurrenceRule::default()
        };
        rule.interval = 6;
        let result = next_run_at(&rule, at(2024, 1, 1, 7, 0, 0)).unwrap();
        assert_eq!(result, NextOccurrence::At(at(2024, 1, 1, 12, 0, 0)));
    }

    #[test]
    fn test_day_of_week_filter() {
        // 2024-01-01 是周一；每日规则限定周六，应跳到 2024-01-06
        let rule = RecurrenceRule {
            frequency: Frequency::Daily,
            starts_at: TimeField::At(at(2024, 1, 1, 9, 0, 0)),
            days_of_week: vec![DayOfWeek::Saturday],
            ..RecurrenceRule::default()
        };
        let result = next_run_at(&rule, at(2024, 1, 1, 10, 0, 0)).unwrap();
        assert_eq!(result, NextOccurrence::At(at(2024, 1, 6, 9, 0, 0)));
    }

    #[test]
    fn test_day_of_month_filter() {
        let rule = RecurrenceRule {
            frequency: Frequency::Daily,
            starts_at: TimeField::At(at(2024, 1, 1, 0, 0, 0)),
            days_of_month: vec![15],
            ..RecurrenceRule::default()
        };
        let result = next_run_at(&rule, at(2024, 1, 20, 0, 0, 0)).unwrap();
        assert_eq!(result, NextOccurrence::At(at(2024, 2, 15, 0, 0, 0)));
    }

    #[test]
    fn test_month_of_year_filter() {
        let rule = RecurrenceRule {
            frequency: Frequency::Monthly,
            starts_at: TimeField::At(at(2024, 1, 10, 8, 0, 0)),
            months_of_year: vec![MonthOfYear::June],
            ..RecurrenceRule::default()
        };
        let result = next_run_at(&rule, at(2024, 2, 1, 0, 0, 0)).unwrap();
        assert_eq!(result, NextOccurrence::At(at(2024, 6, 10, 8, 0, 0)));
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        let rule = RecurrenceRule {
            frequency: Frequency::Monthly,
            starts_at: TimeField::At(at(2024, 1, 31, 0, 0, 0)),
            ..RecurrenceRule::default()
        };
        // 2024 年 2 月只有 29 天
        let result = next_run_at(&rule, at(2024, 2, 1, 0, 0, 0)).unwrap();
        assert_eq!(result, NextOccurrence::At(at(2024, 2, 29, 0, 0, 0)));
    }

    #[test]
    fn test_yearly_stepping() {
        let rule = RecurrenceRule {
            frequency: Frequency::Yearly,
            starts_at: TimeField::At(at(2020, 3, 1, 0, 0, 0)),
            ..RecurrenceRule::default()
        };
        let result = next_run_at(&rule, at(2024, 3, 1, 0, 0, 0)).unwrap();
        assert_eq!(result, NextOccurrence::At(at(2025, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn test_filter_never_matching_is_exhausted_within_end_bound() {
        let mut rule = RecurrenceRule {
            frequency: Frequency::Daily,
            starts_at: TimeField::At(at(2024, 1, 1, 0, 0, 0)),
            days_of_month: vec![31],
            ..RecurrenceRule::default()
        };
        // 2 月内没有 31 日
        rule.ends_at = TimeField::At(at(2024, 2, 28, 0, 0, 0));
        let result = next_run_at(&rule, at(2024, 2, 1, 0, 0, 0)).unwrap();
        assert_eq!(result, NextOccurrence::Exhausted);
    }

    #[test]
    fn test_rule_json_round_trip() {
        let rule = RecurrenceRule {
            frequency: Frequency::Weekly,
            starts_at: TimeField::At(at(2024, 1, 1, 6, 0, 0)),
            ends_at: TimeField::Indefinite,
            interval: 2,
            days_of_week: vec![DayOfWeek::Monday, DayOfWeek::Friday],
            days_of_month: vec![],
            months_of_year: vec![MonthOfYear::March],
        };
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"frequency\":\"weekly\""));
        assert!(json.contains("\"startsAt\":\"2024-01-01 06:00:00\""));
        assert!(json.contains("\"daysOfWeek\":[\"monday\",\"friday\"]"));
        assert!(json.contains("\"monthsOfYear\":[\"MARCH\"]"));

        let back: RecurrenceRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_rule_json_defaults() {
        let back: RecurrenceRule = serde_json::from_str("{\"frequency\":\"daily\"}").unwrap();
        assert_eq!(back.interval, 1);
        assert_eq!(back.ends_at, TimeField::Indefinite);
        assert_eq!(back.starts_at, TimeField::Unset);
        assert!(back.days_of_week.is_empty());
    }
}
