//! # taskstore-dispatcher
//!
//! 调度计划运行器：把到期的计划物化为队列任务。

pub mod schedule_runner;

pub use schedule_runner::{ScheduleRunner, ScheduleRunnerOptions};
