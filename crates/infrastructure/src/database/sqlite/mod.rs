pub mod sqlite_schedule_repository;
pub mod sqlite_task_definition_repository;
pub mod sqlite_task_queue_repository;

pub use sqlite_schedule_repository::SqliteScheduleRepository;
pub use sqlite_task_definition_repository::SqliteTaskDefinitionRepository;
pub use sqlite_task_queue_repository::SqliteTaskQueueRepository;
