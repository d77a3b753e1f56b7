pub mod postgres_schedule_repository;
pub mod postgres_task_definition_repository;
pub mod postgres_task_queue_repository;

pub use postgres_schedule_repository::PostgresScheduleRepository;
pub use postgres_task_definition_repository::PostgresTaskDefinitionRepository;
pub use postgres_task_queue_repository::PostgresTaskQueueRepository;
