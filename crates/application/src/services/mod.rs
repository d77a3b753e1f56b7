pub mod enqueue_service;

pub use enqueue_service::EnqueueService;
