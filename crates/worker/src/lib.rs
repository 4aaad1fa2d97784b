pub mod handlers;
pub mod service;

pub use handlers::{default_handlers, TaskHandler};
pub use service::{WorkerPool, WorkerPoolBuilder};
