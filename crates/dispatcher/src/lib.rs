pub mod scheduler;

pub use scheduler::{PeriodicScheduler, SchedulerConfig};
