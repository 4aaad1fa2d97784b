pub mod entities;
pub mod messaging;
pub mod repositories;
pub mod services;

pub use analytics_errors::{AnalyticsError, AnalyticsResult};
pub use entities::*;
pub use messaging::*;
pub use repositories::*;
pub use services::*;
