pub mod dashboard;
pub mod precompute;

pub use dashboard::{DashboardConfig, DashboardService};
pub use precompute::{AnalyticsPrecomputeService, PrecomputeConfig};
