//! The HTTP surface: an on-demand search trigger plus health/metrics
//! endpoints, per SPEC_FULL.md §6. Everything else the teacher's API crate
//! served (movies, queue, quality, streaming, calendar) has no counterpart
//! here.

pub mod error;
pub mod metrics;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use metrics::{DaemonMetrics, MetricsSnapshot};
pub use routes::{build_router, AppState};
