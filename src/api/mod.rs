//! API layer
//!
//! HTTP handlers for:
//! - Publications (listing submission)
//! - Admin review API
//! - Metrics (Prometheus)

mod admin;
pub mod metrics;
mod publications;

pub use admin::admin_router;
pub use metrics::{metrics_router, track_metrics};
pub use publications::publications_router;
