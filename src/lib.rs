// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod store;
pub mod telemetry;
pub mod url_guard;

// Staff directory extraction behind the SSRF guard
pub mod due_diligence;

// Config payload + publisher client
pub mod publish;

// Prometheus exporter (binary only; installs a global recorder)
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::context::RequestContext;
pub use crate::error::{ErrorKind, RadarError, RadarResult, UrlRejection};
