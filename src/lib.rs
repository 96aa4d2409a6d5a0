// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod acquire;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod prompt;
pub mod providers;
pub mod rate_limit;
pub mod search;
pub mod telemetry;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::error::{ErrorKind, ReportError};
pub use crate::orchestrator::{ReportOrchestrator, ReportOutcome};
pub use crate::types::{AcquiredContent, GenerationRequest, Report, Section, Source};
