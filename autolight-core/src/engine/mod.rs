//! Orchestration: cadences, configuration and the engine loop.

pub mod config;
pub mod scheduler;
pub mod service;

pub use config::{DEFAULT_MAX_CONSECUTIVE_FAILURES, EngineConfig};
pub use scheduler::{Cadence, SMOOTHING_PERIOD, Scheduler, Ticks};
pub use service::{ColorEngine, EngineStatus};
