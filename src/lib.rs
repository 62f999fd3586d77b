// Core localization engine
pub mod audience;
pub mod color;
pub mod format;
pub mod language;
pub mod localizer;
pub mod template;

// Delivery
pub mod broadcast;

// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Application layer
pub mod api;
pub mod server;

pub use localizer::{Localizer, LocalizerStats, ReloadError};
