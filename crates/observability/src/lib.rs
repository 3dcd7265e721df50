//! # pogchat-observability
//!
//! Structured Logging via tracing-subscriber, einmal pro Binary initialisiert.

pub mod logging;

pub use logging::{logging_initialisieren, LogFormat};
