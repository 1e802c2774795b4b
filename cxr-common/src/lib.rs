//! # CXR Common Library
//!
//! Shared code for the chest X-ray labeling service and its tools:
//! - Error type
//! - TOML bootstrap configuration and resolution
//! - Event types (LabelerEvent enum) and the EventBus
//! - SSE streaming helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
