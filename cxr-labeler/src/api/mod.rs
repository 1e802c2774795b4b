//! HTTP API handlers for cxr-labeler
//!
//! The browser UI is the "file was selected" source and the consumer of the
//! notification stream; everything else is a thin wrapper over `Labeler`.

pub mod actions;
pub mod health;
pub mod image;
pub mod session;
pub mod sse;

pub use actions::action_routes;
pub use health::health_routes;
pub use image::image_routes;
pub use session::session_routes;
pub use sse::event_routes;
