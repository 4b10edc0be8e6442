//! HTTP API handlers.

pub mod analysis;
pub mod health;
pub mod recording;
pub mod upload;

pub use analysis::analysis_routes;
pub use health::health_routes;
pub use recording::recording_routes;
pub use upload::upload_routes;
