//! HTTP surface of groovio: track queueing, status checks and range-request
//! playback on top of `groovio-core`.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
