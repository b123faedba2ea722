pub mod handlers;
pub mod middleware;
pub mod play;
pub mod routes;
pub mod tracks;

pub use handlers::ErrorResponse;
pub use routes::create_router;
