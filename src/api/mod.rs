pub mod analytics;
pub mod error;
pub mod handlers;
pub mod routes;

pub use error::ErrorResponse;
pub use handlers::{health_check, root, ApiState};
pub use routes::create_api_router;
