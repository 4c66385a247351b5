pub mod error;
pub mod request;
pub mod response;
pub mod routes;

pub use error::ApiError;
pub use routes::{cors_layer, create_router, AppState};
