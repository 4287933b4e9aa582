//! HTTP front end for the messenger.

mod api;
mod error;
mod handlers;
mod router;

pub use api::{ErrorBody, ErrorDetail, HealthResponse};
pub use error::{status_for, ApiError, ServerError};
pub use handlers::{get_health, not_found, post_chat, AppState};
pub use router::{RelayServer, LOCAL_FRONTEND_ORIGINS};
