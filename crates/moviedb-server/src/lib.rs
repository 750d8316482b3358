pub mod auth;
pub mod catalog;
pub mod handlers;
pub mod normalize;
pub mod server;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Sealed at startup; read without locking.
    pub catalog: Arc<catalog::SealedFs>,
    pub auth: auth::Authenticator,
    /// Applied to every authorised catalog request before the lookup.
    pub request_delay: Duration,
}

pub use server::{build_router, run, ServerConfig};
