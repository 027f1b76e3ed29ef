use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes open to any signed-in user. Handlers take `AuthenticatedUser`, which
/// redirects anonymous requests to `/login`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /dashboard
        // Dispatches to /agent/dashboard or /client/dashboard by role.
        .route("/dashboard", get(handlers::login::dashboard))
        // GET /api/client/{id}
        // JSON view of any client. Not restricted by role.
        .route("/api/client/{id}", get(handlers::api::get_client))
}
