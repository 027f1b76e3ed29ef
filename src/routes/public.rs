use crate::{AppState, handlers};
use axum::{
    Router,
    response::Redirect,
    routing::get,
};

/// Public Router Module
///
/// Endpoints reachable without a session: the login gateway and read-only lookups.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // The site root is the login page.
        .route("/", get(|| async { Redirect::to("/login") }))
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET/POST /login
        // Username or email plus password. Success redirects to the role dashboard.
        .route("/login", get(handlers::login::login_page).post(handlers::login::login))
        // GET /logout
        // Clears the session even when none is present.
        .route("/logout", get(handlers::login::logout))
        // GET /api/reference
        // Insurance types and classification tables.
        .route("/api/reference", get(handlers::api::reference_data))
        // GET /debug/users
        // Answers 403 unless built with `debug-endpoints` and running locally.
        .route("/debug/users", get(handlers::login::debug_users))
}
