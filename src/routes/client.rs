use crate::{AppState, handlers::client};
use axum::{Router, routing::get};

/// Client Router Module
///
/// Self-service pages nested under `/client`, guarded by `ClientUser`.
pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(client::client_dashboard))
        .route("/edit", get(client::client_edit_form).post(client::client_edit))
}
