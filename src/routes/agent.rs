use crate::{AppState, handlers::agent};
use axum::{
    Router,
    routing::{get, post},
};

/// Agent Router Module
///
/// Client and user management, nested under `/agent`. Every handler takes
/// `AgentUser`: anonymous requests go to `/login`, clients are bounced to
/// `/dashboard` with an "agents only" notice.
pub fn agent_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(agent::agent_dashboard))
        // --- Clients ---
        .route("/clients", get(agent::client_list))
        .route("/client/new", get(agent::new_client_form).post(agent::create_client))
        .route(
            "/client/edit/{id}",
            get(agent::edit_client_form).post(agent::update_client),
        )
        // POST only, so a crawled link cannot delete a record.
        .route("/client/delete/{id}", post(agent::delete_client))
        .route("/client/view/{id}", get(agent::view_client))
        // --- Users ---
        .route("/users", get(agent::user_list))
        .route("/user/new", get(agent::new_user_form).post(agent::create_user))
}
