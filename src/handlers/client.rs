use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    response::Response,
};

use super::NO_CLIENT_DATA;
use crate::{
    AppState,
    forms::{ClientSelfForm, submitted},
    models::Client,
    session::{ClientUser, GENERIC_FAILURE, Session},
};

/// client_dashboard
///
/// [Client Route] The caller's own client record. A client login without a linked
/// record cannot do anything useful, so the session is closed.
#[utoipa::path(
    get,
    path = "/client/dashboard",
    responses(
        (status = 200, description = "Own client record", body = Client),
        (status = 303, description = "No linked client record")
    )
)]
pub async fn client_dashboard(
    ClientUser(identity): ClientUser,
    State(state): State<AppState>,
    mut session: Session,
) -> Response {
    match state.repo.get_client_by_user(identity.user_id).await {
        Ok(Some(client)) => session.render(client),
        Ok(None) => {
            tracing::warn!(user_id = identity.user_id, "no client linked to user");
            session.sign_out();
            session.error(NO_CLIENT_DATA);
            session.redirect("/login")
        }
        Err(_) => {
            session.sign_out();
            session.error("Error loading your data");
            session.redirect("/login")
        }
    }
}

/// client_edit_form
///
/// [Client Route] Prefill data for the restricted self-service form.
#[utoipa::path(
    get,
    path = "/client/edit",
    responses((status = 200, description = "Own client record", body = Client))
)]
pub async fn client_edit_form(
    ClientUser(identity): ClientUser,
    State(state): State<AppState>,
    mut session: Session,
) -> Response {
    match state.repo.get_client_by_user(identity.user_id).await {
        Ok(Some(client)) => session.render(client),
        Ok(None) => {
            session.error(NO_CLIENT_DATA);
            session.redirect("/client/dashboard")
        }
        Err(_) => {
            session.error(GENERIC_FAILURE);
            session.redirect("/client/dashboard")
        }
    }
}

/// client_edit
///
/// [Client Route] Self-service update of contact and financial fields. Fields outside
/// the permitted six are never read from the form.
#[utoipa::path(
    post,
    path = "/client/edit",
    request_body(content = ClientSelfForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the dashboard on success, back to the form otherwise"))
)]
pub async fn client_edit(
    ClientUser(identity): ClientUser,
    State(state): State<AppState>,
    mut session: Session,
    form: Result<Form<ClientSelfForm>, FormRejection>,
) -> Response {
    let update = match submitted(form).and_then(|form| form.validate()) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(user_id = identity.user_id, error = %e, "self-service update rejected");
            session.error(e.to_string());
            return session.redirect("/client/edit");
        }
    };

    match state.repo.update_own_client(identity.user_id, update).await {
        Ok(Some(client_id)) => {
            tracing::info!(client_id, user_id = identity.user_id, "client updated own record");
            session.success("Information updated successfully");
            session.redirect("/client/dashboard")
        }
        Ok(None) => {
            session.error(NO_CLIENT_DATA);
            session.redirect("/client/dashboard")
        }
        Err(_) => {
            session.error(GENERIC_FAILURE);
            session.redirect("/client/edit")
        }
    }
}
