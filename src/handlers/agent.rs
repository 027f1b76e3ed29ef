use axum::{
    Form,
    extract::{Path, State, rejection::FormRejection},
    response::Response,
};

use super::{CLIENT_NOT_FOUND, load_reference};
use crate::{
    AppState, auth,
    error::AuthError,
    forms::{ClientForm, UserForm, submitted},
    models::{AgentDashboard, Client, ClientFormView, ClientListView, User, UserFormView},
    session::{AgentUser, GENERIC_FAILURE, Session},
};

/// agent_dashboard
///
/// [Agent Route] The agent's own record plus every client.
#[utoipa::path(
    get,
    path = "/agent/dashboard",
    responses((status = 200, description = "Agent dashboard", body = AgentDashboard))
)]
pub async fn agent_dashboard(
    AgentUser(identity): AgentUser,
    State(state): State<AppState>,
    mut session: Session,
) -> Response {
    let loaded = tokio::try_join!(
        state.repo.get_agent_by_user_id(identity.user_id),
        state.repo.list_clients(),
    );

    match loaded {
        Ok((agent, clients)) => {
            tracing::info!(user_id = identity.user_id, clients = clients.len(), "agent dashboard loaded");
            session.render(AgentDashboard { agent, clients })
        }
        Err(_) => {
            session.sign_out();
            session.error("Error loading the dashboard");
            session.redirect("/login")
        }
    }
}

/// client_list
///
/// [Agent Route] All clients with the reference tables used by the list filters.
#[utoipa::path(
    get,
    path = "/agent/clients",
    responses((status = 200, description = "Client list", body = ClientListView))
)]
pub async fn client_list(
    _agent: AgentUser,
    State(state): State<AppState>,
    mut session: Session,
) -> Response {
    let loaded = tokio::try_join!(state.repo.list_clients(), load_reference(state.repo.as_ref()));

    match loaded {
        Ok((clients, reference)) => session.render(ClientListView { clients, reference }),
        Err(_) => {
            session.error("Error loading the data");
            session.redirect("/agent/dashboard")
        }
    }
}

/// new_client_form
///
/// [Agent Route] Choices for the create form, including the users a client can be linked to.
#[utoipa::path(
    get,
    path = "/agent/client/new",
    responses((status = 200, description = "Create form data", body = ClientFormView))
)]
pub async fn new_client_form(
    _agent: AgentUser,
    State(state): State<AppState>,
    mut session: Session,
) -> Response {
    let loaded = tokio::try_join!(load_reference(state.repo.as_ref()), state.repo.list_users());

    match loaded {
        Ok((reference, users)) => session.render(ClientFormView {
            client: None,
            reference,
            users,
        }),
        Err(_) => {
            session.error("Error loading the form");
            session.redirect("/agent/clients")
        }
    }
}

/// create_client
///
/// [Agent Route] Validates all fifteen fields and inserts the client.
#[utoipa::path(
    post,
    path = "/agent/client/new",
    request_body(content = ClientForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the list on success, back to the form otherwise"))
)]
pub async fn create_client(
    AgentUser(identity): AgentUser,
    State(state): State<AppState>,
    mut session: Session,
    form: Result<Form<ClientForm>, FormRejection>,
) -> Response {
    let input = match submitted(form).and_then(|form| form.validate()) {
        Ok(input) => input,
        Err(e) => {
            session.error(e.to_string());
            return session.redirect("/agent/client/new");
        }
    };

    let code = input.client_code.clone();
    match state.repo.create_client(input).await {
        Ok(id) => {
            tracing::info!(client_id = id, %code, agent = identity.user_id, "client created");
            session.success("Client created successfully");
            session.redirect("/agent/clients")
        }
        Err(_) => {
            session.error(GENERIC_FAILURE);
            session.redirect("/agent/client/new")
        }
    }
}

/// edit_client_form
///
/// [Agent Route] The client being edited plus the form choices.
#[utoipa::path(
    get,
    path = "/agent/client/edit/{id}",
    params(("id" = i32, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Edit form data", body = ClientFormView),
        (status = 303, description = "Client not found")
    )
)]
pub async fn edit_client_form(
    _agent: AgentUser,
    State(state): State<AppState>,
    mut session: Session,
    Path(id): Path<i32>,
) -> Response {
    let loaded = tokio::try_join!(
        state.repo.get_client(id),
        load_reference(state.repo.as_ref()),
        state.repo.list_users(),
    );

    match loaded {
        Ok((Some(client), reference, users)) => session.render(ClientFormView {
            client: Some(client),
            reference,
            users,
        }),
        Ok((None, ..)) => {
            session.error(CLIENT_NOT_FOUND);
            session.redirect("/agent/clients")
        }
        Err(_) => {
            session.error(GENERIC_FAILURE);
            session.redirect("/agent/clients")
        }
    }
}

/// update_client
///
/// [Agent Route] Full update with the same field set and checks as creation. An
/// invalid form leaves the record untouched.
#[utoipa::path(
    post,
    path = "/agent/client/edit/{id}",
    params(("id" = i32, Path, description = "Client ID")),
    request_body(content = ClientForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the list on success, back to the form otherwise"))
)]
pub async fn update_client(
    AgentUser(identity): AgentUser,
    State(state): State<AppState>,
    mut session: Session,
    Path(id): Path<i32>,
    form: Result<Form<ClientForm>, FormRejection>,
) -> Response {
    let form_path = format!("/agent/client/edit/{id}");

    let input = match submitted(form).and_then(|form| form.validate()) {
        Ok(input) => input,
        Err(e) => {
            session.error(e.to_string());
            return session.redirect(&form_path);
        }
    };

    match state.repo.update_client(id, input).await {
        Ok(true) => {
            tracing::info!(client_id = id, agent = identity.user_id, "client updated");
            session.success("Client updated successfully");
            session.redirect("/agent/clients")
        }
        Ok(false) => {
            session.error(CLIENT_NOT_FOUND);
            session.redirect("/agent/clients")
        }
        Err(_) => {
            session.error(GENERIC_FAILURE);
            session.redirect(&form_path)
        }
    }
}

/// delete_client
///
/// [Agent Route] Hard delete. The linked user account is kept.
#[utoipa::path(
    post,
    path = "/agent/client/delete/{id}",
    params(("id" = i32, Path, description = "Client ID")),
    responses((status = 303, description = "Redirect to the client list"))
)]
pub async fn delete_client(
    AgentUser(identity): AgentUser,
    State(state): State<AppState>,
    mut session: Session,
    Path(id): Path<i32>,
) -> Response {
    match state.repo.delete_client(id).await {
        Ok(true) => {
            tracing::info!(client_id = id, agent = identity.user_id, "client deleted");
            session.success("Client deleted successfully");
        }
        Ok(false) => session.error(CLIENT_NOT_FOUND),
        Err(_) => session.error(GENERIC_FAILURE),
    }
    session.redirect("/agent/clients")
}

/// view_client
///
/// [Agent Route] Read-only detail view.
#[utoipa::path(
    get,
    path = "/agent/client/view/{id}",
    params(("id" = i32, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client detail", body = Client),
        (status = 303, description = "Client not found")
    )
)]
pub async fn view_client(
    _agent: AgentUser,
    State(state): State<AppState>,
    mut session: Session,
    Path(id): Path<i32>,
) -> Response {
    match state.repo.get_client(id).await {
        Ok(Some(client)) => session.render(client),
        Ok(None) => {
            session.error(CLIENT_NOT_FOUND);
            session.redirect("/agent/clients")
        }
        Err(_) => {
            session.error(GENERIC_FAILURE);
            session.redirect("/agent/clients")
        }
    }
}

/// user_list
///
/// [Agent Route] All users with their role names.
#[utoipa::path(
    get,
    path = "/agent/users",
    responses((status = 200, description = "User list", body = [User]))
)]
pub async fn user_list(
    _agent: AgentUser,
    State(state): State<AppState>,
    mut session: Session,
) -> Response {
    match state.repo.list_users().await {
        Ok(users) => session.render(users),
        Err(_) => {
            session.error(GENERIC_FAILURE);
            session.redirect("/agent/dashboard")
        }
    }
}

#[utoipa::path(
    get,
    path = "/agent/user/new",
    responses((status = 200, description = "User form data", body = UserFormView))
)]
pub async fn new_user_form(
    _agent: AgentUser,
    State(state): State<AppState>,
    mut session: Session,
) -> Response {
    match state.repo.list_roles().await {
        Ok(roles) => session.render(UserFormView { roles }),
        Err(_) => {
            session.error(GENERIC_FAILURE);
            session.redirect("/agent/users")
        }
    }
}

/// create_user
///
/// [Agent Route] Creates a login. The password must satisfy the policy and is stored
/// only as an Argon2 hash.
#[utoipa::path(
    post,
    path = "/agent/user/new",
    request_body(content = UserForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the user list on success, back to the form otherwise"))
)]
pub async fn create_user(
    AgentUser(identity): AgentUser,
    State(state): State<AppState>,
    mut session: Session,
    form: Result<Form<UserForm>, FormRejection>,
) -> Response {
    let user = match submitted(form).and_then(|form| form.validate()) {
        Ok(user) => user,
        Err(e) => {
            session.error(e.to_string());
            return session.redirect("/agent/user/new");
        }
    };

    let created = auth::register_user(
        state.repo.as_ref(),
        user.code,
        user.username,
        user.email,
        &user.password,
        user.role,
    )
    .await;

    match created {
        Ok(id) => {
            tracing::info!(user_id = id, agent = identity.user_id, "user account created by agent");
            session.success("User created successfully");
            session.redirect("/agent/users")
        }
        Err(AuthError::Policy(violation)) => {
            session.error(violation.to_string());
            session.redirect("/agent/user/new")
        }
        Err(e) => {
            tracing::error!(error = %e, "user creation failed");
            session.error(GENERIC_FAILURE);
            session.redirect("/agent/user/new")
        }
    }
}
