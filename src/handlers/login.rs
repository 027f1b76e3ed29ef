use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    AppState, auth,
    config::Env,
    forms::{LoginForm, submitted},
    models::{ApiError, User},
    session::{AuthenticatedUser, GENERIC_FAILURE, Session},
};

pub const INVALID_CREDENTIALS: &str = "Invalid credentials. Check your username and password.";
pub const MISSING_CREDENTIALS: &str = "Please enter username and password";
pub const INVALID_ROLE: &str = "Invalid user role";

/// login_page
///
/// [Public Route] Renders the login page with any pending flash messages.
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login page"))
)]
pub async fn login_page(session: Session) -> Response {
    session.render(())
}

/// login
///
/// [Public Route] Authenticates by username or email. On success the session cookie
/// is issued and the user is sent to their role's dashboard; every failure re-renders
/// the login page without touching the session.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Authenticated, redirect to the role dashboard"),
        (status = 200, description = "Login page with an error flash")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    // An undecodable body counts as empty credentials.
    let form = submitted(form).unwrap_or_default();
    let Some((identifier, password)) = form.credentials() else {
        session.error(MISSING_CREDENTIALS);
        return session.render(());
    };

    tracing::info!(identifier, "login attempt");

    match auth::login(state.repo.as_ref(), identifier, password).await {
        Ok(Some(identity)) => match identity.role() {
            Some(role) => {
                session.success(format!("Welcome, {}", identity.username));
                session.sign_in(identity);
                session.redirect(role.dashboard_path())
            }
            None => {
                tracing::error!(
                    user_id = identity.user_id,
                    role_id = identity.role_id,
                    "login refused: unknown role"
                );
                session.error(INVALID_ROLE);
                session.render(())
            }
        },
        Ok(None) => {
            session.error(INVALID_CREDENTIALS);
            session.render(())
        }
        Err(e) => {
            tracing::error!(error = %e, "login failed");
            session.error(GENERIC_FAILURE);
            session.render(())
        }
    }
}

/// logout
///
/// [Public Route] Clears the whole session and returns to the login page.
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 303, description = "Session cleared"))
)]
pub async fn logout(mut session: Session) -> Response {
    let username = session
        .identity()
        .map(|identity| identity.username.clone())
        .unwrap_or_else(|| "unknown user".to_string());

    session.sign_out();
    session.success("Session closed successfully");
    tracing::info!(%username, "logout");
    session.redirect("/login")
}

/// dashboard
///
/// [Authenticated Route] Sends the user to the dashboard matching their role.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 303, description = "Redirect to the role dashboard"))
)]
pub async fn dashboard(AuthenticatedUser(identity): AuthenticatedUser, mut session: Session) -> Response {
    match identity.role() {
        Some(role) => session.redirect(role.dashboard_path()),
        None => {
            session.error(INVALID_ROLE);
            session.redirect("/logout")
        }
    }
}

/// debug_users
///
/// [Development Route] Lists users for local troubleshooting. Only compiled in with
/// the `debug-endpoints` feature and only answered when `APP_ENV` is local. The
/// listing never includes password hashes.
#[utoipa::path(
    get,
    path = "/debug/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Disabled", body = ApiError)
    )
)]
pub async fn debug_users(State(state): State<AppState>) -> Response {
    let enabled = cfg!(feature = "debug-endpoints") && state.config.env == Env::Local;
    if !enabled {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiError {
                error: "Access denied".to_string(),
            }),
        )
            .into_response();
    }

    match state.repo.list_users().await {
        Ok(users) => {
            tracing::debug!(count = users.len(), "debug user listing served");
            Json::<Vec<User>>(users).into_response()
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                error: GENERIC_FAILURE.to_string(),
            }),
        )
            .into_response(),
    }
}
