use axum::{Router, extract::FromRef, http::HeaderName};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;

// Route groups, one per gate (public, any session, agents, clients).
pub mod routes;
use routes::{agent, authenticated, client, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`. Page routes
/// are listed too: their 200 bodies are the JSON page payloads and their 303s are
/// the redirects the browser follows.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login::login_page, handlers::login::login, handlers::login::logout,
        handlers::login::dashboard, handlers::login::debug_users,
        handlers::agent::agent_dashboard, handlers::agent::client_list,
        handlers::agent::new_client_form, handlers::agent::create_client,
        handlers::agent::edit_client_form, handlers::agent::update_client,
        handlers::agent::delete_client, handlers::agent::view_client,
        handlers::agent::user_list, handlers::agent::new_user_form, handlers::agent::create_user,
        handlers::client::client_dashboard, handlers::client::client_edit_form,
        handlers::client::client_edit,
        handlers::api::get_client, handlers::api::reference_data
    ),
    components(
        schemas(
            models::Role, models::User, models::Identity, models::Agent, models::Client,
            models::ReferenceItem, models::ReferenceData, models::AgentDashboard,
            models::ClientListView, models::ClientFormView, models::UserFormView,
            models::ApiError, session::Flash, session::FlashLevel,
            forms::LoginForm, forms::ClientForm, forms::ClientSelfForm, forms::UserForm,
        )
    ),
    tags(
        (name = "seguros-portal", description = "Seguros Santiago agency portal")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cloneable state handed to every handler and extractor.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: every SQL statement goes through here.
    pub repo: RepositoryState,
    /// Configuration: loaded once at startup, read-only afterwards.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// The session and gate extractors only depend on these two pieces, not on AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route group and the observability layers. Authorization is not a
/// layer here: each protected handler takes a gate extractor (`AuthenticatedUser`,
/// `AgentUser`, `ClientUser`) as its first argument, so an unguarded handler is
/// visible in its own signature.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .nest("/agent", agent::agent_routes())
        .nest("/client", client::client_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for each request, tagged with the `x-request-id` set by the layer above so
/// every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
