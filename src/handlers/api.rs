use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::{CLIENT_NOT_FOUND, load_reference};
use crate::{
    AppState,
    models::{ApiError, Client, ReferenceData},
    session::{AuthenticatedUser, GENERIC_FAILURE},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn api_error(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}

/// get_client
///
/// [Authenticated Route] JSON view of one client.
#[utoipa::path(
    get,
    path = "/api/client/{id}",
    params(("id" = i32, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Found", body = Client),
        (status = 404, description = "Not Found", body = ApiError)
    )
)]
pub async fn get_client(
    _user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Client> {
    match state.repo.get_client(id).await {
        Ok(Some(client)) => Ok(Json(client)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, CLIENT_NOT_FOUND)),
        Err(_) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)),
    }
}

/// reference_data
///
/// [Public Route] The read-only lookup tables (insurance types and classifications).
#[utoipa::path(
    get,
    path = "/api/reference",
    responses((status = 200, description = "Reference tables", body = ReferenceData))
)]
pub async fn reference_data(State(state): State<AppState>) -> ApiResult<ReferenceData> {
    load_reference(state.repo.as_ref())
        .await
        .map(Json)
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE))
}
