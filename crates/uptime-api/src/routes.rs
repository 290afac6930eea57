use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use uptime_types::api::{
    CheckSpec, CheckUpdateRequest, Credentials, ExtendRequest, IdQuery, NewUser, PhoneQuery,
    UserUpdate,
};

use crate::error::ApiError;
use crate::middleware::request_token;
use crate::state::AppState;

/// JSON API over the user, token and check services.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route(
            "/api/users",
            get(get_user).post(create_user).put(update_user).delete(delete_user),
        )
        .route(
            "/api/tokens",
            get(get_token).post(create_token).put(extend_token).delete(delete_token),
        )
        .route(
            "/api/checks",
            get(get_check).post(create_check).put(update_check).delete(delete_check),
        )
        .fallback(not_found)
        .with_state(state)
}

async fn ping() -> impl IntoResponse {
    Json(json!({}))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".into())
}

// ── Users ───────────────────────────────────────────────────────────────

async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.users.create(req).await?))
}

async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PhoneQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(q) = query?;
    let token = request_token(&headers);
    Ok(Json(state.users.get(&q.phone, &token).await?))
}

async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let token = request_token(&headers);
    Ok(Json(state.users.update(req, &token).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PhoneQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(q) = query?;
    let token = request_token(&headers);
    state.users.delete(&q.phone, &token).await?;
    Ok(Json(json!({})))
}

// ── Tokens ──────────────────────────────────────────────────────────────

async fn create_token(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    Ok(Json(state.tokens.issue(&req.phone, &req.password).await?))
}

async fn get_token(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(q) = query?;
    Ok(Json(state.tokens.get(&q.id).await?))
}

async fn extend_token(
    State(state): State<AppState>,
    body: Result<Json<ExtendRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    if !req.extend {
        return Err(ApiError::Validation(
            "Missing required field(s) or field(s) are invalid".into(),
        ));
    }
    Ok(Json(state.tokens.extend(&req.id).await?))
}

async fn delete_token(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(q) = query?;
    state.tokens.revoke(&q.id).await?;
    Ok(Json(json!({})))
}

// ── Checks ──────────────────────────────────────────────────────────────

async fn create_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CheckSpec>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(spec) = body?;
    let token = request_token(&headers);
    let phone = state.tokens.owner(&token).await?;
    Ok(Json(state.checks.create(&phone, spec).await?))
}

async fn get_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(q) = query?;
    let token = request_token(&headers);
    Ok(Json(state.checks.get(&q.id, &token).await?))
}

async fn update_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CheckUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let token = request_token(&headers);
    Ok(Json(state.checks.update(&req.id, &token, req.fields).await?))
}

async fn delete_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(q) = query?;
    let token = request_token(&headers);
    state.checks.delete(&q.id, &token).await?;
    Ok(Json(json!({})))
}
