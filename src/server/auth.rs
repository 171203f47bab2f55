//! Account endpoints: signup, login and the current-user lookup.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::extract::{Caller, JsonBody};
use super::{blocking, AppState};
use crate::error::{AppError, AppResult};
use crate::identity::{AuthProvider, LoginRequest, LoginResponse, SignupRequest};

pub async fn signup(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> AppResult<(StatusCode, Json<LoginResponse>)> {
    let auth = state.auth.clone();
    let resp = blocking(move || auth.signup(&req)).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let auth = state.auth.clone();
    Ok(Json(blocking(move || auth.login(&req)).await?))
}

pub async fn me(State(state): State<AppState>, Caller(caller): Caller) -> AppResult<Json<Value>> {
    let user = state
        .users
        .find(caller.user_id)?
        .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;
    Ok(Json(json!({ "user": user.public() })))
}
