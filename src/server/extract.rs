//! Request extractors that reject with `AppError` instead of axum's plain-text
//! rejections, so every failure leaves the server in the same JSON shape.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::AppState;
use crate::error::AppError;
use crate::identity::{bearer_token, Principal};
use crate::model::ItemId;

fn authorization(parts: &Parts) -> Option<&str> {
    parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

/// An authenticated caller. Missing or invalid tokens reject with 401.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Principal);

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = authorization(parts).and_then(bearer_token);
        state.signer.authenticate(token).map(Caller)
    }
}

/// A caller that may be anonymous. A header that is present but carries a bad
/// token still rejects.
#[derive(Debug, Clone, Copy)]
pub struct MaybeCaller(pub Option<Principal>);

impl FromRequestParts<AppState> for MaybeCaller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match authorization(parts) {
            None => Ok(MaybeCaller(None)),
            Some(value) => state.signer.authenticate(bearer_token(value)).map(|p| MaybeCaller(Some(p))),
        }
    }
}

/// `{id}` path segment parsed as an item id.
#[derive(Debug, Clone, Copy)]
pub struct ItemPath(pub ItemId);

impl<S: Send + Sync> FromRequestParts<S> for ItemPath {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|r| AppError::validation("invalid_path".to_string(), r.body_text()))?;
        Uuid::parse_str(raw.trim())
            .map(ItemPath)
            .map_err(|_| AppError::validation("invalid_id".to_string(), format!("'{raw}' is not a valid item id")))
    }
}

/// JSON body; malformed or unknown fields are a validation error.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(AppError::validation("invalid_body".to_string(), rejection.body_text())),
        }
    }
}

/// Query string with the same rejection mapping as `JsonBody`.
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => Err(AppError::validation("invalid_query".to_string(), rejection.body_text())),
        }
    }
}
