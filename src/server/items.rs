//! Item endpoints. Every state change goes through `ItemWorkflow`; this module
//! only turns requests into workflow calls and results into JSON.

use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::extract::{Caller, ItemPath, MaybeCaller, QueryParams};
use super::{blocking, AppState};
use crate::error::{AppError, AppResult};
use crate::media::Upload;
use crate::model::{ContactDetails, Item, ItemKind, ItemStatus};
use crate::storage::ItemFilter;
use crate::workflow::Submission;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublicQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub q: Option<String>,
    pub claimed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminQuery {
    /// One status or a comma-separated list.
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

fn parse_kind(raw: Option<&str>) -> AppResult<Option<ItemKind>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Ok(Some(s.parse()?)),
        None => Ok(None),
    }
}

fn parse_flag(raw: Option<&str>) -> AppResult<bool> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(AppError::validation("invalid_query".to_string(), format!("expected true or false, got '{other}'"))),
    }
}

fn parse_statuses(raw: Option<&str>) -> AppResult<Option<Vec<ItemStatus>>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else { return Ok(None) };
    let statuses = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<ItemStatus>)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Some(statuses))
}

fn outcome(message: &str, item: Item) -> Json<Value> {
    Json(json!({ "message": message, "item": item }))
}

pub async fn list_public(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PublicQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let kind = parse_kind(query.kind.as_deref())?;
    let claimed_view = parse_flag(query.claimed.as_deref())?;
    let workflow = state.workflow.clone();
    Ok(Json(blocking(move || workflow.list_public(kind, query.q, claimed_view)).await?))
}

pub async fn list_all(
    State(state): State<AppState>,
    Caller(caller): Caller,
    QueryParams(query): QueryParams<AdminQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let filter = ItemFilter {
        statuses: parse_statuses(query.status.as_deref())?,
        ..Default::default()
    }
    .with_kind(parse_kind(query.kind.as_deref())?)
    .with_text(query.q);
    let workflow = state.workflow.clone();
    Ok(Json(blocking(move || workflow.list_all(&caller, &filter)).await?))
}

pub async fn list_pending(State(state): State<AppState>, Caller(caller): Caller) -> AppResult<Json<Vec<Item>>> {
    let workflow = state.workflow.clone();
    Ok(Json(blocking(move || workflow.list_pending(&caller)).await?))
}

pub async fn list_mine(State(state): State<AppState>, Caller(caller): Caller) -> AppResult<Json<Vec<Item>>> {
    let workflow = state.workflow.clone();
    Ok(Json(blocking(move || workflow.list_mine(&caller)).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    ItemPath(id): ItemPath,
) -> AppResult<Json<Item>> {
    let workflow = state.workflow.clone();
    Ok(Json(blocking(move || workflow.get(caller.as_ref(), id)).await?))
}

pub async fn add(
    State(state): State<AppState>,
    Caller(caller): Caller,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let multipart = multipart.map_err(|r| AppError::validation("invalid_form".to_string(), r.body_text()))?;
    let (submission, upload) = read_submission(multipart, state.max_upload_bytes).await?;
    let workflow = state.workflow.clone();
    let item = blocking(move || workflow.submit_upload(&caller, submission, upload)).await?;
    Ok((StatusCode::CREATED, outcome("Item submitted for approval", item)))
}

pub async fn approve(State(state): State<AppState>, Caller(caller): Caller, ItemPath(id): ItemPath) -> AppResult<Json<Value>> {
    let workflow = state.workflow.clone();
    let item = blocking(move || workflow.approve(&caller, id)).await?;
    Ok(outcome("Item approved", item))
}

pub async fn reject(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ItemPath(id): ItemPath,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let req: RejectRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RejectRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::validation("invalid_body".to_string(), e.to_string()))?
    };
    let workflow = state.workflow.clone();
    let item = blocking(move || workflow.reject(&caller, id, req.reason.as_deref())).await?;
    Ok(outcome("Item rejected", item))
}

pub async fn claim(State(state): State<AppState>, Caller(caller): Caller, ItemPath(id): ItemPath) -> AppResult<Json<Value>> {
    let workflow = state.workflow.clone();
    let item = blocking(move || workflow.claim(&caller, id)).await?;
    Ok(outcome("Item marked as claimed successfully", item))
}

pub async fn remove(State(state): State<AppState>, Caller(caller): Caller, ItemPath(id): ItemPath) -> AppResult<Json<Value>> {
    let workflow = state.workflow.clone();
    blocking(move || workflow.remove(&caller, id)).await?;
    Ok(Json(json!({ "message": "Item deleted successfully" })))
}

fn form_error(err: MultipartError, max_upload_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::validation("image_too_large".to_string(), format!("Image exceeds the {max_upload_bytes} byte limit"));
    }
    AppError::validation("invalid_form".to_string(), err.body_text())
}

async fn text_field(field: Field<'_>, max_upload_bytes: usize) -> AppResult<String> {
    field.text().await.map_err(|e| form_error(e, max_upload_bytes))
}

/// Read the submission form. Field names are fixed; anything else is rejected.
async fn read_submission(mut multipart: Multipart, max_upload_bytes: usize) -> AppResult<(Submission, Option<Upload>)> {
    let mut submission = Submission::default();
    let mut upload: Option<Upload> = None;
    let mut contact_json: Option<String> = None;
    let mut contact_email: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| form_error(e, max_upload_bytes))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                if upload.is_some() {
                    return Err(AppError::validation("image_multiple", "Only one image may be uploaded"));
                }
                let file_name = field.file_name().map(str::to_string).filter(|n| !n.is_empty());
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| form_error(e, max_upload_bytes))?;
                // Browsers send an empty part when no file was picked.
                if file_name.is_none() && bytes.is_empty() { continue; }
                upload = Some(Upload { file_name, content_type, bytes: bytes.to_vec() });
            }
            "description" => submission.description = text_field(field, max_upload_bytes).await?,
            "type" => submission.kind = parse_kind(Some(text_field(field, max_upload_bytes).await?.as_str()))?,
            "name" => submission.name = Some(text_field(field, max_upload_bytes).await?),
            "category" => submission.category = Some(text_field(field, max_upload_bytes).await?),
            "location" => submission.location = Some(text_field(field, max_upload_bytes).await?),
            "contactDetails" => contact_json = Some(text_field(field, max_upload_bytes).await?),
            "email" => contact_email = Some(text_field(field, max_upload_bytes).await?),
            other => {
                debug!(target: "lostfound::http", "rejecting form field '{}'", other);
                return Err(AppError::validation("unknown_field".to_string(), format!("unexpected form field '{other}'")));
            }
        }
    }

    submission.contact_email = match contact_json.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => {
            let details: ContactDetails = serde_json::from_str(&raw).map_err(|e| {
                AppError::validation("invalid_contact".to_string(), format!("contactDetails must be JSON like {{\"email\": \"...\"}}: {e}"))
            })?;
            Some(details.email)
        }
        None => contact_email,
    };
    Ok((submission, upload))
}
