//! HTTP API integration tests: the router is driven in-process with
//! `tower::ServiceExt::oneshot`, backed by JSON stores in a temp directory.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use lostfound::config::Config;
use lostfound::identity::TokenSigner;
use lostfound::media::DiskMediaStore;
use lostfound::model::{ItemStatus, Role};
use lostfound::server::{app, AppState};
use lostfound::storage::Stores;

const BOUNDARY: &str = "lostfound-test-boundary";

struct Harness {
    tmp: TempDir,
    app: Router,
    state: AppState,
    stores: Stores,
}

fn harness() -> Harness {
    let tmp = tempdir().unwrap();
    let mut config = Config::for_data_dir(tmp.path()).unwrap();
    config.jwt_secret = b"integration-secret".to_vec();
    let stores = Stores::open(&config.data_dir).unwrap();
    let media = Arc::new(DiskMediaStore::new(&config.uploads_dir, config.max_upload_bytes).unwrap());
    let state = AppState::new(&stores, media, &config);
    Harness { app: app(state.clone()), tmp, state, stores }
}

impl Harness {
    /// Insert an account directly and hand back a token for it.
    fn account(&self, email: &str, role: Role) -> String {
        let user = self.stores.users.insert("Tester", email, "$argon2id$placeholder", role).unwrap();
        self.state.signer.issue(&user).unwrap()
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, body)
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(method, uri, token, None)).await
    }

    async fn submit(&self, token: &str, fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> (StatusCode, Value) {
        let body = form(fields, image);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/items/add")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    /// Submit the standard wallet report and return its id.
    async fn wallet(&self, token: &str) -> String {
        let (status, body) = self.submit(token, &wallet_fields(), Some(("wallet.jpg", "image/jpeg", jpeg().as_slice()))).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["item"]["_id"].as_str().unwrap().to_string()
    }
}

fn request(method: Method, uri: &str, token: Option<&str>, json_body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    match json_body {
        Some(v) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(v.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend(std::iter::repeat(7u8).take(512));
    bytes
}

fn wallet_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("description", "Black leather wallet"),
        ("type", "lost"),
        ("location", "Main library"),
        ("contactDetails", r#"{"email":"a@b.com"}"#),
    ]
}

fn form(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in fields {
        out.extend_from_slice(format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes());
    }
    if let Some((file_name, mime, bytes)) = image {
        out.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n").as_bytes(),
        );
        out.extend_from_slice(bytes);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    out
}

fn ids(body: &Value) -> Vec<String> {
    body.as_array().unwrap().iter().map(|i| i["_id"].as_str().unwrap().to_string()).collect()
}

#[tokio::test]
async fn liveness() {
    let h = harness();
    let resp = h.app.clone().oneshot(request(Method::GET, "/", None, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn wallet_round_trip() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);
    let claimer = h.account("u2@example.com", Role::User);
    let admin = h.account("admin@example.com", Role::Admin);

    let (status, body) = h.submit(&owner, &wallet_fields(), Some(("wallet.jpg", "image/jpeg", jpeg().as_slice()))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["item"]["status"], "pending");
    assert_eq!(body["item"]["type"], "lost");
    assert_eq!(body["item"]["contactDetails"]["email"], "a@b.com");
    let id = body["item"]["_id"].as_str().unwrap().to_string();
    let image = body["item"]["image"].as_str().unwrap().to_string();

    let (_, public) = h.call(Method::GET, "/api/items", None).await;
    assert!(ids(&public).is_empty());

    let (status, body) = h.call(Method::PUT, &format!("/api/items/approve/{id}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["status"], "approved");

    let (_, public) = h.call(Method::GET, "/api/items", None).await;
    assert_eq!(ids(&public), vec![id.clone()]);

    let resp = h.app.clone().oneshot(request(Method::GET, &image, None, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let served = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(served.as_ref(), jpeg().as_slice());

    let (status, body) = h.call(Method::PUT, &format!("/api/items/claim/{id}"), Some(&claimer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["status"], "claimed");
    assert!(body["item"]["claimedBy"].is_string());
    assert!(body["item"]["claimedAt"].is_string());

    let (status, _) = h.call(Method::PUT, &format!("/api/items/claim/{id}"), Some(&owner)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, public) = h.call(Method::GET, "/api/items", None).await;
    assert!(ids(&public).is_empty());
    let (_, claimed) = h.call(Method::GET, "/api/items?claimed=true", None).await;
    assert_eq!(ids(&claimed), vec![id]);
}

#[tokio::test]
async fn submit_requires_token_and_image() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/items/add")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(form(&wallet_fields(), Some(("w.jpg", "image/jpeg", jpeg().as_slice())))))
        .unwrap();
    let (status, body) = h.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized, no token");

    let (status, body) = h.submit(&owner, &wallet_fields(), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "image_required");
    assert_eq!(h.stores.items.count().unwrap(), 0);
}

#[tokio::test]
async fn bad_uploads_create_nothing() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);

    let (status, body) = h.submit(&owner, &wallet_fields(), Some(("a.gif", "image/gif", &b"GIF89a...."[..]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "image_type");

    let (status, body) = h.submit(&owner, &wallet_fields(), Some(("a.png", "image/png", jpeg().as_slice()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "image_content");

    let mut big = jpeg();
    big.resize(5 * 1024 * 1024 + 1, 0);
    let (status, body) = h.submit(&owner, &wallet_fields(), Some(("big.jpg", "image/jpeg", big.as_slice()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "image_too_large");

    assert_eq!(h.stores.items.count().unwrap(), 0);
    assert_eq!(std::fs::read_dir(h.tmp.path().join("uploads")).unwrap().count(), 0);
}

#[tokio::test]
async fn form_fields_are_strict() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);

    let mut fields = wallet_fields();
    fields.push(("status", "approved"));
    let (status, body) = h.submit(&owner, &fields, Some(("w.jpg", "image/jpeg", jpeg().as_slice()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "unknown_field");

    let fields = vec![("description", "Keys"), ("type", "found"), ("contactDetails", "a@b.com")];
    let (status, body) = h.submit(&owner, &fields, Some(("w.jpg", "image/jpeg", jpeg().as_slice()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_contact");

    let fields = vec![("description", "Keys"), ("type", "misplaced"), ("email", "a@b.com")];
    let (status, body) = h.submit(&owner, &fields, Some(("w.jpg", "image/jpeg", jpeg().as_slice()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_type");

    let fields = vec![("description", "Keys"), ("type", "found"), ("email", "a@b.com"), ("category", "keys")];
    let (status, body) = h.submit(&owner, &fields, Some(("k.jpg", "image/jpeg", jpeg().as_slice()))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["item"]["category"], "keys");
    assert_eq!(body["item"]["type"], "found");
    assert_eq!(h.stores.items.count().unwrap(), 1);
}

#[tokio::test]
async fn moderation_is_admin_only() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);
    let id = h.wallet(&owner).await;

    for (method, uri) in [
        (Method::PUT, format!("/api/items/approve/{id}")),
        (Method::PUT, format!("/api/items/reject/{id}")),
        (Method::DELETE, format!("/api/items/delete/{id}")),
        (Method::GET, "/api/items/all".to_string()),
        (Method::GET, "/api/items/pending".to_string()),
    ] {
        let (status, body) = h.call(method.clone(), &uri, Some(&owner)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        assert_eq!(body["message"], "Access denied, admin only");
    }
    let (status, _) = h.call(Method::PUT, &format!("/api/items/approve/{id}"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stored = h.stores.items.find(id.parse().unwrap()).unwrap().unwrap();
    assert_eq!(stored.status, ItemStatus::Pending);
}

#[tokio::test]
async fn reject_with_and_without_reason() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);
    let admin = h.account("admin@example.com", Role::Admin);
    let a = h.wallet(&owner).await;
    let b = h.wallet(&owner).await;

    let req = request(Method::PUT, &format!("/api/items/reject/{a}"), Some(&admin), Some(json!({ "reason": "damaged" })));
    let (status, body) = h.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["status"], "rejected");
    assert_eq!(body["item"]["rejectionReason"], "damaged");

    let (status, body) = h.call(Method::PUT, &format!("/api/items/reject/{b}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["rejectionReason"], "Rejected by administrator");

    let claimer = h.account("u2@example.com", Role::User);
    let (status, body) = h.call(Method::PUT, &format!("/api/items/claim/{a}"), Some(&claimer)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "not_claimable");

    let req = request(Method::PUT, &format!("/api/items/reject/{b}"), Some(&admin), Some(json!({ "reason": "x", "notify": true })));
    let (status, _) = h.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn claiming_pending_item_fails() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);
    let other = h.account("u2@example.com", Role::User);
    let id = h.wallet(&owner).await;
    let (status, body) = h.call(Method::PUT, &format!("/api/items/claim/{id}"), Some(&other)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Only approved items can be claimed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_over_http() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);
    let admin = h.account("admin@example.com", Role::Admin);
    let id = h.wallet(&owner).await;
    h.call(Method::PUT, &format!("/api/items/approve/{id}"), Some(&admin)).await;

    let tokens: Vec<String> = (0..10).map(|i| h.account(&format!("c{i}@example.com"), Role::User)).collect();
    let uri = format!("/api/items/claim/{id}");
    let handles: Vec<_> = tokens
        .iter()
        .map(|t| {
            let app = h.app.clone();
            let req = request(Method::PUT, &uri, Some(t), None);
            tokio::spawn(async move { app.oneshot(req).await.unwrap().status() })
        })
        .collect();
    let statuses: Vec<StatusCode> = futures::future::join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), tokens.len() - 1);
}

#[tokio::test]
async fn delete_then_fetch_is_not_found() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);
    let admin = h.account("admin@example.com", Role::Admin);
    let id = h.wallet(&owner).await;

    let (status, _) = h.call(Method::GET, &format!("/api/items/{id}"), Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h.call(Method::GET, &format!("/api/items/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = h.call(Method::DELETE, &format!("/api/items/delete/{id}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Item deleted successfully");

    let (status, _) = h.call(Method::GET, &format!("/api/items/{id}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h.call(Method::DELETE, &format!("/api/items/delete/{id}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = h.call(Method::GET, "/api/items/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_id");
}

#[tokio::test]
async fn admin_and_personal_views() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);
    let other = h.account("u2@example.com", Role::User);
    let admin = h.account("admin@example.com", Role::Admin);
    let first = h.wallet(&owner).await;
    let second = h.wallet(&owner).await;
    h.call(Method::PUT, &format!("/api/items/approve/{first}"), Some(&admin)).await;

    let (_, pending) = h.call(Method::GET, "/api/items/pending", Some(&admin)).await;
    assert_eq!(ids(&pending), vec![second.clone()]);
    let (_, all) = h.call(Method::GET, "/api/items/all", Some(&admin)).await;
    assert_eq!(ids(&all), vec![second.clone(), first.clone()]);
    let (_, approved) = h.call(Method::GET, "/api/items/all?status=approved&type=lost&q=library", Some(&admin)).await;
    assert_eq!(ids(&approved), vec![first.clone()]);
    let (status, _) = h.call(Method::GET, "/api/items/all?status=lost", Some(&admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, mine) = h.call(Method::GET, "/api/items/mine", Some(&owner)).await;
    assert_eq!(ids(&mine).len(), 2);
    let (_, theirs) = h.call(Method::GET, "/api/items/mine", Some(&other)).await;
    assert!(ids(&theirs).is_empty());

    let (_, found) = h.call(Method::GET, "/api/items?type=found", None).await;
    assert!(ids(&found).is_empty());
    let (_, searched) = h.call(Method::GET, "/api/items?q=LEATHER", None).await;
    assert_eq!(ids(&searched), vec![first]);
    let (status, _) = h.call(Method::GET, "/api/items?sort=asc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tokens_from_other_secrets_are_rejected() {
    let h = harness();
    let user = h.stores.users.insert("Mallory", "m@example.com", "x", Role::User).unwrap();
    let forged = TokenSigner::new(b"not-the-secret", std::time::Duration::from_secs(600)).issue(&user).unwrap();
    let (status, body) = h.call(Method::GET, "/api/items/mine", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized, token failed");
}

#[tokio::test]
async fn signup_login_and_me() {
    let h = harness();
    let body = json!({ "name": "Ann", "email": "Ann@Example.com", "password": "secret1" });
    let (status, signed) = h.send(request(Method::POST, "/api/auth/signup", None, Some(body.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(signed["user"]["role"], "user");
    assert!(signed["user"].get("passwordHash").is_none());

    let (status, _) = h.send(request(Method::POST, "/api/auth/signup", None, Some(body))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let wrong = json!({ "email": "ann@example.com", "password": "nope123" });
    let (status, _) = h.send(request(Method::POST, "/api/auth/login", None, Some(wrong))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let good = json!({ "email": "ann@example.com", "password": "secret1" });
    let (status, logged) = h.send(request(Method::POST, "/api/auth/login", None, Some(good))).await;
    assert_eq!(status, StatusCode::OK);
    let token = logged["token"].as_str().unwrap();

    let (status, me) = h.call(Method::GET, "/api/auth/me", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], "ann@example.com");

    let sneaky = json!({ "name": "Eve", "email": "eve@example.com", "password": "secret1", "role": "admin" });
    let (status, _) = h.send(request(Method::POST, "/api/auth/signup", None, Some(sneaky))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn state_survives_reopen() {
    let h = harness();
    let owner = h.account("u1@example.com", Role::User);
    let admin = h.account("admin@example.com", Role::Admin);
    let id = h.wallet(&owner).await;
    h.call(Method::PUT, &format!("/api/items/approve/{id}"), Some(&admin)).await;

    assert!(Stores::open(h.tmp.path()).is_err());
    let Harness { tmp, app, state, stores } = h;
    drop((app, state, stores));

    let reopened = Stores::open(tmp.path()).unwrap();
    let item = reopened.items.find(id.parse().unwrap()).unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Approved);
    assert_eq!(reopened.users.count().unwrap(), 2);
}
