//! Axum-based HTTP gateway.
//!
//! Request pipeline: perimeter layers (CORS, body limit, timeout, sliding
//! window rate limit) → payload validation → token check for protected
//! routes → handler → owner-scoped store. Handlers never touch persistent
//! state before the payload has validated and the caller is known.

use crate::auth::{password, TokenIssuer};
use crate::config::{Config, PerimeterConfig};
use crate::error::ApiError;
use crate::sanitize;
use crate::store::notes::IMPORT_BATCH_CAP;
use crate::store::{LoginKey, NewUser, Note, Profile, Store};
use crate::validate::{self, Schema, Violation};
use anyhow::Result;
use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Single generic message for any credential failure — no distinction
/// between unknown identifier and wrong password.
const INVALID_CREDENTIALS: &str = "Invalid username/email or password";

/// Valid Argon2id PHC string (all-zero salt and digest) verified against
/// when the login identifier is unknown, so lookup misses cost the same as
/// password mismatches.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// How often the rate limiter sweeps stale client entries from its map.
const RATE_LIMITER_SWEEP_INTERVAL_SECS: u64 = 300; // 5 minutes

#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    limit_per_window: u32,
    window: Duration,
    requests: Mutex<(HashMap<String, Vec<Instant>>, Instant)>,
}

impl SlidingWindowRateLimiter {
    pub fn new(limit_per_window: u32, window: Duration) -> Self {
        Self {
            limit_per_window,
            window,
            requests: Mutex::new((HashMap::new(), Instant::now())),
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        if self.limit_per_window == 0 {
            return true;
        }

        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or_else(Instant::now);

        let mut guard = self.requests.lock();
        let (requests, last_sweep) = &mut *guard;

        // Periodic sweep: drop clients with no recent requests
        if last_sweep.elapsed() >= Duration::from_secs(RATE_LIMITER_SWEEP_INTERVAL_SECS) {
            requests.retain(|_, timestamps| {
                timestamps.retain(|t| *t > cutoff);
                !timestamps.is_empty()
            });
            *last_sweep = now;
        }

        let entry = requests.entry(key.to_owned()).or_default();
        entry.retain(|instant| *instant > cutoff);

        if entry.len() >= self.limit_per_window as usize {
            return false;
        }

        entry.push(now);
        true
    }
}

fn client_key_from_headers(headers: &HeaderMap) -> String {
    for header_name in ["X-Forwarded-For", "X-Real-IP"] {
        if let Some(value) = headers.get(header_name).and_then(|v| v.to_str().ok()) {
            let first = value.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    "unknown".into()
}

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub tokens: Arc<TokenIssuer>,
    pub limiter: Arc<SlidingWindowRateLimiter>,
}

/// Run the HTTP gateway.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let store = Arc::new(Store::open(&config.storage.db_path)?);
    tracing::info!(db = %config.storage.db_path.display(), "store opened");

    let tokens = Arc::new(TokenIssuer::new(
        config.token_secret(),
        config.auth.token_ttl_secs,
    ));
    let limiter = Arc::new(SlidingWindowRateLimiter::new(
        config.perimeter.rate_limit_per_window,
        Duration::from_secs(config.perimeter.rate_limit_window_secs),
    ));

    let state = AppState {
        store,
        tokens,
        limiter,
    };
    let app = router(state, &config.perimeter)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let display_addr = listener.local_addr()?;

    println!("🦀 Quillbox listening on http://{display_addr}");
    println!("  POST /api/auth/register     — create an account");
    println!("  POST /api/auth/login        — get a token (username or email)");
    println!("  GET  /api/auth/me           — profile (token required)");
    println!("  GET  /api/notes?q=          — list/search notes");
    println!("  GET  /api/notes/export/json — download all notes");
    println!("  GET  /health                — health check");
    println!("  Press Ctrl+C to stop.\n");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router. Split from [`run`] so tests can drive it in-process.
pub fn router(state: AppState, perimeter: &PerimeterConfig) -> Result<Router> {
    let cors = match perimeter.allowed_origin.as_deref() {
        Some(origin) => CorsLayer::new().allow_origin(origin.parse::<HeaderValue>()?),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods([
        axum::http::Method::GET,
        axum::http::Method::POST,
        axum::http::Method::PUT,
        axum::http::Method::DELETE,
        axum::http::Method::OPTIONS,
    ])
    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
    .max_age(Duration::from_secs(3600));

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/api/auth/register", post(handle_register))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/me", get(handle_me))
        .route("/api/auth/me", put(handle_update_me))
        .route("/api/auth/me/password", put(handle_change_password))
        .route("/api/notes", get(handle_notes_list))
        .route("/api/notes", post(handle_note_create))
        .route("/api/notes/{id}", put(handle_note_update))
        .route("/api/notes/{id}", delete(handle_note_delete))
        .route("/api/notes/export/json", get(handle_notes_export))
        .route("/api/notes/import", post(handle_notes_import))
        .fallback(handle_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(perimeter.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(perimeter.request_timeout_secs),
        )))
}

async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key_from_headers(request.headers());
    if !state.limiter.allow(&key) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"message": "Too many requests"})),
        )
            .into_response();
    }
    next.run(request).await
}

// ══════════════════════════════════════════════════════════════════════════════
// AUTH GATE
// ══════════════════════════════════════════════════════════════════════════════

/// Resolve the caller's user id from the Authorization header, or fail with
/// the appropriate 401. Accepts `Bearer <token>` or a raw token string.
fn require_caller(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim();

    if raw.is_empty() {
        return Err(ApiError::Unauthorized("No token provided".into()));
    }

    state
        .tokens
        .verify(raw)
        .map_err(|_| ApiError::Unauthorized("Invalid token".into()))
}

// ══════════════════════════════════════════════════════════════════════════════
// PAYLOAD PARSING
// ══════════════════════════════════════════════════════════════════════════════

/// Decode a JSON body, validate it against the schema, then map it into the
/// typed request struct. Nothing downstream sees an unvalidated payload.
fn parse_body<T: serde::de::DeserializeOwned>(
    body: Result<Json<Value>, JsonRejection>,
    schema: &Schema,
) -> Result<T, ApiError> {
    let Json(value) = body.map_err(|_| ApiError::BadRequest("Invalid JSON body".into()))?;
    schema.check(&value).map_err(ApiError::Validation)?;
    serde_json::from_value(value)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("body decode after validation: {e}")))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    first_name: String,
    last_name: String,
    username: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginBody {
    username: Option<String>,
    email: Option<String>,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMeBody {
    first_name: String,
    last_name: String,
    username: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordBody {
    old_password: String,
    new_password: String,
}

#[derive(Deserialize)]
struct NoteBody {
    title: String,
    content: String,
}

#[derive(Deserialize)]
struct NotesQuery {
    q: Option<String>,
}

// ══════════════════════════════════════════════════════════════════════════════
// AUTH HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// POST /api/auth/register — create an account and issue a token.
async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body: RegisterBody = parse_body(body, &validate::REGISTER)?;

    let hash = password::hash(&body.password)?;
    let user_id = state.store.create_user(&NewUser {
        first_name: &body.first_name,
        last_name: &body.last_name,
        username: &body.username,
        email: &body.email,
        password_hash: &hash,
    })?;

    let token = state
        .tokens
        .issue(&user_id, &body.username, &body.email)
        .map_err(|e| ApiError::Internal(e.into()))?;

    tracing::info!(user_id = %user_id, username = %body.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "token": token,
            "username": body.username,
            "email": body.email,
            "firstName": body.first_name,
            "lastName": body.last_name,
        })),
    ))
}

/// POST /api/auth/login — username+password or email+password.
async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body: LoginBody = parse_body(body, &validate::LOGIN)?;

    let key = match (body.username.as_deref(), body.email.as_deref()) {
        (Some(username), _) if !username.is_empty() => LoginKey::Username(username),
        (_, Some(email)) if !email.is_empty() => LoginKey::Email(email),
        // Unreachable past validation; fail like any credential miss.
        _ => return Err(ApiError::BadRequest(INVALID_CREDENTIALS.into())),
    };

    let Some(credentials) = state.store.find_credentials(key)? else {
        // Equalize timing with the mismatch path before failing.
        let _ = password::verify(&body.password, DUMMY_HASH);
        return Err(ApiError::BadRequest(INVALID_CREDENTIALS.into()));
    };

    if !password::verify(&body.password, &credentials.password_hash)? {
        return Err(ApiError::BadRequest(INVALID_CREDENTIALS.into()));
    }

    let token = state
        .tokens
        .issue(&credentials.id, &credentials.username, &credentials.email)
        .map_err(|e| ApiError::Internal(e.into()))?;

    tracing::info!(user_id = %credentials.id, username = %credentials.username, "user logged in");

    Ok(Json(json!({
        "token": token,
        "username": credentials.username,
        "email": credentials.email,
        "firstName": credentials.first_name,
        "lastName": credentials.last_name,
    })))
}

/// GET /api/auth/me — the caller's own profile.
async fn handle_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Profile>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let profile = state
        .store
        .get_profile(&caller)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(profile))
}

/// PUT /api/auth/me — update names, optionally the username.
async fn handle_update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let body: UpdateMeBody = parse_body(body, &validate::UPDATE_ME)?;

    let profile = state.store.update_profile(
        &caller,
        &body.first_name,
        &body.last_name,
        body.username.as_deref(),
    )?;

    tracing::info!(user_id = %caller, "profile updated");
    Ok(Json(profile))
}

/// PUT /api/auth/me/password — verify the old password, store a new hash.
async fn handle_change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let body: ChangePasswordBody = parse_body(body, &validate::CHANGE_PASSWORD)?;

    let stored = state
        .store
        .password_hash(&caller)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if !password::verify(&body.old_password, &stored)? {
        return Err(ApiError::BadRequest("Old password is incorrect".into()));
    }

    let new_hash = password::hash(&body.new_password)?;
    state.store.set_password_hash(&caller, &new_hash)?;

    tracing::info!(user_id = %caller, "password changed");
    Ok(Json(json!({"message": "Password updated successfully"})))
}

// ══════════════════════════════════════════════════════════════════════════════
// NOTE HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /api/notes?q=term — list or search the caller's notes, newest first.
async fn handle_notes_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NotesQuery>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let notes = state.store.list_notes(&caller, query.q.as_deref())?;
    tracing::info!(user_id = %caller, count = notes.len(), "notes fetched");
    Ok(Json(notes))
}

/// POST /api/notes — create a note; content is sanitized before storage.
async fn handle_note_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let caller = require_caller(&state, &headers)?;
    let body: NoteBody = parse_body(body, &validate::NOTE)?;

    let note = state
        .store
        .create_note(&caller, &body.title, &sanitize::clean(&body.content))?;

    tracing::info!(user_id = %caller, note_id = %note.id, "note created");
    Ok((StatusCode::CREATED, Json(note)))
}

/// PUT /api/notes/:id — update one of the caller's notes.
async fn handle_note_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Note>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let body: NoteBody = parse_body(body, &validate::NOTE)?;

    let note =
        state
            .store
            .update_note(&caller, &id, &body.title, &sanitize::clean(&body.content))?;

    tracing::info!(user_id = %caller, note_id = %id, "note updated");
    Ok(Json(note))
}

/// DELETE /api/notes/:id — delete one of the caller's notes.
async fn handle_note_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    state.store.delete_note(&caller, &id)?;
    tracing::info!(user_id = %caller, note_id = %id, "note deleted");
    Ok(Json(json!({"message": "Deleted"})))
}

/// GET /api/notes/export/json — download all of the caller's notes.
async fn handle_notes_export(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let notes = state.store.list_notes(&caller, None)?;

    let export: Vec<Value> = notes
        .iter()
        .map(|n| json!({"title": n.title, "content": n.content}))
        .collect();
    let payload = serde_json::to_string_pretty(&export)
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"notes-export.json\"",
            ),
        ],
        payload,
    )
        .into_response())
}

/// POST /api/notes/import — bulk insert a bounded batch of notes.
async fn handle_notes_import(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let Json(value) = body.map_err(|_| ApiError::BadRequest("Invalid JSON body".into()))?;

    let Some(array) = value.get("notes").and_then(Value::as_array) else {
        return Err(ApiError::Validation(vec![Violation {
            field: "notes".into(),
            message: "must be an array".into(),
        }]));
    };
    if array.is_empty() {
        return Err(ApiError::BadRequest("No notes to import".into()));
    }
    if array.len() > IMPORT_BATCH_CAP {
        return Err(ApiError::Validation(vec![Violation {
            field: "notes".into(),
            message: format!("must contain at most {IMPORT_BATCH_CAP} items"),
        }]));
    }

    let mut violations = Vec::new();
    let mut items = Vec::with_capacity(array.len());
    for (index, item) in array.iter().enumerate() {
        match validate::NOTE_ITEM.check(item) {
            Ok(()) => {
                let title = item["title"].as_str().unwrap_or_default().to_owned();
                let content = sanitize::clean(item["content"].as_str().unwrap_or_default());
                items.push((title, content));
            }
            Err(item_violations) => {
                violations.extend(item_violations.into_iter().map(|v| Violation {
                    field: format!("notes[{index}].{}", v.field),
                    message: v.message,
                }));
            }
        }
    }
    if !violations.is_empty() {
        return Err(ApiError::Validation(violations));
    }

    let count = state.store.import_notes(&caller, &items)?;
    tracing::info!(user_id = %caller, count, "notes imported");
    Ok(Json(json!({"message": "Imported", "count": count})))
}

// ══════════════════════════════════════════════════════════════════════════════
// MISC HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health — always public (no secrets leaked).
async fn handle_health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn handle_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"message": "Route not found"})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_zero_limit_means_unlimited() {
        let limiter = SlidingWindowRateLimiter::new(0, Duration::from_secs(60));
        for _ in 0..1000 {
            assert!(limiter.allow("10.0.0.1"));
        }
    }

    #[test]
    fn rate_limiter_enforces_budget_per_client() {
        let limiter = SlidingWindowRateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
        // A different client has its own budget.
        assert!(limiter.allow("10.0.0.2"));
    }

    #[test]
    fn client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", "1.2.3.4, 5.6.7.8".parse().unwrap());
        headers.insert("X-Real-IP", "9.9.9.9".parse().unwrap());
        assert_eq!(client_key_from_headers(&headers), "1.2.3.4");
    }

    #[test]
    fn client_key_falls_back_to_unknown() {
        assert_eq!(client_key_from_headers(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn dummy_hash_parses_and_never_verifies() {
        assert!(!password::verify("anything", DUMMY_HASH).unwrap());
    }
}
