// Authentication endpoints: the only place the session cookie is
// established or torn down. Passwords are stored as salted SHA-256 digests;
// plaintext never reaches the store.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::config;
use crate::error::ApiError;
use crate::middleware::{CurrentUser, SessionRef};
use crate::state::AppState;
use crate::store::StoreError;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// POST /auth/signup - create a user, start a session, set the cookie.
/// Returns 201 with the sanitized user document.
pub async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(mut body): Json<Value>,
) -> Result<Response, ApiError> {
    validation::user(&body).map_err(ApiError::bad_request)?;
    let password = match body.as_object_mut().and_then(|obj| obj.remove("password")) {
        Some(Value::String(p)) if !p.is_empty() => p,
        _ => {
            return Err(ApiError::bad_request(
                "field 'password' is required and must be a non-empty string",
            ))
        }
    };

    let username = body
        .get("username")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if find_by_username(&state, &username)?.is_some() {
        return Err(ApiError::conflict(format!(
            "username '{}' is already taken",
            username
        )));
    }

    let salt = Uuid::new_v4().simple().to_string();
    let hash = hash_password(&salt, &password);
    if let Some(obj) = body.as_object_mut() {
        obj.insert("salt".to_string(), Value::String(salt));
        obj.insert("passwordHash".to_string(), Value::String(hash));
    }

    let meta = match state.users.insert(&body) {
        Ok(meta) => meta,
        Err(StoreError::DuplicateKey(msg)) => return Err(ApiError::conflict(msg)),
        Err(other) => return Err(ApiError::fatal(other)),
    };
    start_session(&state, &cookies, &meta.key)?;

    if let Some(obj) = body.as_object_mut() {
        obj.insert("_key".to_string(), Value::String(meta.key));
        obj.insert("_rev".to_string(), Value::String(meta.rev));
    }
    Ok((StatusCode::CREATED, Json(sanitize(body))).into_response())
}

/// POST /auth/login - verify credentials, start a session, set the cookie.
/// Unknown username and wrong password are indistinguishable to the caller.
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(creds): Json<Credentials>,
) -> Result<Json<Value>, ApiError> {
    let user = find_by_username(&state, &creds.username)?
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;

    let salt = user.get("salt").and_then(Value::as_str).unwrap_or_default();
    let expected = user
        .get("passwordHash")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if expected.is_empty() || hash_password(salt, &creds.password) != expected {
        return Err(ApiError::unauthorized("invalid credentials"));
    }

    let uid = user
        .get("_key")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    start_session(&state, &cookies, &uid)?;
    Ok(Json(sanitize(user)))
}

/// DELETE /auth/logout - clear the session's uid and drop the cookie.
/// Idempotent: no live session still yields 204.
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
    Extension(session): Extension<SessionRef>,
) -> Result<StatusCode, ApiError> {
    if let Some(sid) = session.0 {
        match state.sessions.patch_by_key(&sid, &json!({ "uid": null })) {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {}
            Err(other) => return Err(ApiError::fatal(other)),
        }
    }
    let name = config::config().security.session_cookie.clone();
    cookies
        .signed(&state.signing_key)
        .remove(Cookie::build((name, "")).path("/").build());
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/whoami - the resolved identity, or `{"username": null}` when
/// anonymous. Never an error.
pub async fn whoami(Extension(user): Extension<CurrentUser>) -> Json<Value> {
    match user.0 {
        Some(doc) => Json(sanitize(doc)),
        None => Json(json!({ "username": null })),
    }
}

fn start_session(state: &AppState, cookies: &Cookies, uid: &str) -> Result<(), ApiError> {
    let session = json!({
        "uid": uid,
        "created": chrono::Utc::now().to_rfc3339(),
    });
    let meta = state.sessions.insert(&session).map_err(ApiError::fatal)?;
    let name = config::config().security.session_cookie.clone();
    let cookie = Cookie::build((name, meta.key))
        .path("/")
        .http_only(true)
        .build();
    cookies.signed(&state.signing_key).add(cookie);
    Ok(())
}

fn find_by_username(state: &AppState, username: &str) -> Result<Option<Value>, ApiError> {
    let users = state.users.list_all().map_err(ApiError::fatal)?;
    Ok(users
        .into_iter()
        .find(|u| u.get("username").and_then(Value::as_str) == Some(username)))
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn sanitize(mut user: Value) -> Value {
    if let Some(obj) = user.as_object_mut() {
        obj.remove("salt");
        obj.remove("passwordHash");
    }
    user
}
