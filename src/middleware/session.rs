use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tower_cookies::Cookies;

use crate::config;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::StoreError;

/// Identity resolved for the current request, if any. Written once by the
/// session middleware and only read downstream.
#[derive(Clone, Debug, Default)]
pub struct CurrentUser(pub Option<Value>);

/// Key of the live session record backing this request, if any.
#[derive(Clone, Debug, Default)]
pub struct SessionRef(pub Option<String>);

/// Session resolution middleware, run before every route. Resolves the
/// signed session cookie to a session record and the session's `uid` to a
/// user document. Missing, unverifiable, expired, or stale cookies leave the
/// request anonymous rather than failing it; only unexpected store failures
/// abort.
pub async fn resolve_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let mut current_user = CurrentUser(None);
    let mut session_ref = SessionRef(None);

    let cookie_name = &config::config().security.session_cookie;
    if let Some(cookie) = cookies.signed(&state.signing_key).get(cookie_name) {
        let sid = cookie.value().to_string();
        match state.sessions.fetch_by_key(&sid) {
            Ok(session) => {
                if session_expired(&session) {
                    tracing::debug!("session {} expired, proceeding anonymously", sid);
                } else {
                    session_ref = SessionRef(Some(sid.clone()));
                    if let Some(uid) = session.get("uid").and_then(Value::as_str) {
                        match state.users.fetch_by_key(uid) {
                            Ok(user) => current_user = CurrentUser(Some(user)),
                            Err(StoreError::NotFound(_)) => {
                                // The user behind this session is gone; persist
                                // the cleared uid so later requests skip the
                                // lookup entirely.
                                state
                                    .sessions
                                    .patch_by_key(&sid, &json!({ "uid": null }))
                                    .map_err(ApiError::fatal)?;
                                tracing::info!("cleared stale uid on session {}", sid);
                            }
                            Err(other) => return Err(ApiError::fatal(other)),
                        }
                    }
                }
            }
            // Stale cookie referencing a removed session is not an error.
            Err(StoreError::NotFound(_)) => {}
            Err(other) => return Err(ApiError::fatal(other)),
        }
    }

    request.extensions_mut().insert(current_user);
    request.extensions_mut().insert(session_ref);
    Ok(next.run(request).await)
}

fn session_expired(session: &Value) -> bool {
    let ttl = config::config().security.session_ttl_secs;
    match session
        .get("created")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    {
        Some(created) => {
            Utc::now().signed_duration_since(created.with_timezone(&Utc))
                > Duration::seconds(ttl as i64)
        }
        // Sessions without a created timestamp never expire.
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_without_timestamp_never_expires() {
        assert!(!session_expired(&json!({ "uid": "1" })));
    }

    #[test]
    fn ancient_session_is_expired() {
        assert!(session_expired(
            &json!({ "created": "2000-01-01T00:00:00+00:00" })
        ));
    }

    #[test]
    fn fresh_session_is_live() {
        assert!(!session_expired(
            &json!({ "created": Utc::now().to_rfc3339() })
        ));
    }
}
