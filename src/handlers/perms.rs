// Read-only permission and membership queries. A lookup miss is a negative
// answer, never an error; the 404 semantics of the CRUD surface do not
// apply here.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// GET /hasperm/:name - does the resolved identity hold this permission,
/// either directly or through one of its memberships?
pub async fn hasperm(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let granted = match &user.0 {
        Some(user) => user_has_perm(&state, user, &name)?,
        None => false,
    };
    Ok(Json(json!({ "granted": granted })))
}

/// GET /memberof/:company - does a membership document link the resolved
/// identity to this company?
pub async fn memberof(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(company): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let member = match &user.0 {
        Some(user) => {
            let uid = user.get("_key").and_then(Value::as_str).unwrap_or_default();
            state
                .memberships
                .list_all()
                .map_err(ApiError::fatal)?
                .iter()
                .any(|m| {
                    m.get("user").and_then(Value::as_str) == Some(uid)
                        && m.get("company").and_then(Value::as_str) == Some(company.as_str())
                })
        }
        None => false,
    };
    Ok(Json(json!({ "member": member })))
}

fn user_has_perm(state: &AppState, user: &Value, name: &str) -> Result<bool, ApiError> {
    if perms_contain(user.get("perms"), name) {
        return Ok(true);
    }
    let uid = user.get("_key").and_then(Value::as_str).unwrap_or_default();
    let memberships = state.memberships.list_all().map_err(ApiError::fatal)?;
    Ok(memberships.iter().any(|m| {
        m.get("user").and_then(Value::as_str) == Some(uid) && perms_contain(m.get("perms"), name)
    }))
}

fn perms_contain(perms: Option<&Value>, name: &str) -> bool {
    perms
        .and_then(Value::as_array)
        .map(|items| items.iter().any(|p| p.as_str() == Some(name)))
        .unwrap_or(false)
}
