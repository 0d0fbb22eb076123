// Uniform CRUD contract, applied identically to every resource collection.
// Each handler maps one HTTP verb onto one store operation and translates
// only the store failures enumerated for that operation; everything else is
// fatal. The routers are parameterized by collection handle and validator.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;

use crate::error::ApiError;
use crate::store::{Collection, DocumentMeta, StoreError};
use crate::validation::Validator;

/// One store collection plus its boundary validation and mount point,
/// injected at router construction.
#[derive(Clone)]
pub struct ResourceState {
    pub collection: Collection,
    pub base_path: &'static str,
    pub validate: Validator,
}

/// Builds the six-route CRUD surface for one resource, to be nested under
/// `base_path`.
pub fn routes(collection: Collection, base_path: &'static str, validate: Validator) -> Router {
    let state = ResourceState {
        collection,
        base_path,
        validate,
    };
    Router::new()
        .route("/", get(list).post(create))
        .route(
            "/:key",
            get(detail).put(replace).patch(update).delete(remove),
        )
        .with_state(state)
}

/// GET /R - all documents, store insertion order.
async fn list(State(state): State<ResourceState>) -> Result<Json<Value>, ApiError> {
    let docs = state.collection.list_all().map_err(ApiError::fatal)?;
    Ok(Json(Value::Array(docs)))
}

/// POST /R - insert, 201 with store metadata merged in and a Location
/// header for the new document. Duplicate key is the only handled failure.
async fn create(
    State(state): State<ResourceState>,
    Json(mut body): Json<Value>,
) -> Result<Response, ApiError> {
    (state.validate)(&body).map_err(ApiError::bad_request)?;
    let meta = match state.collection.insert(&body) {
        Ok(meta) => meta,
        Err(StoreError::DuplicateKey(msg)) => return Err(ApiError::conflict(msg)),
        Err(other) => return Err(ApiError::fatal(other)),
    };
    merge_meta(&mut body, &meta);
    let location = format!("{}/{}", state.base_path, meta.key);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(body)).into_response())
}

/// GET /R/:key - fetch one document. Not-found is the only handled failure.
async fn detail(
    State(state): State<ResourceState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.collection.fetch_by_key(&key) {
        Ok(doc) => Ok(Json(doc)),
        Err(StoreError::NotFound(msg)) => Err(ApiError::not_found(msg)),
        Err(other) => Err(ApiError::fatal(other)),
    }
}

/// PUT /R/:key - full overwrite, returning the body with fresh metadata.
async fn replace(
    State(state): State<ResourceState>,
    Path(key): Path<String>,
    Json(mut body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    (state.validate)(&body).map_err(ApiError::bad_request)?;
    let meta = match state.collection.replace_by_key(&key, &body) {
        Ok(meta) => meta,
        Err(StoreError::NotFound(msg)) => return Err(ApiError::not_found(msg)),
        Err(StoreError::WriteConflict(msg)) => return Err(ApiError::conflict(msg)),
        Err(other) => return Err(ApiError::fatal(other)),
    };
    merge_meta(&mut body, &meta);
    Ok(Json(body))
}

/// PATCH /R/:key - merge-update, returning the re-fetched merged document.
/// The re-fetch is a second store call and is not atomic with the update; a
/// concurrent write may land in between and be reflected in the response.
async fn update(
    State(state): State<ResourceState>,
    Path(key): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if !patch.is_object() {
        return Err(ApiError::bad_request("request body must be a JSON object"));
    }
    if let Err(err) = state.collection.patch_by_key(&key, &patch) {
        return match err {
            StoreError::NotFound(msg) => Err(ApiError::not_found(msg)),
            StoreError::WriteConflict(msg) => Err(ApiError::conflict(msg)),
            other => Err(ApiError::fatal(other)),
        };
    }
    match state.collection.fetch_by_key(&key) {
        Ok(doc) => Ok(Json(doc)),
        Err(StoreError::NotFound(msg)) => Err(ApiError::not_found(msg)),
        Err(other) => Err(ApiError::fatal(other)),
    }
}

/// DELETE /R/:key - remove, empty 204 on success.
async fn remove(
    State(state): State<ResourceState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.collection.remove_by_key(&key) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::NotFound(msg)) => Err(ApiError::not_found(msg)),
        Err(other) => Err(ApiError::fatal(other)),
    }
}

fn merge_meta(body: &mut Value, meta: &DocumentMeta) {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("_key".to_string(), Value::String(meta.key.clone()));
        obj.insert("_rev".to_string(), Value::String(meta.rev.clone()));
    }
}
