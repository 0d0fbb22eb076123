pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;
pub mod store;
pub mod validation;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use handlers::{auth, perms, resource};
use state::AppState;

/// Builds the full application router over the given state. Session
/// resolution runs before every route; cookie management, CORS, and request
/// tracing wrap the whole surface.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(auth_routes(state.clone()))
        .merge(perm_routes(state.clone()))
        .nest(
            "/users",
            resource::routes(state.users.clone(), "/users", validation::user),
        )
        .nest(
            "/companies",
            resource::routes(state.companies.clone(), "/companies", validation::company),
        )
        .nest(
            "/messages",
            resource::routes(state.messages.clone(), "/messages", validation::message),
        )
        .nest(
            "/sessions",
            resource::routes(state.sessions.clone(), "/sessions", validation::session),
        )
        .nest(
            "/memberships",
            resource::routes(
                state.memberships.clone(),
                "/memberships",
                validation::membership,
            ),
        )
        .layer(from_fn_with_state(state, middleware::resolve_session))
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", delete(auth::logout))
        .route("/auth/whoami", get(auth::whoami))
        .with_state(state)
}

fn perm_routes(state: AppState) -> Router {
    Router::new()
        .route("/hasperm/:name", get(perms::hasperm))
        .route("/memberof/:company", get(perms::memberof))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
        }
    }))
}
