use directory_api::{app, config, state::AppState};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up PORT, SECURITY_COOKIE_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Directory API in {:?} mode", config.environment);

    if config.security.cookie_secret.len() < 32 {
        panic!("SECURITY_COOKIE_SECRET must be set to at least 32 bytes");
    }

    let app = app(AppState::new());

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Directory API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
