use std::sync::Arc;

use smartride::{app_state::AppState, config::Config, routes::make_router, tracing::setup_tracing};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = Config::from_env().expect("failed to read configuration");
    let _guard = setup_tracing(config.log_path.as_deref());

    let state = AppState::new(&config).expect("failed to build http client");
    let app = make_router().with_state(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("failed to bind listen address");

    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app).await.unwrap();
}
