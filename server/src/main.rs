mod config;
mod routes;
mod services;
mod state;
mod store;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();

    let store = match store::SnapshotStore::open(&config.data_dir).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, dir = %config.data_dir.display(), "failed to open snapshot store");
            std::process::exit(1);
        }
    };

    let state = state::AppState::new(store, config.save_debounce);

    let app = routes::app(state.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, data_dir = %config.data_dir.display(), "syncspace relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    // Flush every pending debounced write before exiting.
    services::persistence::flush_all(&state).await;
    tracing::info!("shutdown complete");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
