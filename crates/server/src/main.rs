use anyhow::Context;
use kasboek_server::config::Config;
use kasboek_server::{build_router, telemetry, AppState};
use kasboek_storage::create_db;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    telemetry::init(&config);

    let pool = create_db(&config.database)
        .await
        .with_context(|| format!("opening database {}", config.database.display()))?;

    let app = build_router(AppState::new(pool.clone()), config.max_upload_bytes);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(address = %config.bind, database = %config.database.display(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    pool.close().await;
    Ok(())
}
