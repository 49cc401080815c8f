use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use budget_goals_server::{AppState, build_router, config::Config, database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // load environment variables
    dotenv::dotenv().ok();
    setup_logging();

    let config = Config::from_env()?;
    let main_db = database::init_main_db(&config.data_path).await?;

    let bind_address = config.bind_address();
    if config.expose_reset_tokens {
        tracing::warn!("EXPOSE_RESET_TOKENS is enabled, reset tokens are returned to clients");
    }

    let app = build_router(AppState::new(main_db, config))?;

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server running on http://{}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
