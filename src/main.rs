use clap::Parser;
use kgqa::utils::config::KgqaConfig;
use kgqa::AppState;
use std::path::PathBuf;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "kgqa-server", version, about = "Knowledge-graph QA backend")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "KGQA_CONFIG", default_value = "kgqa.toml")]
    config: PathBuf,

    /// Override the configured bind host.
    #[arg(long, env = "KGQA_HOST")]
    host: Option<String>,

    /// Override the configured bind port.
    #[arg(long, env = "KGQA_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = KgqaConfig::load(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let assets_dir = config.paths.assets_dir.clone();

    let state = AppState::new(config);
    state.store.ensure_layout().await?;

    let mut app = kgqa::api::routes::create_router()
        .layer(
            tower::ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state);

    if assets_dir.exists() {
        app = app.fallback_service(ServeDir::new(&assets_dir));
        tracing::info!(dir = %assets_dir.display(), "serving static assets");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "KGQA server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
