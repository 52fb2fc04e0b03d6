use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use trafficiq_core::{init_tracing_from_settings, Settings};
use trafficiqd::{router, AppState};

#[derive(Parser)]
#[command(name = "trafficiqd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "TrafficIQ HTTP daemon", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut settings = Settings::from_env();
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }
    init_tracing_from_settings(&settings);

    let addr = settings.bind_addr.clone();
    let environment = settings.environment.clone();
    let title = settings.api_title.clone();
    let state = AppState::from_settings(settings).context("Failed to initialize agent")?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, %environment, title = %title, "trafficiqd listening");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;
    Ok(())
}
