use anyhow::Context;
use arguments::Arguments;
use camstream::{StreamEndpoint, WsConnector};
use clap::Parser;
use config::ViewerConfig;
use std::sync::Arc;
use supervisor::Supervisor;
use tracing_subscriber::EnvFilter;

mod arguments;
mod config;
mod supervisor;
mod surface;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Arguments::parse();
    let config = ViewerConfig::from_file(&args.config)?;
    let server = args.server.as_deref().unwrap_or(&config.server);
    let endpoint = StreamEndpoint::new(server).context("Invalid stream server")?;
    tracing::info!("Streaming {} cameras from {}", config.cameras.len(), endpoint.base());

    let mut supervisor = Supervisor::start(
        Arc::new(WsConnector::new(endpoint)),
        &config,
        args.retry_after.into(),
    )?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl-c")?;
            tracing::info!("Shutting down");
        }
        () = supervisor.run() => {}
    }
    let surfaces = supervisor.shutdown().await;

    if let Some(output) = args.output {
        std::fs::create_dir_all(&output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        for (camera, surface) in &surfaces {
            surface.save(&output.join(format!("{camera}.png")))?;
        }
        tracing::info!("Wrote {} surfaces to {}", surfaces.len(), output.display());
    }

    Ok(())
}
