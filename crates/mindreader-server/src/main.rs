use anyhow::{Context, Result};
use std::net::{Ipv4Addr, SocketAddr};
use tracing_subscriber::EnvFilter;

mod config;
mod static_files;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::Config::from_env();
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(root = %config.web_root.display(), "serving static files");
    println!("Mind Reader server running at http://localhost:{}", config.port);

    axum::serve(listener, static_files::router(config.web_root))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
