use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cert_server::{create_app, serve, tls, CertGateServer, Settings};

/// CertGate HTTPS server
#[derive(Parser, Debug)]
#[command(name = "certgate")]
#[command(about = "Mutual TLS client certificate authentication gateway")]
struct Args {
    /// Settings file (defaults to ./certgate.toml when present)
    #[arg(short, long, env = "CERTGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    cert_logging::init(&settings.logging.clone().verbose(args.verbose))
        .context("initializing logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting CertGate");

    let server = CertGateServer::from_settings(&settings).context("building certificate gate")?;
    let app = create_app(server);

    let acceptor = if settings.server.tls.enabled {
        let config = tls::load_server_config(&settings.server.tls).context("loading TLS settings")?;
        Some(tokio_rustls::TlsAcceptor::from(config))
    } else {
        tracing::warn!("TLS disabled: gated routes have no peer certificate to check");
        None
    };

    let address = (settings.server.host.as_str(), settings.server.port);
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("binding {}:{}", address.0, address.1))?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "Failed to listen for Ctrl-C");
                return;
            }
            info!("Ctrl-C received");
            shutdown.cancel();
        }
    });

    serve(listener, app, acceptor, shutdown).await?;
    info!("CertGate stopped");
    Ok(())
}
