//! l402-server CLI entry point.

mod cli;

use clap::Parser;
use cli::Cli;
use l402_kit::{
    backend::{PaymentBackend, SimulatedBackend},
    catalog::Catalog,
    config::{BackendKind, ServerConfig},
    engine::L402Engine,
    lnd::LndClient,
    server,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let config = Cli::parse().into_config()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("l402-server v{}", env!("CARGO_PKG_VERSION"));
    let catalog = Catalog::from_file(&config.catalog_path)?;
    info!(
        "Loaded {} products from {}",
        catalog.products.len(),
        config.catalog_path.display()
    );

    match config.backend {
        BackendKind::Lnd => {
            let lnd = LndClient::builder()
                .host(config.lnd.host.clone().unwrap_or_default())
                .macaroon(config.lnd.macaroon.clone().unwrap_or_default())
                .accept_invalid_certs(config.lnd.accept_invalid_certs)
                .timeout(config.backend_timeout())
                .build()?;

            match lnd.get_info().await {
                Ok(node) => info!(
                    "Connected to LND node '{}' ({}), block height {}",
                    node.alias, node.identity_pubkey, node.block_height
                ),
                Err(err) => warn!("LND node at {} is not reachable yet: {err}", lnd.base_url),
            }

            serve(config, catalog, lnd).await
        }
        BackendKind::Simulated => {
            warn!("Using the simulated payment backend; invoices are not payable");
            serve(config, catalog, SimulatedBackend::new()).await
        }
    }
}

async fn serve<B: PaymentBackend>(
    config: ServerConfig,
    catalog: Catalog,
    backend: B,
) -> color_eyre::Result<()> {
    let engine = L402Engine::builder()
        .backend(backend)
        .config(config.engine_config())
        .build();

    let maintenance = config
        .maintenance_interval()
        .map(|interval| engine.spawn_maintenance(interval));

    let app = server::router(engine, catalog, config.protected_price()?)
        .layer(TraceLayer::new_for_http());

    info!("Starting server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("Server running at http://{}", config.listen_addr);
    axum::serve(listener, app).await?;

    if let Some(maintenance) = maintenance {
        maintenance.abort();
    }

    info!("Goodbye!");
    Ok(())
}
