use clap::Parser;
use herolink_core::schema::{FIND_ONE, HERO_SERVICE, SchemaDescriptor};
use herolink_server::server::config::{CliArgs, ServerConfig};
use herolink_server::server::dispatch::Dispatcher;
use herolink_server::server::hero::{FindOneHandler, InMemoryHeroStore};
use herolink_server::server::registry::RouteTableBuilder;
use herolink_server::server::telemetry::init_telemetry;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry()?;

    // Explicit construction: the dispatcher is handed its schema and handler
    // registrations directly, nothing resolves them at runtime.
    let store = Arc::new(InMemoryHeroStore::with_default_heroes());
    let routes = RouteTableBuilder::new(SchemaDescriptor::hero().clone())
        .register(HERO_SERVICE, FIND_ONE, Arc::new(FindOneHandler::new(store)))?
        .build();

    let route_count = routes.len();
    let dispatcher = Dispatcher::new(config, routes);
    let listener = dispatcher.bind().await?;
    tracing::info!(
        "Starting HeroService on {} with {} route(s)",
        listener.local_addr()?,
        route_count
    );

    dispatcher
        .serve_with_shutdown(listener, shutdown_signal())
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
