use anyhow::Context;
use argh::FromArgs;
use coffeeshop::{AppState, Store, create_app};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(FromArgs, Debug)]
/// Coffeeshop: a small REST service for coffees.
struct Args {
    /// host to bind to
    #[argh(option, default = "String::from(\"127.0.0.1\")")]
    host: String,

    /// port to listen on (0 for random available port)
    #[argh(option, short = 'p', default = "0")]
    port: u16,

    /// JSON snapshot file to keep coffees in (in-memory only when omitted)
    #[argh(option, short = 'd')]
    data: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coffeeshop=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Args = argh::from_env();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let store = match &args.data {
        Some(path) => {
            let store = Store::open(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            tracing::info!(path = %path.display(), coffees = store.len(), "snapshot loaded");
            store
        }
        None => Store::in_memory(),
    };
    let state = Arc::new(AppState::new(store));

    let addr_str = format!("{}:{}", args.host, args.port);
    let addr: SocketAddr = addr_str
        .parse()
        .with_context(|| format!("Invalid host or port: {}", addr_str))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    tracing::info!(version = %state.app_version, "http://{}", actual_addr);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
