use std::sync::{Arc, Mutex as StdMutex};

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use healthmon::broadcast::Broadcaster;
use healthmon::config::Config;
use healthmon::engine::BollardEngine;
use healthmon::error::Result;
use healthmon::heal::HealScanner;
use healthmon::http::{self, AppState};
use healthmon::notify::Notifier;
use healthmon::reconcile::reconcile;
use healthmon::reducer::Reducer;
use healthmon::store::Store;
use healthmon::tracker::RestartTracker;

/// Watches a container engine's event stream and serves the derived health
/// feed over HTTP/WebSocket. Configuration is read entirely from the
/// environment (§6); see `Config::from_env` for the variable table.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serve the static dashboard bundle from this directory, if given.
    #[arg(long)]
    static_dir: Option<String>,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    if let Err(e) = run(config, args.static_dir).await {
        error!(error = %e, "healthmon exited with an error");
        return Err(e.into());
    }
    Ok(())
}

async fn run(config: Config, static_dir: Option<String>) -> Result<()> {
    let store = Arc::new(Store::open(&config.db_path)?);
    let engine = BollardEngine::connect(&config.engine_host)?;
    let tracker = Arc::new(StdMutex::new(RestartTracker::new(
        config.restart_window,
        config.restart_threshold,
    )));
    let broadcaster = Arc::new(Broadcaster::new());
    let notifier = if config.tg_enabled {
        Some(Arc::new(Notifier::new(config.tg_token.clone(), config.tg_chat_id.clone())))
    } else {
        None
    };

    info!("running startup reconciliation");
    reconcile(&engine, &store, &tracker, config.restart_window).await?;

    let cancel = CancellationToken::new();

    let reducer = Reducer::new(Box::new(engine), store.clone(), tracker.clone(), broadcaster.clone(), notifier.clone());
    let reducer_cancel = cancel.clone();
    let reducer_task = tokio::spawn(async move { reducer.run(reducer_cancel).await });

    let heal_scanner = HealScanner::new(store.clone(), tracker.clone(), broadcaster.clone(), notifier.clone(), config.restart_window);
    let heal_cancel = cancel.clone();
    let heal_task = tokio::spawn(async move { heal_scanner.run(heal_cancel).await });

    let app_state = AppState {
        store: store.clone(),
        broadcaster: broadcaster.clone(),
    };
    let router = http::router(app_state, &config.ws_origins, static_dir.as_deref());
    let listener = tokio::net::TcpListener::bind(config.http_socket_addr()).await?;
    info!(addr = %config.http_socket_addr(), "http server listening");
    let http_cancel = cancel.clone();
    let http_task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { http_cancel.cancelled().await })
            .await
    });

    let mut reducer_failure = None;

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            cancel.cancel();
        }
        result = reducer_task => {
            cancel.cancel();
            match result {
                Ok(Err(e)) => {
                    error!(error = %e, "reducer task failed, shutting down");
                    reducer_failure = Some(e);
                }
                Err(join_err) => {
                    error!(error = %join_err, "reducer task panicked");
                }
                Ok(Ok(())) => {}
            }
        }
    }

    let _ = heal_task.await;
    // §5: the HTTP server gets a 5s grace period to drain in-flight requests
    // after graceful_shutdown sees the cancellation token fire.
    if tokio::time::timeout(std::time::Duration::from_secs(5), http_task).await.is_err() {
        error!("http server did not shut down within its grace period");
    }

    match reducer_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
