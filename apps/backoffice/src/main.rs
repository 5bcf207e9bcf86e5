//! # Tally Backoffice
//!
//! ```text
//! backoffice [--config <path>]
//! ```
//!
//! Startup order: logging, configuration, database (with migrations),
//! bootstrap admins, notification dispatcher, webhook server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tally_backoffice::{router, AppState, BackofficeConfig};
use tally_db::Database;
use tally_notify::{ChatClient, Dispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    info!("Starting Tally backoffice...");

    let Some(config_path) = parse_args()? else {
        return Ok(());
    };

    let config = BackofficeConfig::load(config_path).context("loading configuration")?;
    info!(
        db_path = %config.database.path.display(),
        port = config.server.port,
        notify = config.notify.is_enabled(),
        "Configuration loaded"
    );

    let db = Database::new(config.database.db_config())
        .await
        .context("opening database")?;

    for &chat_user_id in &config.notify.chat.bootstrap_admin_ids {
        db.chat_admins().bootstrap(chat_user_id).await?;
    }

    let dispatcher = if config.notify.is_enabled() {
        let client = ChatClient::new(&config.notify.chat, config.notify.dispatch.request_timeout())?;
        let (dispatcher, handle) = Dispatcher::new(db.clone(), Arc::new(client), &config.notify);
        Some((handle, tokio::spawn(dispatcher.run())))
    } else {
        warn!("No bot token configured, notifications stay queued");
        None
    };

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Webhook server listening");

    let app = router(AppState::new(db.clone(), &config.notify));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some((handle, task)) = dispatcher {
        if let Err(e) = handle.shutdown().await {
            warn!(error = %e, "Dispatcher already stopped");
        }
        if let Err(e) = task.await {
            error!(error = %e, "Dispatcher task failed");
        }
    }

    db.close().await;
    info!("Backoffice shutdown complete");
    Ok(())
}

/// Returns the config path argument, or `None` when `--help` was printed.
fn parse_args() -> anyhow::Result<Option<Option<PathBuf>>> {
    let mut config_path = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("Usage: backoffice [--config <path>]");
                return Ok(None);
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    Ok(Some(config_path))
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
