use std::io::Write;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xrayops_feed::{FeedEvent, ReconnectPolicy, StatsFeedController, WsFeedClient};
use xrayops_logtail::{HttpLogSource, LogTailController, TailEvent};
use xrayops_monitor::config::MonitorConfig;
use xrayops_monitor::render;
use xrayops_monitor::tail::start_with_backlog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "xrayops_monitor=debug,xrayops_logtail=debug,xrayops_feed=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // --- Configuration ---
    let config = MonitorConfig::from_env()?;
    tracing::info!(
        api_url = %config.api_url,
        ws_url = %config.ws_url,
        reconnect_secs = config.reconnect_delay.as_secs(),
        "Loaded monitor configuration",
    );

    // --- Stats feed ---
    let feed = StatsFeedController::with_policy(
        WsFeedClient::new(config.ws_url.as_str()),
        ReconnectPolicy::fixed(config.reconnect_delay),
    );
    let mut feed_events = feed.subscribe();
    feed.connect()?;

    // --- Log tail ---
    let tail = LogTailController::new(HttpLogSource::new(config.api_url.as_str()));
    let mut tail_events = tail.subscribe();
    start_with_backlog(&tail, config.log_lines).await?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            event = tail_events.recv() => match event {
                Ok(TailEvent::Appended(text)) => {
                    stdout.write_all(text.as_bytes())?;
                    stdout.flush()?;
                }
                Ok(TailEvent::StatusChanged(status)) => {
                    tracing::info!(%status, "Log tail status changed");
                }
                Ok(TailEvent::Cleared) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Console fell behind the log tail");
                }
                Err(RecvError::Closed) => break,
            },
            event = feed_events.recv() => match event {
                Ok(FeedEvent::SnapshotUpdated(snapshot)) => {
                    eprintln!("{}", render::snapshot_line(&snapshot));
                }
                Ok(FeedEvent::Connected | FeedEvent::Disconnected { .. }) => {
                    eprintln!("{}", render::health_line(&feed.health()));
                }
                Ok(FeedEvent::Terminated) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Console skipped feed events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    // --- Shutdown ---
    tail.stop();
    feed.disconnect();
    tail.join().await;
    feed.join().await;
    tracing::info!("Controllers stopped");

    if let Some(dir) = &config.export_dir {
        let path = tail.export_file().write_to(dir)?;
        tracing::info!(path = %path.display(), "Exported log buffer");
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
