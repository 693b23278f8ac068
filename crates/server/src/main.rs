use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use reqflow_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig, NotifierConfig};
use reqflow_notify::{NoopSink, NotificationSink, WebhookSink};
use reqflow_server::bootstrap::{bootstrap_with_config, Application};
use reqflow_server::documents::DocumentRenderer;
use reqflow_server::state::AppState;
use reqflow_server::{api, health};

fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match config.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn build_notifier(config: &NotifierConfig) -> anyhow::Result<Arc<dyn NotificationSink>> {
    if config.enabled {
        let sink = WebhookSink::from_config(config).context("notifier configuration")?;
        Ok(Arc::new(sink))
    } else {
        Ok(Arc::new(NoopSink))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config.logging);
    let app = bootstrap_with_config(config).await?;
    run(app).await
}

async fn run(app: Application) -> anyhow::Result<()> {
    let Application { config, db_pool } = app;

    let health_handle = health::spawn(&config.server, db_pool.clone())
        .await
        .context("binding health listener")?;

    let notifier = build_notifier(&config.notifier)?;
    let documents = Arc::new(DocumentRenderer::new().context("loading document templates")?);
    let state = AppState::from_pool(db_pool, notifier, documents)
        .await
        .context("loading approval chain policy")?;
    let router = api::router(state);

    let address = format!("{}:{}", config.server.bind_address, config.server.api_port);
    let listener =
        tokio::net::TcpListener::bind(&address).await.context("binding api listener")?;
    info!(event_name = "system.server.started", %address, "api listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::signal::ctrl_c().await.context("listening for shutdown signal")?;
    info!(
        event_name = "system.server.stopping",
        drain_timeout_secs = config.server.graceful_shutdown_secs,
        "shutdown signal received, draining in-flight requests"
    );
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(
        Duration::from_secs(config.server.graceful_shutdown_secs.max(1)),
        server,
    )
    .await
    {
        Ok(joined) => joined.context("api task panicked")?.context("api listener failed")?,
        Err(_) => {
            warn!(
                event_name = "system.server.drain_timeout",
                "in-flight requests did not finish before the deadline"
            );
        }
    }

    health_handle.abort();
    info!(event_name = "system.server.stopped", "shutdown complete");
    Ok(())
}
