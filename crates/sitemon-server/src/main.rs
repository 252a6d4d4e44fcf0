use anyhow::Result;
use sitemon_notify::channels::email::EmailChannel;
use sitemon_notify::AlertSink;
use sitemon_server::config::ServerConfig;
use sitemon_server::engine::Engine;
use sitemon_server::sched::archive::ArchiveScheduler;
use sitemon_server::sched::cert::CertScheduler;
use sitemon_server::sched::reach::ReachScheduler;
use sitemon_storage::Store;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install default CryptoProvider: {e:?}"))?;

    sitemon_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sitemon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("config/server.toml");
    let config = ServerConfig::load(config_path)?;

    let store = Arc::new(Store::open(
        Path::new(&config.data_dir),
        config.retention_days,
    )?);

    let sink: Option<Arc<dyn AlertSink>> = if config.smtp.enabled {
        let channel = EmailChannel::new(
            &config.smtp.host,
            config.smtp.port,
            config.smtp.username.as_deref(),
            config.smtp.password.as_deref(),
            &config.smtp.from,
        )
        .map_err(|e| anyhow::anyhow!("Failed to build SMTP channel: {e}"))?;
        Some(Arc::new(channel))
    } else {
        None
    };

    let engine = Arc::new(Engine::new(
        store.clone(),
        sink.clone(),
        config.reach_check.policy(),
        config.cert_check.connect_timeout_secs,
        config.cert_check.alert_threshold_days,
    ));

    let mut tasks = Vec::new();

    if config.reach_check.enabled {
        let scheduler = ReachScheduler::new(
            engine.clone(),
            config.reach_check.tick_secs,
            config.reach_check.max_concurrent,
        );
        tasks.push(tokio::spawn(async move { scheduler.run().await }));
    }

    if config.cert_check.enabled {
        let scheduler = CertScheduler::new(
            engine.clone(),
            config.cert_check.tick_secs,
            config.cert_check.max_concurrent,
        );
        tasks.push(tokio::spawn(async move { scheduler.run().await }));
    }

    if config.archive.enabled {
        match (sink.clone(), config.archive.recipient.clone()) {
            (Some(sink), Some(recipient)) => {
                let scheduler =
                    ArchiveScheduler::new(store.clone(), sink, recipient, config.archive.tick_secs);
                tasks.push(tokio::spawn(async move { scheduler.run().await }));
            }
            _ => {
                tracing::warn!(
                    "Archive enabled but SMTP sink or recipient missing, archive disabled"
                );
            }
        }
    }

    tracing::info!(config = %config_path, data_dir = %config.data_dir, "sitemon server started");

    signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping schedulers");
    for task in tasks {
        task.abort();
    }

    Ok(())
}
