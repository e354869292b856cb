use std::env;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::mpsc;
use tracing::{info, warn};

use device_monitor::{ChangeEvent, MonitorRegistry};
use monitor_app::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = parse_config_arg();
    let config = AppConfig::load_with_path(config_path).context("load config failed")?;
    config.validate().context("config validation failed")?;

    if let Some(listen) = config.metrics_listen {
        PrometheusBuilder::new()
            .with_http_listener(listen)
            .install()
            .context("metrics exporter init failed")?;
        info!(%listen, "metrics exporter listening");
    }

    if config.devices.is_empty() {
        warn!("no devices configured");
    }

    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let registry = MonitorRegistry::new(tx);

    for device in &config.devices {
        let device_id = device.device_id.clone();
        let interval_ms = device.poll_interval_ms;
        registry
            .register(device.clone())
            .with_context(|| format!("register device {device_id}"))?;
        registry
            .schedule(&device_id, interval_ms)
            .with_context(|| format!("schedule device {device_id}"))?;
    }

    let listener = tokio::spawn(change_listener(rx));

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    info!("shutdown signal received");

    registry.shutdown().await;
    drop(registry);
    let _ = listener.await;

    Ok(())
}

/// Stands in for the push-update collaborator: consumes change events and
/// logs them. Delivery is best-effort; a full channel drops events at the
/// sender.
async fn change_listener(mut rx: mpsc::Receiver<ChangeEvent>) {
    while let Some(event) = rx.recv().await {
        info!(
            device = %event.device_id,
            changed = ?event.changed,
            collected_at_ms = event.snapshot.collected_at_ms,
            "parameters changed"
        );
    }
}

fn parse_config_arg() -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}
