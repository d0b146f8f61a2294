//! AWS IoT device runtime.
//!
//! Connects to AWS IoT Core with the thing's certificate, subscribes to a
//! topic, greets on it, and keeps the device shadow in sync until shut down.

use tracing_subscriber::EnvFilter;

use awsiot_device::config::DeviceConfig;
use awsiot_device::mqtt_loop;
use awsiot_device::shadow_sync::{MessageCounter, ShadowReporter};
use awsiot_mqtt::{AwsIotClient, RumqttTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "awsiot-device starting");

    // ── Load config ─────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/awsiot/device.toml".to_string());

    let config = DeviceConfig::from_file(&config_path)?;
    tracing::info!(
        client_id = %config.mqtt.client_id,
        broker = %config.mqtt.broker_host,
        topic = %config.topic,
        "config loaded"
    );

    // ── MQTT client ─────────────────────────────────────────────
    if !config.mqtt.use_tls {
        tracing::info!("MQTT plaintext mode (no TLS)");
    }
    let transport = RumqttTransport::from_config(&config.mqtt)?;
    let mut client = AwsIotClient::new(transport, config.mqtt.keepalive_secs)?;

    let messages = MessageCounter::default();
    mqtt_loop::install_handlers(&mut client, &config, messages.clone())?;

    client.connect(config.mqtt.clean_session).await?;

    if config.shadow_get_on_connect {
        mqtt_loop::sync_shadow(&mut client).await?;
    }

    let reporter = config
        .shadow_report_interval()
        .map(|interval| ShadowReporter::new(interval, messages));

    tracing::info!("awsiot-device ready");

    // ── Run until the broker drops us or SIGINT arrives ─────────
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    mqtt_loop::run(&mut client, &config, reporter, shutdown).await?;

    tracing::info!("awsiot-device stopped");
    Ok(())
}
