use pontual_device::kernel::cancel::ShutdownSignal;
use pontual_device::kernel::sampler::{random_device_id, ThreadRandom};
use pontual_device::services::mqtt::MqttConnector;
use pontual_device::{DeviceConfig, SimulatedDevice};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = DeviceConfig::from_env();
    let device_id = config
        .device_id
        .clone()
        .unwrap_or_else(|| random_device_id(&mut ThreadRandom::new()));
    let mut device = SimulatedDevice::from_config(device_id, &config, MqttConnector::new());
    device.announce();

    let signal = ShutdownSignal::new();
    signal.install_ctrl_c();
    let cancel = signal.token();

    if let Err(e) = device.connect().await {
        tracing::error!("Could not connect to the MQTT broker");
        return Err(e.into());
    }

    // Give the session a moment to settle before the first scan.
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(config.startup_delay()) => {}
    }

    if signal.is_triggered() {
        tracing::info!("Interrupted before the first scan");
    } else {
        device.run_simulation(&cancel).await;
    }

    tracing::info!("Shutting down device...");
    device.shutdown().await;
    tracing::info!("Device disconnected cleanly");
    Ok(())
}
