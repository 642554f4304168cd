pub mod bridge;
pub mod config;
pub mod controller;
pub mod mixer;
pub mod mqtt;

use crate::bridge::TeleopBridge;
use crate::config::AppConfig;
use crate::controller::collector::{CollectorHandle, CollectorSettings};
use crate::mixer::DriveCommand;
use crate::mqtt::publisher::MqttPublisher;
use crate::mqtt::wire::PropellerCmd;
use color_eyre::{eyre::eyre, Result};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = AppConfig::load_or_default()?;
    let drive_mixer = config.mixer()?;
    info!(
        "Drive mixer configured: travel radius {}, pwm ceiling {}",
        drive_mixer.max_travel_radius(),
        drive_mixer.pwm_max()
    );

    let (knob_tx, knob_rx) = mpsc::channel(100);
    let (command_tx, command_rx) = mpsc::channel(100);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let _collector_handle = CollectorHandle::spawn(
        Some(CollectorSettings {
            deadzone: config.input.deadzone,
        }),
        knob_tx,
        shutdown_rx.clone(),
    )
    .map_err(|e| eyre!("Failed to spawn knob collector: {}", e))?;

    let (publisher, connection) = MqttPublisher::connect(&config.mqtt)?;
    let _connection_driver = MqttPublisher::spawn_connection_driver(connection, shutdown_rx);

    publisher.publish_session(true)?;
    info!("Session flag set, remote controller active");

    let _bridge_handle = tokio::spawn(TeleopBridge::new(drive_mixer, knob_rx, command_tx).run());

    let loop_publisher = publisher.clone();
    let _publisher_handle = tokio::spawn(loop_publisher.run_publish_loop(command_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down: neutralizing drive and clearing session flag");

    if let Err(e) = publisher.publish_command(&PropellerCmd::from(&DriveCommand::neutral())) {
        warn!("Failed to publish neutral command on shutdown: {}", e);
    }
    if let Err(e) = publisher.publish_session(false) {
        warn!("Failed to clear session flag: {}", e);
    }

    // Stop the blocking loops so the runtime can drop without waiting on
    // them; the disconnect queues behind the publishes above, which also
    // wakes the connection driver
    if shutdown_tx.send(true).is_err() {
        warn!("All shutdown receivers already gone");
    }
    if let Err(e) = publisher.disconnect() {
        warn!("MQTT disconnect failed: {}", e);
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
