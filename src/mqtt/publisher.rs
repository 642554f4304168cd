use std::time::Duration;

use rumqttc::{Client, Connection, MqttOptions, QoS};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MqttSettings;
use crate::mqtt::wire::PropellerCmd;

#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("Invalid broker address '{0}': expected host or host:port")]
    InvalidAddress(String),

    #[error("Publish failed: {0}")]
    PublishError(#[from] rumqttc::ClientError),

    #[error("Payload encoding failed: {0}")]
    EncodeError(#[from] serde_json::Error),
}

/// Thin publisher over a shared rumqttc client.
///
/// Cloneable so the command loop and the shutdown path can publish through
/// the same connection.
#[derive(Clone)]
pub struct MqttPublisher {
    client: Client,
    settings: MqttSettings,
}

impl MqttPublisher {
    /// Builds the client and returns it together with the connection that
    /// must be driven by [`MqttPublisher::spawn_connection_driver`].
    pub fn connect(settings: &MqttSettings) -> Result<(Self, Connection), MqttError> {
        let server_comps: Vec<&str> = settings.server.split(':').collect();
        let host = server_comps
            .first()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MqttError::InvalidAddress(settings.server.clone()))?;
        let port: u16 = match server_comps.get(1) {
            Some(p) => p
                .parse()
                .map_err(|_| MqttError::InvalidAddress(settings.server.clone()))?,
            None => 1883,
        };

        info!("Connecting MQTT client '{}' to {}:{}", settings.client_id, host, port);
        let mut mqtt_options = MqttOptions::new(settings.client_id.clone(), *host, port);
        mqtt_options.set_keep_alive(Duration::from_secs(5));
        if !settings.user.is_empty() {
            mqtt_options.set_credentials(settings.user.clone(), settings.pw.clone());
        }

        let (client, connection) = Client::new(mqtt_options, 100);

        Ok((
            Self {
                client,
                settings: settings.clone(),
            },
            connection,
        ))
    }

    /// Drives the connection event loop on a blocking thread.
    ///
    /// Connection errors are logged and retried with a short backoff; the
    /// broker going away must not take the controller down with it. The
    /// watch flag is checked on every notification so the thread returns
    /// once main requests shutdown, letting the runtime drop cleanly.
    pub fn spawn_connection_driver(
        mut connection: Connection,
        shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::task::spawn_blocking(move || {
            for notification in connection.iter() {
                if *shutdown_rx.borrow() {
                    info!("Shutdown requested, stopping MQTT connection driver");
                    break;
                }

                match notification {
                    Ok(event) => debug!("MQTT event: {:?}", event),
                    Err(e) => {
                        warn!("MQTT connection error: {}", e);
                        std::thread::sleep(Duration::from_secs(1));
                    }
                }
            }
            info!("MQTT connection loop ended");
        })
    }

    /// Requests a broker disconnect.
    ///
    /// Queued behind any pending publishes, so the final neutral command
    /// and session flag still reach the socket first.
    pub fn disconnect(&self) -> Result<(), MqttError> {
        self.client.try_disconnect()?;
        Ok(())
    }

    /// Publishes one propeller command, QoS 0, no retry.
    pub fn publish_command(&self, cmd: &PropellerCmd) -> Result<(), MqttError> {
        let payload = cmd.to_payload()?;
        self.client.try_publish(
            self.settings.command_topic.as_str(),
            QoS::AtMostOnce,
            false,
            payload,
        )?;
        Ok(())
    }

    /// Publishes the session-active flag, once at startup and once at shutdown.
    pub fn publish_session(&self, active: bool) -> Result<(), MqttError> {
        let payload = if active { "true" } else { "false" };
        self.client.try_publish(
            self.settings.session_topic.as_str(),
            QoS::AtMostOnce,
            false,
            payload,
        )?;
        Ok(())
    }

    /// Forwards commands from the bridge until the channel closes.
    pub async fn run_publish_loop(self, mut command_rx: mpsc::Receiver<PropellerCmd>) {
        info!(
            "MQTT publisher loop started on topic '{}'",
            self.settings.command_topic
        );

        while let Some(cmd) = command_rx.recv().await {
            debug!("Publishing command: {:?}", cmd);
            if let Err(e) = self.publish_command(&cmd) {
                // Dropping is fine, the next sample supersedes this one
                warn!("Dropping command: {}", e);
            }
        }

        info!("Command channel closed, publisher loop ending");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MqttSettings;

    #[test]
    fn rejects_unparseable_broker_port() {
        let settings = MqttSettings {
            server: "broker.local:notaport".to_string(),
            ..MqttSettings::default()
        };
        assert!(matches!(
            MqttPublisher::connect(&settings),
            Err(MqttError::InvalidAddress(_))
        ));
    }

    #[test]
    fn rejects_empty_broker_host() {
        let settings = MqttSettings {
            server: String::new(),
            ..MqttSettings::default()
        };
        assert!(matches!(
            MqttPublisher::connect(&settings),
            Err(MqttError::InvalidAddress(_))
        ));
    }

    #[test]
    fn accepts_host_without_port() {
        let settings = MqttSettings {
            server: "broker.local".to_string(),
            ..MqttSettings::default()
        };
        assert!(MqttPublisher::connect(&settings).is_ok());
    }

    fn broker_less_settings() -> MqttSettings {
        // Port 1 refuses immediately, so the driver sees a notification
        // right away without any broker running
        MqttSettings {
            server: "127.0.0.1:1".to_string(),
            ..MqttSettings::default()
        }
    }

    #[tokio::test]
    async fn connection_driver_stops_on_shutdown_signal() {
        let (_publisher, connection) = MqttPublisher::connect(&broker_less_settings()).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        let handle = MqttPublisher::spawn_connection_driver(connection, shutdown_rx);
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("connection driver kept running after shutdown signal")
            .unwrap();
    }

    #[tokio::test]
    async fn publish_loop_ends_when_command_channel_closes() {
        let (publisher, connection) = MqttPublisher::connect(&broker_less_settings()).unwrap();
        let (command_tx, command_rx) = mpsc::channel(1);
        drop(command_tx);

        tokio::time::timeout(Duration::from_secs(10), publisher.run_publish_loop(command_rx))
            .await
            .expect("publish loop kept running after channel close");

        // Connection owns a tokio Runtime, which must not be dropped from
        // within an async context
        tokio::task::spawn_blocking(move || drop(connection))
            .await
            .unwrap();
    }
}
