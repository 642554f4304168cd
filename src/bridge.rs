//! Wiring between the knob collector and the MQTT publisher.
//!
//! The bridge owns the only piece of session state the mixing path needs:
//! whether the knob is currently held. The mixer itself stays a pure
//! function pair, which keeps it unit-testable without any input harness.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::controller::collector::KnobEvent;
use crate::mixer::{DriveCommand, DriveMixer};
use crate::mqtt::wire::PropellerCmd;

pub struct TeleopBridge {
    mixer: DriveMixer,
    knob_rx: mpsc::Receiver<KnobEvent>,
    command_tx: mpsc::Sender<PropellerCmd>,
    active: bool,
}

impl TeleopBridge {
    pub fn new(
        mixer: DriveMixer,
        knob_rx: mpsc::Receiver<KnobEvent>,
        command_tx: mpsc::Sender<PropellerCmd>,
    ) -> Self {
        Self {
            mixer,
            knob_rx,
            command_tx,
            active: false,
        }
    }

    /// Consumes knob events until the collector side closes the channel.
    ///
    /// Only the most recent queued event matters: stale displacement samples
    /// describe positions the knob has already left, so the queue is drained
    /// before mixing.
    pub async fn run(mut self) {
        info!(
            "Teleop bridge started (radius {}, pwm ceiling {})",
            self.mixer.max_travel_radius(),
            self.mixer.pwm_max()
        );

        while let Some(event) = self.knob_rx.recv().await {
            let event = self.drain_to_latest(event);
            match event {
                KnobEvent::Moved { x, y, .. } => {
                    let radius = self.mixer.max_travel_radius();
                    let cmd = self.mixer.mix(f64::from(x) * radius, f64::from(y) * radius);
                    self.active = true;
                    self.forward(PropellerCmd::from(&cmd));
                }
                KnobEvent::Released { .. } => {
                    if self.active {
                        self.active = false;
                        self.forward(PropellerCmd::from(&DriveCommand::neutral()));
                    } else {
                        debug!("Release without prior deflection, nothing to neutralize");
                    }
                }
            }
        }

        info!("Knob channel closed, teleop bridge ending");
    }

    fn drain_to_latest(&mut self, first: KnobEvent) -> KnobEvent {
        let mut latest = first;
        while let Ok(next) = self.knob_rx.try_recv() {
            latest = next;
        }
        latest
    }

    fn forward(&self, cmd: PropellerCmd) {
        debug!("Forwarding command: {:?}", cmd);
        if let Err(e) = self.command_tx.try_send(cmd) {
            warn!("Command channel full, dropping sample: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn harness() -> (
        mpsc::Sender<KnobEvent>,
        mpsc::Receiver<PropellerCmd>,
        tokio::task::JoinHandle<()>,
    ) {
        let mixer = DriveMixer::new(130.0, 230).unwrap();
        let (knob_tx, knob_rx) = mpsc::channel(16);
        let (command_tx, command_rx) = mpsc::channel(16);
        let handle = tokio::spawn(TeleopBridge::new(mixer, knob_rx, command_tx).run());
        (knob_tx, command_rx, handle)
    }

    #[tokio::test]
    async fn full_forward_stick_reaches_the_wire_at_ceiling() {
        let (knob_tx, mut command_rx, _handle) = harness();

        knob_tx
            .send(KnobEvent::Moved {
                x: 0.0,
                y: 1.0,
                timestamp: Local::now(),
            })
            .await
            .unwrap();

        let cmd = command_rx.recv().await.unwrap();
        assert_eq!(cmd.left_pwm, 230);
        assert_eq!(cmd.right_pwm, 230);
        assert_eq!((cmd.left_enable, cmd.right_enable), (1, 1));
    }

    #[tokio::test]
    async fn release_after_movement_sends_exactly_neutral() {
        let (knob_tx, mut command_rx, _handle) = harness();

        knob_tx
            .send(KnobEvent::Moved {
                x: 0.7,
                y: -0.2,
                timestamp: Local::now(),
            })
            .await
            .unwrap();
        let _moving = command_rx.recv().await.unwrap();

        knob_tx
            .send(KnobEvent::Released {
                timestamp: Local::now(),
            })
            .await
            .unwrap();

        let cmd = command_rx.recv().await.unwrap();
        assert_eq!(
            cmd,
            PropellerCmd {
                left_pwm: 0,
                right_pwm: 0,
                left_enable: 0,
                right_enable: 0,
            }
        );
    }

    #[tokio::test]
    async fn bridge_ends_when_collector_side_closes() {
        let (knob_tx, mut command_rx, handle) = harness();

        drop(knob_tx);
        handle.await.unwrap();
        assert!(command_rx.recv().await.is_none());
    }
}
