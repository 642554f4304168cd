use chrono::{DateTime, Local};
use gilrs::{Axis, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Knob event emitted toward the bridge.
///
/// `Moved` carries the stick position on the unit square with `y` positive
/// forward; scaling into travel-radius units is the bridge's job. `Released`
/// is edge-triggered: it fires once when the stick returns to center after a
/// deflection, never repeatedly while the stick rests.
#[derive(Debug, Clone)]
pub enum KnobEvent {
    Moved {
        x: f32,
        y: f32,
        timestamp: DateTime<Local>,
    },
    Released {
        timestamp: DateTime<Local>,
    },
}

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub deadzone: f32,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self { deadzone: 0.05 }
    }
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send knob event: {0}")]
    EventSendError(String),
}

// Collector states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct KnobCollector<S: CollectionState> {
    // Gilrs context
    gilrs: Gilrs,

    // Active gamepad
    active_gamepad: Option<GamepadId>,

    // Collector settings
    settings: CollectorSettings,

    // Channel toward the bridge
    event_sender: mpsc::Sender<KnobEvent>,

    // Flipped by main on shutdown so the blocking loop can return
    shutdown_rx: watch::Receiver<bool>,

    // Last stick position after deadzone
    stick_x: f32,
    stick_y: f32,

    // Whether the knob is currently away from center
    deflected: bool,
}

impl KnobCollector<Initializing> {
    pub fn create(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<KnobEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating knob collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(
            gilrs,
            None,
            settings,
            event_sender,
            shutdown_rx,
            0.0, // stick_x
            0.0, // stick_y
            false,
        ))
    }

    // Select a gamepad and transition to Collecting state
    pub fn initialize(mut self) -> Result<KnobCollector<Collecting>, CollectorError> {
        info!(
            "Initializing knob collector with deadzone: {}",
            self.settings.deadzone
        );

        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, continuing in idle mode");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
            let (id, gamepad) = &gamepads[0];
            self.active_gamepad = Some(*id);
            info!("Selected gamepad: {} ({})", gamepad.name(), id);
        }

        info!("Knob collector initialized, transitioning to Collecting state");
        Ok(self.transition())
    }
}

impl KnobCollector<Collecting> {
    // Pull one gilrs event and translate it to at most one knob event
    pub fn collect_next_event(&mut self) -> Result<(), CollectorError> {
        if let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            if let Some(active_id) = self.active_gamepad {
                if id != active_id {
                    debug!("Skipping event from non-active gamepad: {:?}", id);
                    return Ok(());
                }
            }

            if let Some(knob_event) = self.convert_gilrs_event(event) {
                debug!("Captured knob event: {:?}", knob_event);
                forward_event(&self.event_sender, knob_event)?;
            }
        }

        Ok(())
    }

    // Run the collector loop; non-blocking polls with a short sleep
    pub fn run_collection_loop(&mut self) -> Result<(), CollectorError> {
        info!("Starting knob collector loop");

        loop {
            if *self.shutdown_rx.borrow() {
                info!("Shutdown requested, stopping knob collector");
                return Ok(());
            }

            if let Err(e) = self.collect_next_event() {
                // Only a closed channel reaches here; the bridge is gone
                error!("Stopping knob collector: {}", e);
                return Err(e);
            }

            std::thread::sleep(std::time::Duration::from_micros(100));
        }
    }

    fn convert_gilrs_event(&mut self, event: EventType) -> Option<KnobEvent> {
        let now = Local::now();

        match event {
            EventType::AxisChanged(axis, value, _) => {
                let value = apply_deadzone(value, self.settings.deadzone);
                match axis {
                    Axis::LeftStickX => self.stick_x = value,
                    Axis::LeftStickY => self.stick_y = value,
                    _ => {
                        debug!("Ignoring unmapped axis: {:?}", axis);
                        return None;
                    }
                }
                self.knob_edge(now)
            }
            EventType::Connected => {
                info!("Gamepad connected");
                None
            }
            EventType::Disconnected => {
                // Failsafe: a vanished gamepad must not leave the drive running
                warn!("Gamepad disconnected, forcing knob release");
                self.stick_x = 0.0;
                self.stick_y = 0.0;
                self.knob_edge(now)
            }
            _ => {
                debug!("Unhandled event type: {:?}", event);
                None
            }
        }
    }

    fn knob_edge(&mut self, timestamp: DateTime<Local>) -> Option<KnobEvent> {
        knob_transition(&mut self.deflected, self.stick_x, self.stick_y, timestamp)
    }
}

// Decide between a movement sample, a release edge, and idle jitter.
// `deflected` makes the release edge-triggered: re-centering after a
// deflection emits exactly one Released, resting at center emits nothing.
fn knob_transition(
    deflected: &mut bool,
    x: f32,
    y: f32,
    timestamp: DateTime<Local>,
) -> Option<KnobEvent> {
    let centered = x == 0.0 && y == 0.0;

    if centered {
        if *deflected {
            *deflected = false;
            info!("Knob released at {}", timestamp.format("%H:%M:%S.%3f"));
            Some(KnobEvent::Released { timestamp })
        } else {
            None
        }
    } else {
        *deflected = true;
        Some(KnobEvent::Moved { x, y, timestamp })
    }
}

// A full channel drops the sample, the next one supersedes it anyway; a
// closed channel means the bridge is gone and the collector must stop.
fn forward_event(
    sender: &mpsc::Sender<KnobEvent>,
    event: KnobEvent,
) -> Result<(), CollectorError> {
    match sender.try_send(event) {
        Ok(_) => Ok(()),
        Err(TrySendError::Full(event)) => {
            debug!("Knob channel full, dropping sample: {:?}", event);
            Ok(())
        }
        Err(e @ TrySendError::Closed(_)) => {
            error!("Failed to send knob event to bridge: {}", e);
            Err(CollectorError::EventSendError(e.to_string()))
        }
    }
}

// Public interface for spawning and running the collector
pub struct CollectorHandle {
    event_sender: mpsc::Sender<KnobEvent>,
}

impl CollectorHandle {
    // Create a new collector and spawn it as a tokio task
    pub fn spawn(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<KnobEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self, CollectorError> {
        info!("Spawning knob collector with settings: {:?}", settings);

        let sender_clone = event_sender.clone();

        let collector = KnobCollector::create(settings, event_sender, shutdown_rx)?;

        let task_handle = tokio::task::spawn_blocking(move || match collector.initialize() {
            Ok(mut collecting_state) => {
                if let Err(e) = collecting_state.run_collection_loop() {
                    error!("Collector task terminated with error: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to initialize knob collector: {}", e);
            }
        });

        debug!("Collector task spawned with handle: {:?}", task_handle);

        Ok(Self {
            event_sender: sender_clone,
        })
    }

    // Get a sender for knob events
    pub fn event_sender(&self) -> mpsc::Sender<KnobEvent> {
        self.event_sender.clone()
    }
}

// Rescale an axis value so the active range starts at the deadzone edge
fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        value.signum() * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}
