//! MQTT transport toward the motor controller.
//!
//! The vehicle side subscribes to two topics:
//!
//! ```text
//! mqtt/
//! ├── wire.rs       - PropellerCmd wire record (field set fixed by the MCU)
//! └── publisher.rs  - rumqttc client, command loop and session flag
//! ```
//!
//! Publishing is fire-and-forget at QoS 0: the drive is commanded by the
//! most recent sample, so a dropped command is superseded by the next one
//! and nothing is retried or buffered. The one exception in spirit is the
//! session flag, published once at startup and once at shutdown.

pub mod publisher;
pub mod wire;

pub use publisher::{MqttError, MqttPublisher};
pub use wire::PropellerCmd;
