//! Gamepad input for the virtual drive knob.
//!
//! The left analog stick plays the role of a spring-loaded joystick knob:
//! deflecting it produces a stream of displacement samples, letting it snap
//! back to center produces exactly one release event.
//!
//! ```text
//! Gamepad ──► KnobCollector ──► KnobEvent channel ──► TeleopBridge
//!             (deadzone, release edge)
//! ```
//!
//! The collector runs in its own task and performs no mixing itself; it only
//! decides what counts as "moved" and "released".

pub mod collector;

pub use collector::{CollectorError, CollectorHandle, CollectorSettings, KnobEvent};
