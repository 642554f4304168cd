//! Drive mixing for a two-propeller differential-drive vehicle.
//!
//! Converts a single 2D knob displacement into independent forward/reverse
//! pulse widths for the left and right propellers (skid-steer mixing). The
//! mixer is a pure transform: it holds no state between samples and performs
//! no I/O, so it can be called from any task at whatever rate the input
//! device produces samples.

pub mod drive;
pub mod error;

pub use drive::{DriveCommand, DriveMixer};
pub use error::MixerError;
