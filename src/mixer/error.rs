//! Error definitions for the drive mixer.

use thiserror::Error;

/// Configuration errors raised when constructing a [`crate::mixer::DriveMixer`].
///
/// The mixing transform itself has no failure modes; everything that can go
/// wrong is rejected once, at configuration time.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MixerError {
    /// The pulse-width ceiling must fit a signed 16-bit wire field.
    #[error("Pwm ceiling out of range (expected 1..=32767): {0}")]
    PwmCeilingOutOfRange(u16),

    /// The travel radius must be a positive, finite distance.
    #[error("Invalid travel radius: {0}")]
    InvalidTravelRadius(f64),
}
