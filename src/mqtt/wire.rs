//! Wire record consumed by the motor MCU bridge.

use serde::{Deserialize, Serialize};

use crate::mixer::DriveCommand;

/// Propeller command as it travels over the command topic.
///
/// The field set and the signed/unsigned split are fixed by the existing
/// consumer: forward and reverse magnitudes are folded into one signed
/// value per side, enables travel as 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropellerCmd {
    pub left_pwm: i16,
    pub right_pwm: i16,
    pub left_enable: u8,
    pub right_enable: u8,
}

impl From<&DriveCommand> for PropellerCmd {
    fn from(cmd: &DriveCommand) -> Self {
        Self {
            left_pwm: cmd.left_pwm(),
            right_pwm: cmd.right_pwm(),
            left_enable: cmd.left_enable as u8,
            right_enable: cmd.right_enable as u8,
        }
    }
}

impl PropellerCmd {
    /// JSON payload for the command topic.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
