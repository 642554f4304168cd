//! Quadrant-based polar decomposition of a knob displacement into per-side
//! pulse widths.
//!
//! The displacement `(dx, dy)` is taken relative to the knob's neutral
//! center, with `dy` positive pointing forward. Overall throttle comes from
//! the squared distance ratio, steering from the polar angle: within each
//! quadrant the outer propeller holds the full throttle magnitude while the
//! inner one scales with the angle toward zero, which approximates a pivot
//! as the knob approaches the pure-sideways direction.

use std::f64::consts::PI;

use crate::mixer::error::MixerError;

/// One mixed command for the two propellers.
///
/// Per side, `forward` and `reverse` are mutually exclusive; the signed
/// accessors fold each pair into the single wire value the motor MCU expects.
/// Enable flags are `true` for every command derived from an active input
/// sample, including a centered-but-pressed sample, and `false` only for
/// [`DriveCommand::neutral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriveCommand {
    pub left_forward: u16,
    pub left_reverse: u16,
    pub right_forward: u16,
    pub right_reverse: u16,
    pub left_enable: bool,
    pub right_enable: bool,
}

impl DriveCommand {
    /// The command the drive must return to when the input is released:
    /// all channels zero, both sides disabled. Sent exactly once per
    /// release, with no decay.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Signed left pulse width, forward positive.
    pub fn left_pwm(&self) -> i16 {
        self.left_forward as i16 - self.left_reverse as i16
    }

    /// Signed right pulse width, forward positive.
    pub fn right_pwm(&self) -> i16 {
        self.right_forward as i16 - self.right_reverse as i16
    }
}

/// Sign quadrant of a displacement.
///
/// Axis samples (`dx == 0` or `dy == 0`) satisfy two adjoining conditions;
/// membership is resolved by match order, and the adjoining formulas agree
/// in magnitude at every boundary, so the overlap causes no discontinuity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quadrant {
    /// `dx <= 0, dy >= 0`: veering forward-left, right propeller outside.
    ForwardLeft,
    /// `dx >= 0, dy >= 0`: veering forward-right, left propeller outside.
    ForwardRight,
    /// `dx >= 0, dy <= 0`: backing toward the right.
    ReverseRight,
    /// `dx <= 0, dy <= 0`: backing toward the left.
    ReverseLeft,
}

impl Quadrant {
    fn from_signs(dx: f64, dy: f64) -> Self {
        if dx <= 0.0 && dy >= 0.0 {
            Quadrant::ForwardLeft
        } else if dx >= 0.0 && dy >= 0.0 {
            Quadrant::ForwardRight
        } else if dx >= 0.0 && dy <= 0.0 {
            Quadrant::ReverseRight
        } else {
            Quadrant::ReverseLeft
        }
    }

    /// Per-quadrant channel ratios, each in `[0, 1]`.
    ///
    /// Returns `(left_ratio, right_ratio, reverse)`. The angle is remapped so
    /// that it sweeps `0..=PI/2` from the pure-sideways direction of the
    /// quadrant to its straight axis, making `angle / PI * 2` the inner
    /// propeller's share.
    fn ratios(self, dist_ratio: f64, angle: f64) -> (f64, f64, bool) {
        match self {
            Quadrant::ForwardLeft => {
                let swept = PI - angle;
                (dist_ratio * swept / PI * 2.0, dist_ratio, false)
            }
            Quadrant::ForwardRight => (dist_ratio, dist_ratio * angle / PI * 2.0, false),
            Quadrant::ReverseRight => (dist_ratio, dist_ratio * angle.abs() / PI * 2.0, true),
            Quadrant::ReverseLeft => {
                let swept = PI - angle.abs();
                (dist_ratio * swept / PI * 2.0, dist_ratio, true)
            }
        }
    }
}

/// Stateless displacement-to-command transform.
///
/// Validated once at construction; [`DriveMixer::mix`] afterwards has no
/// failure path for any real input, including `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveMixer {
    max_travel_radius: f64,
    pwm_max: u16,
}

impl DriveMixer {
    /// Creates a mixer for the given travel radius and pulse-width ceiling.
    ///
    /// The radius is the displacement magnitude, in input units, at which
    /// the output saturates. The ceiling must fit the signed 16-bit wire
    /// field after the forward/reverse fold.
    pub fn new(max_travel_radius: f64, pwm_max: u16) -> Result<Self, MixerError> {
        if pwm_max == 0 || pwm_max > i16::MAX as u16 {
            return Err(MixerError::PwmCeilingOutOfRange(pwm_max));
        }
        if !max_travel_radius.is_finite() || max_travel_radius <= 0.0 {
            return Err(MixerError::InvalidTravelRadius(max_travel_radius));
        }

        Ok(Self {
            max_travel_radius,
            pwm_max,
        })
    }

    pub fn max_travel_radius(&self) -> f64 {
        self.max_travel_radius
    }

    pub fn pwm_max(&self) -> u16 {
        self.pwm_max
    }

    /// Mixes one displacement sample into a drive command.
    ///
    /// Throttle is the squared distance ratio, clamped at the travel radius
    /// (saturation, not an error), steering comes from the quadrant dispatch
    /// above. Channel ratios are scaled by the ceiling and truncated toward
    /// zero. Both enables are `true` on this path regardless of magnitude.
    pub fn mix(&self, dx: f64, dy: f64) -> DriveCommand {
        let max_dist = self.max_travel_radius * self.max_travel_radius;
        let mut dist = dx * dx + dy * dy;
        if dist > max_dist {
            dist = max_dist;
        }
        let dist_ratio = dist / max_dist;
        let angle = dy.atan2(dx);

        let (left_ratio, right_ratio, reverse) =
            Quadrant::from_signs(dx, dy).ratios(dist_ratio, angle);
        let left = self.scale(left_ratio);
        let right = self.scale(right_ratio);

        let mut command = DriveCommand {
            left_enable: true,
            right_enable: true,
            ..DriveCommand::default()
        };
        if reverse {
            command.left_reverse = left;
            command.right_reverse = right;
        } else {
            command.left_forward = left;
            command.right_forward = right;
        }
        command
    }

    fn scale(&self, ratio: f64) -> u16 {
        (self.pwm_max as f64 * ratio) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADIUS: f64 = 130.0;
    const PWM_MAX: u16 = 230;

    fn mixer() -> DriveMixer {
        DriveMixer::new(RADIUS, PWM_MAX).unwrap()
    }

    fn assert_exclusive(cmd: &DriveCommand) {
        assert!(
            cmd.left_forward == 0 || cmd.left_reverse == 0,
            "left forward and reverse both nonzero: {:?}",
            cmd
        );
        assert!(
            cmd.right_forward == 0 || cmd.right_reverse == 0,
            "right forward and reverse both nonzero: {:?}",
            cmd
        );
    }

    #[test]
    fn rejects_zero_pwm_ceiling() {
        assert_eq!(
            DriveMixer::new(RADIUS, 0),
            Err(MixerError::PwmCeilingOutOfRange(0))
        );
    }

    #[test]
    fn rejects_ceiling_beyond_wire_range() {
        assert_eq!(
            DriveMixer::new(RADIUS, 40_000),
            Err(MixerError::PwmCeilingOutOfRange(40_000))
        );
    }

    #[test]
    fn rejects_bad_radius() {
        assert_eq!(
            DriveMixer::new(0.0, PWM_MAX),
            Err(MixerError::InvalidTravelRadius(0.0))
        );
        assert_eq!(
            DriveMixer::new(-5.0, PWM_MAX),
            Err(MixerError::InvalidTravelRadius(-5.0))
        );
        assert!(DriveMixer::new(f64::NAN, PWM_MAX).is_err());
        assert!(DriveMixer::new(f64::INFINITY, PWM_MAX).is_err());
    }

    #[test]
    fn centered_sample_is_pressed_not_neutral() {
        let cmd = mixer().mix(0.0, 0.0);
        assert_eq!((cmd.left_pwm(), cmd.right_pwm()), (0, 0));
        assert!(cmd.left_enable);
        assert!(cmd.right_enable);
    }

    #[test]
    fn neutral_is_fully_disabled() {
        let cmd = DriveCommand::neutral();
        assert_eq!(cmd.left_forward, 0);
        assert_eq!(cmd.left_reverse, 0);
        assert_eq!(cmd.right_forward, 0);
        assert_eq!(cmd.right_reverse, 0);
        assert!(!cmd.left_enable);
        assert!(!cmd.right_enable);
    }

    #[test]
    fn full_forward_drives_both_sides_at_ceiling() {
        let cmd = mixer().mix(0.0, RADIUS);
        assert_eq!(cmd.left_pwm(), 230);
        assert_eq!(cmd.right_pwm(), 230);
        assert!(cmd.left_enable);
        assert!(cmd.right_enable);
    }

    #[test]
    fn full_right_pivots_on_left_side() {
        let cmd = mixer().mix(RADIUS, 0.0);
        assert_eq!(cmd.left_pwm(), 230);
        assert_eq!(cmd.right_pwm(), 0);
        assert_eq!(cmd.right_reverse, 0);
    }

    #[test]
    fn full_reverse_drives_both_sides_at_negative_ceiling() {
        let cmd = mixer().mix(0.0, -RADIUS);
        assert_eq!(cmd.left_pwm(), -230);
        assert_eq!(cmd.right_pwm(), -230);
        assert!(cmd.left_enable);
        assert!(cmd.right_enable);
    }

    #[test]
    fn saturates_beyond_travel_radius() {
        let m = mixer();
        for r in [RADIUS, 200.0, 5_000.0, 1.0e9] {
            let cmd = m.mix(0.0, r);
            assert_eq!(cmd.left_forward, PWM_MAX, "radius {}", r);
            assert_eq!(cmd.right_forward, PWM_MAX, "radius {}", r);
        }
    }

    #[test]
    fn forward_and_reverse_stay_exclusive_per_side() {
        let m = mixer();
        for i in 0..48 {
            let theta = i as f64 * PI / 24.0;
            for mag in [0.0, 13.0, 65.0, 129.0, 400.0] {
                let cmd = m.mix(mag * theta.cos(), mag * theta.sin());
                assert_exclusive(&cmd);
            }
        }
    }

    #[test]
    fn mirrored_displacement_swaps_sides() {
        let m = mixer();
        for (dx, dy) in [(30.0, 90.0), (90.0, 30.0), (0.0, 70.0), (70.0, 0.0), (65.0, 65.0)] {
            let right_turn = m.mix(dx, dy);
            let left_turn = m.mix(-dx, dy);
            assert_eq!(right_turn.left_forward, left_turn.right_forward);
            assert_eq!(right_turn.right_forward, left_turn.left_forward);
            assert_eq!(right_turn.left_reverse, left_turn.right_reverse);
            assert_eq!(right_turn.right_reverse, left_turn.left_reverse);
        }
    }

    #[test]
    fn axis_boundary_agrees_between_forward_quadrants() {
        // dx == 0 matches both forward quadrants; both formulas collapse to
        // a symmetric full-throttle-share command there.
        let m = mixer();
        for dy in [10.0, 65.0, 130.0] {
            let cmd = m.mix(0.0, dy);
            assert_eq!(cmd.left_forward, cmd.right_forward);
            assert_eq!(cmd.left_reverse, 0);
            assert_eq!(cmd.right_reverse, 0);
        }
        for dy in [-10.0, -65.0, -130.0] {
            let cmd = m.mix(0.0, dy);
            assert_eq!(cmd.left_reverse, cmd.right_reverse);
            assert_eq!(cmd.left_forward, 0);
        }
    }

    #[test]
    fn horizontal_axis_resolves_to_forward_branch() {
        // dy == 0 also satisfies a reverse quadrant; dispatch order keeps
        // the forward interpretation, matching the motor MCU's expectation
        // that a pure-sideways knob pivots forward, not backward.
        let m = mixer();
        let right = m.mix(100.0, 0.0);
        assert!(right.left_forward > 0);
        assert_eq!(right.left_reverse, 0);
        assert_eq!(right.right_pwm(), 0);

        let left = m.mix(-100.0, 0.0);
        assert!(left.right_forward > 0);
        assert_eq!(left.right_reverse, 0);
        assert_eq!(left.left_pwm(), 0);
    }

    #[test]
    fn throttle_is_monotonic_along_fixed_angle() {
        let m = mixer();
        let theta: f64 = 1.1;
        let mut prev = m.mix(0.0, 0.0);
        for mag in 1..=130 {
            let mag = mag as f64;
            let cmd = m.mix(mag * theta.cos(), mag * theta.sin());
            assert!(cmd.left_forward >= prev.left_forward);
            assert!(cmd.right_forward >= prev.right_forward);
            prev = cmd;
        }
    }

    #[test]
    fn throttle_response_is_quadratic_in_distance() {
        // Half deflection straight ahead gives a quarter of the ceiling,
        // truncated toward zero.
        let cmd = mixer().mix(0.0, RADIUS / 2.0);
        assert_eq!(cmd.left_forward, PWM_MAX / 4);
        assert_eq!(cmd.right_forward, PWM_MAX / 4);
    }
}
