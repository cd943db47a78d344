// Differential-drive kinematics for the two-wheel base
// Converts body motion (forward velocity, turn rate) to per-wheel linear velocities.

use std::f32::consts::PI;

/// Wheel travel per revolution (mm): 30.5 mm diameter wheels
pub const DISTANCE_PER_REV: f32 = 30.5 * PI;

/// Distance between the wheel contact points (mm)
pub const WHEELBASE: f32 = 76.0;

/// Physical constants of the base
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub distance_per_rev: f32,
    pub wheelbase: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            distance_per_rev: DISTANCE_PER_REV,
            wheelbase: WHEELBASE,
        }
    }
}

/// Linear velocity of each wheel (mm/s)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelVelocities {
    pub a: f32,
    pub b: f32,
}

impl WheelVelocities {
    pub fn new(a: f32, b: f32) -> Self {
        Self { a, b }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Convert to wheel rates (rev/s)
    pub fn to_rps(&self, distance_per_rev: f32) -> (f32, f32) {
        (self.a / distance_per_rev, self.b / distance_per_rev)
    }

    /// Difference between the wheels, i.e. the turn component
    pub fn differential(&self) -> f32 {
        self.a - self.b
    }
}

/// Rotation in place: wheel A backwards, wheel B forwards for positive `omega`
pub fn omega_to_wheels(omega: f32, wheelbase: f32) -> WheelVelocities {
    let v = omega * (wheelbase / 2.0);
    WheelVelocities::new(-v, v)
}

/// Decompose an arc (forward velocity + turn rate) into wheel velocities
///
/// The turn differential is limited to twice the ceiling. If the faster
/// wheel still exceeds the ceiling, the overflow is taken off both wheels
/// equally: the turn is preserved and forward speed gives way. On a tie
/// wheel B sets the sign of the overflow.
///
/// # Arguments
/// * `vel` - Forward velocity in mm/s
/// * `omega` - Turn rate in rad/s (positive drives wheel A faster)
/// * `wheelbase` - Wheel separation in mm
/// * `ceiling` - Maximum wheel velocity in mm/s
pub fn arc_to_wheels(vel: f32, omega: f32, wheelbase: f32, ceiling: f32) -> WheelVelocities {
    let delta_v = (omega * wheelbase).clamp(-2.0 * ceiling, 2.0 * ceiling);

    let mut a = vel + delta_v / 2.0;
    let mut b = vel - delta_v / 2.0;

    let reference = if a.abs() > b.abs() { a } else { b };
    if reference.abs() > ceiling {
        let overflow = reference - ceiling.copysign(reference);
        a -= overflow;
        b -= overflow;
    }

    WheelVelocities::new(a, b)
}
