// Pose estimate for the base
//
// Position is dead-reckoned from wheel odometry. Orientation comes from the
// absolute orientation source when one is attached, otherwise from odometry.
// Positive rotation is wheel A travelling further than wheel B, matching
// `Platform::set_arc`.

use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::platform::Platform;

/// Below this, a wheel difference is treated as driving straight (rad)
const STRAIGHT_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f32,
    pub y: f32,
}

impl Coord {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn sub(self, other: Coord) -> Coord {
        Coord::new(self.x - other.x, self.y - other.y)
    }

    pub fn add(self, other: Coord) -> Coord {
        Coord::new(self.x + other.x, self.y + other.y)
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Bearing of this vector from the x axis
    pub fn bearing(self) -> f32 {
        self.y.atan2(self.x)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Wrap an angle into (-π, π]
pub fn normalize_angle(rads: f32) -> f32 {
    let wrapped = rads.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

/// Advance a pose by one odometry step
///
/// Returns `None` when the geometry degenerates (non-finite rotation centre
/// or result), leaving the caller's pose untouched.
pub fn advance(pos: Coord, ori: f32, da: f32, db: f32, wheelbase: f32) -> Option<(Coord, f32)> {
    let dtheta = (da - db) / wheelbase;

    if dtheta.abs() < STRAIGHT_EPSILON {
        let d = (da + db) / 2.0;
        let next = pos.add(Coord::new(d * ori.cos(), d * ori.sin()));
        return next.is_finite().then_some((next, ori));
    }

    // Signed turning radius, centre on the left for positive rotation
    let r = (wheelbase / 2.0) * (da + db) / (da - db);
    let centre = Coord::new(pos.x - r * ori.sin(), pos.y + r * ori.cos());
    if !centre.is_finite() {
        return None;
    }

    let rel = pos.sub(centre);
    let (sin, cos) = dtheta.sin_cos();
    let rotated = Coord::new(rel.x * cos - rel.y * sin, rel.x * sin + rel.y * cos);
    let next = centre.add(rotated);
    if !next.is_finite() || !dtheta.is_finite() {
        return None;
    }

    Some((next, normalize_angle(ori + dtheta)))
}

#[derive(Debug, Default)]
pub struct Model {
    pos: Coord,
    ori: f32,
    prev_distance: Option<(f32, f32)>,
    rot_offset: f32,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pose(&self) -> (Coord, f32) {
        (self.pos, self.ori)
    }

    pub fn position(&self) -> Coord {
        self.pos
    }

    pub fn orientation(&self) -> f32 {
        self.ori
    }

    /// Make the current pose the origin, facing along +x
    pub fn reset(&mut self, platform: &Platform) {
        self.pos = Coord::default();
        self.ori = 0.0;
        self.rot_offset = platform.get_rot().unwrap_or(0.0);
    }

    /// Integrate the odometry accumulated since the previous tick
    pub fn tick(&mut self, platform: &Platform) {
        let (a, b) = platform.get_distance();
        let (da, db) = match self.prev_distance {
            Some((pa, pb)) => (a - pa, b - pb),
            None => (0.0, 0.0),
        };
        self.prev_distance = Some((a, b));

        match advance(self.pos, self.ori, da, db, platform.wheelbase()) {
            Some((pos, ori)) => {
                self.pos = pos;
                self.ori = ori;
            }
            None => {
                warn!(
                    "Degenerate odometry step (da={}, db={}), keeping pose {:?} @ {}",
                    da, db, self.pos, self.ori
                );
            }
        }

        if let Some(rot) = platform.get_rot() {
            self.ori = normalize_angle(rot - self.rot_offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MockTransport;
    use crate::motor::StepReport;
    use crate::peripherals::{OrientationSource, PeripheralError};
    use crate::platform::PlatformConfig;
    use std::f32::consts::FRAC_PI_2;

    const WB: f32 = 76.0;

    #[test]
    fn test_normalize_angle_range() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert_eq!(normalize_angle(PI), PI);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-6);
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-5);
        assert!((normalize_angle(1.5 * PI) + FRAC_PI_2).abs() < 1e-6);
        assert!((normalize_angle(-0.5) + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_straight_line() {
        let (pos, ori) = advance(Coord::default(), 0.0, 100.0, 100.0, WB).unwrap();
        assert_eq!(pos, Coord::new(100.0, 0.0));
        assert_eq!(ori, 0.0);
    }

    #[test]
    fn test_spin_in_place() {
        // Quarter turn: each wheel covers wb/2 * π/2
        let d = WB / 2.0 * FRAC_PI_2;
        let (pos, ori) = advance(Coord::default(), 0.0, d, -d, WB).unwrap();
        assert!(pos.length() < 1e-4);
        assert!((ori - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_arc_left() {
        // Quarter circle of radius 100 turning positive
        let r = 100.0;
        let da = (r + WB / 2.0) * FRAC_PI_2;
        let db = (r - WB / 2.0) * FRAC_PI_2;
        let (pos, ori) = advance(Coord::default(), 0.0, da, db, WB).unwrap();
        assert!((pos.x - r).abs() < 1e-3);
        assert!((pos.y - r).abs() < 1e-3);
        assert!((ori - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_geometry_rejected() {
        assert!(advance(Coord::default(), 0.0, 10.0, 0.0, 0.0).is_none());
        assert!(advance(Coord::default(), 0.0, f32::NAN, 0.0, WB).is_none());
        assert!(advance(Coord::default(), 0.0, f32::MAX, -f32::MAX, WB).is_none());
    }

    struct FixedRot(f32);

    impl OrientationSource for FixedRot {
        fn orientation(&mut self) -> Result<f32, PeripheralError> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_tick_integrates_platform_odometry() {
        let mock = MockTransport::new();
        let mut platform = Platform::new(Box::new(mock.clone()), PlatformConfig::default()).unwrap();
        let mut model = Model::new();
        model.tick(&platform);

        mock.respond(vec![
            StepReport::new(0, -600).to_packet(),
            StepReport::new(1, 600).to_packet(),
        ]);
        platform.update().unwrap();
        model.tick(&platform);

        let dpr = platform.geometry().distance_per_rev;
        assert!((model.position().x - dpr).abs() < 1e-3);
        assert!(model.orientation().abs() < 1e-6);
    }

    #[test]
    fn test_orientation_source_overrides_with_reset_offset() {
        let mut platform =
            Platform::new(Box::new(MockTransport::new()), PlatformConfig::default()).unwrap();
        platform.attach_orientation(Box::new(FixedRot(1.0)));
        platform.update().unwrap();

        let mut model = Model::new();
        model.tick(&platform);
        assert!((model.orientation() - 1.0).abs() < 1e-6);

        model.reset(&platform);
        model.tick(&platform);
        assert!(model.orientation().abs() < 1e-6);
    }
}
