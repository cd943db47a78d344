// Bearing hold / drive-to-bearing
//
// Proportional on the wrapped heading error with two deadbands: inside `fine`
// the robot is on course and drives straight; between `fine` and `coarse` it
// turns at the minimum useful rate; beyond `coarse` effort ramps up linearly
// to full at an error of π.
//
// An earlier tuning divided by π/2 instead of (π - coarse), reaching full
// effort at a quarter turn. Set `denominator` to FRAC_PI_2 to get it back.

use std::f32::consts::PI;

use crate::input::InputSnapshot;
use crate::model::normalize_angle;
use crate::plan::Task;
use crate::robot::Robot;

#[derive(Debug, Clone, Copy)]
pub struct HeadingConfig {
    /// On-course deadband (rad)
    pub fine: f32,
    /// Below this error only the minimum turn rate is applied (rad)
    pub coarse: f32,
    /// Error at which effort saturates, measured beyond `coarse`
    pub denominator: f32,
    /// Fraction of the platform's max omega used at full effort
    pub max_turn_fraction: f32,
    /// Smallest turn rate worth commanding (rad/s)
    pub min_turn_rate: f32,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        let coarse = PI / 150.0;
        Self {
            fine: PI / 180.0,
            coarse,
            denominator: PI - coarse,
            max_turn_fraction: 1.0,
            min_turn_rate: 0.3,
        }
    }
}

/// Forward speed (mm/s) and turn rate (rad/s) issued to `set_arc`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcCommand {
    pub speed: f32,
    pub omega: f32,
}

#[derive(Debug, Default)]
pub struct HeadingController {
    config: HeadingConfig,
    target: f32,
    speed: f32,
    on_course: bool,
}

impl HeadingController {
    pub fn new(config: HeadingConfig) -> Self {
        Self {
            config,
            target: 0.0,
            speed: 0.0,
            on_course: false,
        }
    }

    /// Turn on the spot to face `target`
    pub fn set_heading(&mut self, target: f32) {
        self.drive_heading(0.0, target);
    }

    /// Drive at `speed` mm/s while steering towards `target`
    pub fn drive_heading(&mut self, speed: f32, target: f32) {
        self.on_course = false;
        self.target = normalize_angle(target);
        self.speed = speed;
    }

    pub fn on_course(&self) -> bool {
        self.on_course
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Control law for the current orientation; updates `on_course`
    pub fn control(&mut self, orientation: f32, max_omega: f32) -> ArcCommand {
        let cfg = &self.config;
        let error = normalize_angle(self.target - orientation);

        if error.abs() <= cfg.fine {
            self.on_course = true;
            return ArcCommand {
                speed: self.speed,
                omega: 0.0,
            };
        }

        let effort = if error.abs() > cfg.coarse {
            ((error - cfg.coarse.copysign(error)) / cfg.denominator).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        let mut omega = effort * max_omega * cfg.max_turn_fraction;
        if omega.abs() < cfg.min_turn_rate {
            omega = cfg.min_turn_rate.copysign(error);
        }

        ArcCommand {
            speed: self.speed * (1.0 - effort.abs()),
            omega,
        }
    }

    /// Read the pose, apply the control law and command the platform
    pub fn steer(&mut self, robot: &mut Robot) -> ArcCommand {
        let cmd = self.control(robot.model.orientation(), robot.platform.get_max_omega());
        robot.platform.set_arc(cmd.speed, cmd.omega);
        cmd
    }
}

impl Task<Robot> for HeadingController {
    fn tick(&mut self, robot: &mut Robot, _input: &mut InputSnapshot) {
        self.steer(robot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::testing::robot;
    use std::f32::consts::FRAC_PI_2;

    const MAX_OMEGA: f32 = 10.0;

    fn controller() -> HeadingController {
        HeadingController::new(HeadingConfig::default())
    }

    #[test]
    fn test_zero_error_on_course() {
        let mut heading = controller();
        heading.drive_heading(120.0, 0.0);
        assert!(!heading.on_course());

        let cmd = heading.control(0.0, MAX_OMEGA);
        assert!(heading.on_course());
        assert_eq!(cmd, ArcCommand { speed: 120.0, omega: 0.0 });
    }

    #[test]
    fn test_half_turn_error_full_effort() {
        let mut heading = controller();
        heading.drive_heading(120.0, PI);

        let cmd = heading.control(0.0, MAX_OMEGA);
        assert!(!heading.on_course());
        assert!((cmd.omega - MAX_OMEGA).abs() < 1e-4);
        assert!(cmd.speed.abs() < 1e-3);
    }

    #[test]
    fn test_shorter_rotation_sign() {
        let mut heading = controller();
        heading.set_heading(-FRAC_PI_2);
        assert!(heading.control(0.0, MAX_OMEGA).omega < 0.0);

        // Across the ±π seam the short way round is positive
        heading.set_heading(-3.0);
        assert!(heading.control(3.0, MAX_OMEGA).omega > 0.0);
    }

    #[test]
    fn test_between_deadbands_uses_floor() {
        let mut heading = controller();
        heading.set_heading(-PI / 160.0);
        let cmd = heading.control(0.0, MAX_OMEGA);
        assert_eq!(cmd.omega, -0.3);
        assert!(!heading.on_course());
    }

    #[test]
    fn test_speed_drops_while_turning() {
        let mut heading = controller();
        heading.drive_heading(100.0, FRAC_PI_2);
        let cmd = heading.control(0.0, MAX_OMEGA);
        assert!(cmd.speed > 0.0 && cmd.speed < 100.0);
        assert!(cmd.omega > 0.0);
    }

    #[test]
    fn test_target_wrapped() {
        let mut heading = controller();
        heading.set_heading(3.0 * PI);
        assert!((heading.target() - PI).abs() < 1e-5);
    }

    #[test]
    fn test_steer_commands_platform() {
        let (_mock, mut robot) = robot();
        let mut heading = controller();
        heading.set_heading(PI);

        let cmd = heading.steer(&mut robot);
        assert!((cmd.omega - robot.platform.get_max_omega()).abs() < 1e-3);

        // Pure turn at the ceiling: wheels at ± max
        let wheels = robot.platform.commanded_velocity();
        assert!(wheels.a > 0.0 && wheels.b < 0.0);
    }
}
