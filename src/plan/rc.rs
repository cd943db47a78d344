// Direct remote control
//
// Stick A is forward speed and stick B is turn rate, both scaled to the
// current ceiling. Triangle flips the forward direction. The analog triggers
// position the two servos.

use tracing::debug;

use crate::input::{Button, InputSnapshot};
use crate::plan::{LifecycleTask, Task};
use crate::robot::Robot;

#[derive(Debug, Default)]
pub struct RcTask {
    prev_sticks: (f32, f32),
    prev_triggers: (f32, f32),
    reverse: bool,
}

impl RcTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reversed(&self) -> bool {
        self.reverse
    }

    fn stop(&mut self, robot: &mut Robot) {
        robot.platform.set_velocity(0.0, 0.0);
        robot.platform.set_servos(0.0, 0.0);
        self.prev_sticks = (0.0, 0.0);
        self.prev_triggers = (0.0, 0.0);
    }
}

impl Task<Robot> for RcTask {
    fn tick(&mut self, robot: &mut Robot, input: &mut InputSnapshot) {
        let toggled = input.buttons.take_pressed(Button::Triangle);
        if toggled {
            self.reverse = !self.reverse;
            debug!("RC reverse: {}", self.reverse);
        }

        let sticks = (input.stick_a, input.stick_b);
        if toggled || sticks != self.prev_sticks {
            let mut speed = sticks.0 * robot.platform.get_max_velocity();
            if self.reverse {
                speed = -speed;
            }
            let omega = sticks.1 * robot.platform.get_max_omega();
            robot.platform.set_arc(speed, omega);
        }
        self.prev_sticks = sticks;

        let triggers = (input.l2, input.r2);
        if triggers != self.prev_triggers {
            robot.platform.set_servos(triggers.0, triggers.1);
        }
        self.prev_triggers = triggers;
    }
}

impl LifecycleTask<Robot> for RcTask {
    fn enter(&mut self, robot: &mut Robot) {
        self.stop(robot);
        robot.platform.enable_servos(true, true);
    }

    fn exit(&mut self, robot: &mut Robot) {
        self.stop(robot);
        robot.platform.enable_servos(false, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Press;
    use crate::robot::testing::robot;

    fn sticks(a: f32, b: f32) -> InputSnapshot {
        InputSnapshot {
            stick_a: a,
            stick_b: b,
            ..InputSnapshot::default()
        }
    }

    #[test]
    fn test_full_forward() {
        let (_mock, mut robot) = robot();
        let mut rc = RcTask::new();
        rc.enter(&mut robot);
        rc.tick(&mut robot, &mut sticks(1.0, 0.0));

        let max = robot.platform.get_max_velocity();
        let wheels = robot.platform.commanded_velocity();
        assert!((wheels.a - max).abs() < 1e-3);
        assert!((wheels.b - max).abs() < 1e-3);
    }

    #[test]
    fn test_unchanged_sticks_not_reissued() {
        let (mock, mut robot) = robot();
        let mut rc = RcTask::new();
        rc.enter(&mut robot);
        robot.update().unwrap();

        rc.tick(&mut robot, &mut sticks(0.5, 0.0));
        robot.update().unwrap();
        rc.tick(&mut robot, &mut sticks(0.5, 0.0));
        robot.update().unwrap();

        let sent = mock.sent();
        assert!(sent[1].iter().all(|p| !p.is_padding()));
        assert!(sent[2].iter().all(|p| p.is_padding()));
    }

    #[test]
    fn test_triangle_reverses() {
        let (_mock, mut robot) = robot();
        let mut rc = RcTask::new();
        rc.enter(&mut robot);
        rc.tick(&mut robot, &mut sticks(0.5, 0.0));

        let mut input = sticks(0.5, 0.0);
        input.buttons.set(Button::Triangle, Press::Pressed);
        rc.tick(&mut robot, &mut input);

        assert!(rc.reversed());
        assert!(robot.platform.commanded_velocity().a < 0.0);
        // The press is consumed
        assert_eq!(input.buttons.get(Button::Triangle), Press::None);
    }

    #[test]
    fn test_exit_stops() {
        let (_mock, mut robot) = robot();
        let mut rc = RcTask::new();
        rc.enter(&mut robot);
        rc.tick(&mut robot, &mut sticks(0.3, 0.3));
        rc.exit(&mut robot);

        let wheels = robot.platform.commanded_velocity();
        assert_eq!((wheels.a, wheels.b), (0.0, 0.0));
    }
}
