// Drive a 200 mm square: face the side's heading, drive it, turn a quarter
//
// Cross starts and stops. Entering the task makes the current pose the
// square's origin.

use std::f32::consts::FRAC_PI_2;

use tracing::debug;

use crate::input::{Button, InputSnapshot};
use crate::peripherals::Rgba;
use crate::plan::{HeadingConfig, HeadingController, LifecycleTask, Task};
use crate::robot::Robot;

const SIDE: f32 = 200.0;
const SPEED_FRACTION: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Turning,
    Driving,
}

pub struct SquareTask {
    heading: HeadingController,
    running: bool,
    leg: Leg,
    dir: f32,
}

impl SquareTask {
    pub fn new(config: HeadingConfig) -> Self {
        Self {
            heading: HeadingController::new(config),
            running: false,
            leg: Leg::Turning,
            dir: 0.0,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }
}

impl Task<Robot> for SquareTask {
    fn tick(&mut self, robot: &mut Robot, input: &mut InputSnapshot) {
        if input.buttons.take_pressed(Button::Cross) {
            if self.running {
                robot.platform.set_velocity(0.0, 0.0);
            }
            self.running = !self.running;
            debug!("Square running: {}", self.running);
        }

        if !self.running {
            return;
        }

        match self.leg {
            Leg::Turning => {
                self.heading.steer(robot);
                if !self.heading.on_course() {
                    return;
                }
                let speed = robot.platform.get_max_velocity() * SPEED_FRACTION;
                robot.platform.controlled_move(SIDE, speed);
                self.leg = Leg::Driving;

                self.dir += FRAC_PI_2;
                self.heading.set_heading(self.dir);
            }
            Leg::Driving => {
                if robot.platform.moving() {
                    return;
                }
                robot.platform.set_velocity(0.0, 0.0);
                self.leg = Leg::Turning;
            }
        }
    }

    fn color(&self) -> Option<Rgba> {
        Some(Rgba::new(0xf4, 0x42, 0x86, 0x80))
    }
}

impl LifecycleTask<Robot> for SquareTask {
    fn enter(&mut self, robot: &mut Robot) {
        self.dir = 0.0;
        self.running = false;
        self.leg = Leg::Turning;

        robot.model.reset(&robot.platform);
        self.heading.set_heading(self.dir);
    }

    fn exit(&mut self, robot: &mut Robot) {
        robot.platform.set_velocity(0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Press;
    use crate::motor::StepReport;
    use crate::robot::testing::robot;

    fn cross() -> InputSnapshot {
        let mut input = InputSnapshot::default();
        input.buttons.set(Button::Cross, Press::Pressed);
        input
    }

    #[test]
    fn test_idle_until_cross() {
        let (_mock, mut robot) = robot();
        let mut square = SquareTask::new(HeadingConfig::default());
        square.enter(&mut robot);

        square.tick(&mut robot, &mut InputSnapshot::default());
        assert!(!square.running());
        assert!(!robot.platform.moving());
    }

    #[test]
    fn test_on_course_starts_side() {
        let (mock, mut robot) = robot();
        let mut square = SquareTask::new(HeadingConfig::default());
        square.enter(&mut robot);

        // Already facing the first side
        square.tick(&mut robot, &mut cross());
        assert!(square.running());
        assert!(robot.platform.moving());

        // Side complete: 200 mm is about 2.09 revolutions
        robot.update().unwrap();
        mock.respond(vec![
            StepReport::new(0, -1300).to_packet(),
            StepReport::new(1, 1300).to_packet(),
        ]);
        robot.update().unwrap();
        square.tick(&mut robot, &mut InputSnapshot::default());
        assert!(!robot.platform.moving());

        // Next leg turns towards +π/2
        square.tick(&mut robot, &mut InputSnapshot::default());
        assert!(robot.platform.commanded_velocity().a > 0.0);
        assert!(robot.platform.commanded_velocity().b < 0.0);
    }

    #[test]
    fn test_cross_stops() {
        let (_mock, mut robot) = robot();
        let mut square = SquareTask::new(HeadingConfig::default());
        square.enter(&mut robot);
        square.tick(&mut robot, &mut cross());
        square.tick(&mut robot, &mut cross());

        assert!(!square.running());
        assert!(!robot.platform.moving());
    }
}
