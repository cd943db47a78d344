// Maze corridor run
//
// Drives down a corridor holding the current bearing, slowing as the wall
// ahead gets closer. When the wall is close enough it turns a quarter to the
// next side in a fixed route, then carries on. Wall distance comes from a
// horizon detector: the row where the floor ends, as a fraction of frame
// height from the top.

use std::f32::consts::FRAC_PI_2;
use std::time::Instant;

use tracing::{debug, info};

use crate::input::{Button, InputSnapshot};
use crate::peripherals::{Frame, Rgba};
use crate::plan::{HeadingConfig, HeadingController, LifecycleTask, Task};
use crate::robot::Robot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Left,
    Right,
}

impl Turn {
    fn angle(self) -> f32 {
        match self {
            Turn::Left => -FRAC_PI_2,
            Turn::Right => FRAC_PI_2,
        }
    }
}

pub const ROUTE: [Turn; 8] = [
    Turn::Left,
    Turn::Left,
    Turn::Right,
    Turn::Right,
    Turn::Left,
    Turn::Left,
    Turn::Left,
    Turn::Right,
];

/// Visible floor at or below which the wall counts as reached
const NEAR: f32 = 0.25;
/// Visible floor at which the corridor counts as open
const FAR: f32 = 0.51;

pub trait HorizonDetector: Send {
    /// Floor/wall boundary as a fraction of frame height from the top, or
    /// `None` when no boundary is visible
    fn horizon(&mut self, frame: &Frame) -> Option<f32>;
}

/// Finds the first row, walking up from the bottom, whose mean brightness
/// differs from the floor row by more than `min_step`
#[derive(Debug, Clone, Copy)]
pub struct RowStepHorizon {
    pub min_step: u8,
}

impl Default for RowStepHorizon {
    fn default() -> Self {
        Self { min_step: 40 }
    }
}

fn row_mean(frame: &Frame, row: u32) -> Option<f32> {
    if frame.width == 0 {
        return None;
    }
    let sum: u32 = (0..frame.width)
        .filter_map(|x| frame.pixel(x, row))
        .map(u32::from)
        .sum();
    Some(sum as f32 / frame.width as f32)
}

impl HorizonDetector for RowStepHorizon {
    fn horizon(&mut self, frame: &Frame) -> Option<f32> {
        let bottom = frame.height.checked_sub(1)?;
        let floor = row_mean(frame, bottom)?;

        (0..bottom)
            .rev()
            .find(|&row| {
                row_mean(frame, row).is_some_and(|m| (m - floor).abs() > self.min_step as f32)
            })
            .map(|row| (row + 1) as f32 / frame.height as f32)
    }
}

pub struct BounceTask {
    detector: Box<dyn HorizonDetector>,
    heading: HeadingController,
    last_frame: Option<Instant>,
    running: bool,
    turning: bool,
    dir: f32,
    turn: usize,
}

impl BounceTask {
    pub fn new(detector: Box<dyn HorizonDetector>, config: HeadingConfig) -> Self {
        Self {
            detector,
            heading: HeadingController::new(config),
            last_frame: None,
            running: false,
            turning: false,
            dir: 0.0,
            turn: 0,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Turns taken so far along the route
    pub fn turns_taken(&self) -> usize {
        self.turn
    }

    /// One step of the run given the visible floor (1 - horizon)
    fn advance(&mut self, robot: &mut Robot, floor: Option<f32>) {
        if self.turning {
            if !self.heading.on_course() {
                self.heading.steer(robot);
                return;
            }
            self.turning = false;
        }

        match floor {
            Some(floor) if floor <= NEAR => {
                let Some(turn) = ROUTE.get(self.turn) else {
                    info!("Route complete");
                    robot.platform.set_velocity(0.0, 0.0);
                    self.running = false;
                    return;
                };

                debug!("Wall ahead, turning {:?}", turn);
                self.dir += turn.angle();
                self.heading.set_heading(self.dir);
                self.turning = true;
                self.turn += 1;
            }
            _ => {
                let floor = floor.unwrap_or(FAR).min(FAR);
                let slow = (FAR - floor) / (FAR - NEAR) * 0.5;
                let max = robot.platform.get_max_velocity();
                self.heading.drive_heading(max * (1.0 - slow), self.dir);
                self.heading.steer(robot);
            }
        }
    }
}

impl Task<Robot> for BounceTask {
    fn tick(&mut self, robot: &mut Robot, input: &mut InputSnapshot) {
        if input.buttons.take_pressed(Button::Cross) {
            if self.running {
                robot.platform.set_velocity(0.0, 0.0);
            }
            self.running = !self.running;
            debug!("Bounce running: {}", self.running);
        }

        let Some((frame, at)) = robot.platform.get_frame() else {
            return;
        };
        if self.last_frame == Some(at) {
            return;
        }
        self.last_frame = Some(at);

        let floor = self.detector.horizon(frame).map(|h| 1.0 - h);
        if self.running {
            self.advance(robot, floor);
        }
    }

    fn color(&self) -> Option<Rgba> {
        Some(Rgba::new(0xff, 0x00, 0xff, 0x80))
    }
}

impl LifecycleTask<Robot> for BounceTask {
    fn enter(&mut self, robot: &mut Robot) {
        robot.platform.disable_camera();
        robot.platform.enable_camera();

        robot.model.reset(&robot.platform);
        self.dir = 0.0;
        self.running = false;
        self.turning = false;
        self.turn = 0;
        self.last_frame = None;
    }

    fn exit(&mut self, robot: &mut Robot) {
        robot.platform.set_velocity(0.0, 0.0);
        robot.platform.disable_camera();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Press;
    use crate::robot::testing::robot;

    const W: u32 = 16;
    const H: u32 = 32;

    /// Wall in the top `wall_rows` rows, floor below
    fn corridor(wall_rows: u32) -> Frame {
        let mut data = vec![200u8; (W * H) as usize];
        for px in data.iter_mut().take((W * wall_rows) as usize) {
            *px = 50;
        }
        Frame {
            width: W,
            height: H,
            data,
        }
    }

    fn task() -> BounceTask {
        BounceTask::new(Box::new(RowStepHorizon::default()), HeadingConfig::default())
    }

    #[test]
    fn test_horizon_at_wall_boundary() {
        let mut detector = RowStepHorizon::default();
        assert_eq!(detector.horizon(&corridor(8)), Some(0.25));
        assert_eq!(detector.horizon(&corridor(24)), Some(0.75));
    }

    #[test]
    fn test_no_wall_no_horizon() {
        let mut detector = RowStepHorizon::default();
        assert_eq!(detector.horizon(&corridor(0)), None);
        let empty = Frame {
            width: 0,
            height: 0,
            data: Vec::new(),
        };
        assert_eq!(detector.horizon(&empty), None);
    }

    #[test]
    fn test_open_corridor_full_speed() {
        let (_mock, mut robot) = robot();
        let mut bounce = task();
        bounce.enter(&mut robot);

        bounce.advance(&mut robot, None);
        let max = robot.platform.get_max_velocity();
        let wheels = robot.platform.commanded_velocity();
        assert!((wheels.a - max).abs() < 1e-3);
        assert!((wheels.b - max).abs() < 1e-3);
    }

    #[test]
    fn test_slows_as_wall_nears() {
        let (_mock, mut robot) = robot();
        let mut bounce = task();
        bounce.enter(&mut robot);

        // Halfway between open and near: a quarter off full speed
        bounce.advance(&mut robot, Some((FAR + NEAR) / 2.0));
        let max = robot.platform.get_max_velocity();
        let wheels = robot.platform.commanded_velocity();
        assert!((wheels.a - max * 0.75).abs() < 1e-2);
    }

    #[test]
    fn test_wall_starts_route_turn() {
        let (_mock, mut robot) = robot();
        let mut bounce = task();
        bounce.enter(&mut robot);

        bounce.advance(&mut robot, Some(0.2));
        assert_eq!(bounce.turns_taken(), 1);
        assert!((bounce.heading.target() + FRAC_PI_2).abs() < 1e-6);

        // Still facing the wall: turn in place, whatever the camera says
        bounce.advance(&mut robot, None);
        let wheels = robot.platform.commanded_velocity();
        assert!(wheels.a < 0.0 && wheels.b > 0.0, "{:?}", wheels);
        assert_eq!(bounce.turns_taken(), 1);
    }

    #[test]
    fn test_route_end_stops() {
        let (_mock, mut robot) = robot();
        let mut bounce = task();
        bounce.enter(&mut robot);
        bounce.running = true;
        bounce.turn = ROUTE.len();

        robot.platform.set_velocity(100.0, 100.0);
        bounce.advance(&mut robot, Some(0.1));
        assert!(!bounce.running());
        assert_eq!(robot.platform.commanded_velocity().a, 0.0);
    }

    #[test]
    fn test_cross_toggles_and_exit_stops() {
        let (_mock, mut robot) = robot();
        let mut bounce = task();
        bounce.enter(&mut robot);

        let mut input = InputSnapshot::default();
        input.buttons.set(Button::Cross, Press::Pressed);
        bounce.tick(&mut robot, &mut input);
        assert!(bounce.running());
        assert_eq!(input.buttons.get(Button::Cross), Press::None);

        bounce.exit(&mut robot);
        assert_eq!(robot.platform.commanded_velocity().a, 0.0);
    }
}
