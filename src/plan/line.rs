// Camera line following
//
// A detector fits a straight line through the frame: `offset` is the line's
// lateral position at the top of the frame and `slope` its lateral drift per
// frame height, both in [-1, 1] units of half the frame width. Positive is
// towards wheel B's side, steered with positive omega.
//
// When the line is lost the robot spins towards the side it was last seen,
// flipping sides with a doubling search window.

use tracing::debug;

use crate::input::{Button, InputSnapshot, Press};
use crate::peripherals::{Frame, Rgba};
use crate::platform::Boost;
use crate::plan::{LifecycleTask, Task};
use crate::robot::Robot;

const SEARCH_FRAMES: u32 = 60;
const SEARCH_OMEGA: f32 = 2.5;
const MAX_SPEED: f32 = 500.0;
const MAX_TURN: f32 = 7.0;
const DEFAULT_MULTIPLIER: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f32,
    pub offset: f32,
    /// Row of the topmost line sample, as a fraction of frame height
    pub nearest: f32,
}

pub trait LineDetector: Send {
    /// `None` when no usable line is visible
    fn fit(&mut self, frame: &Frame) -> Option<LineFit>;
}

/// Row-wise contrast detector for a dark line on a light floor
///
/// Rows without enough contrast are skipped. The fit runs through the
/// topmost and bottommost rows that found the line.
#[derive(Debug, Clone, Copy)]
pub struct ContrastDetector {
    pub min_contrast: u8,
}

impl Default for ContrastDetector {
    fn default() -> Self {
        Self { min_contrast: 80 }
    }
}

impl ContrastDetector {
    /// Lateral centre of the dark pixels in `row`, in [-1, 1]
    fn row_centre(&self, frame: &Frame, row: u32) -> Option<f32> {
        let pixels: Vec<u8> = (0..frame.width).filter_map(|x| frame.pixel(x, row)).collect();
        let min = *pixels.iter().min()?;
        let max = *pixels.iter().max()?;
        if max - min <= self.min_contrast {
            return None;
        }

        let threshold = min as u16 + (max - min) as u16 / 2;
        let (sum, count) = pixels
            .iter()
            .enumerate()
            .filter(|(_, p)| (**p as u16) < threshold)
            .fold((0.0f32, 0u32), |(s, n), (x, _)| (s + x as f32, n + 1));

        let centre = sum / count as f32 + 0.5;
        Some(centre / frame.width as f32 * 2.0 - 1.0)
    }
}

impl LineDetector for ContrastDetector {
    fn fit(&mut self, frame: &Frame) -> Option<LineFit> {
        let h = frame.height;
        let rows: Vec<(u32, f32)> = (0..h)
            .filter_map(|row| self.row_centre(frame, row).map(|c| (row, c)))
            .collect();

        let &(near_row, y2) = rows.first()?;
        let &(far_row, y1) = rows.last()?;
        if near_row == far_row {
            return None;
        }

        let x1 = far_row as f32 / h as f32;
        let x2 = near_row as f32 / h as f32;
        let slope = (y2 - y1) / (x2 - x1);
        Some(LineFit {
            slope,
            offset: y2 - slope * x2,
            nearest: x2,
        })
    }
}

pub struct LineTask {
    detector: Box<dyn LineDetector>,
    last_frame: Option<std::time::Instant>,
    running: bool,
    side: f32,
    lost: u32,
    search: u32,
    speed_multiplier: f32,
}

impl LineTask {
    pub fn new(detector: Box<dyn LineDetector>) -> Self {
        Self {
            detector,
            last_frame: None,
            running: false,
            side: 0.0,
            lost: 0,
            search: SEARCH_FRAMES,
            speed_multiplier: DEFAULT_MULTIPLIER,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Cross toggles; a held D-pad direction picks the speed when starting
    fn handle_buttons(&mut self, robot: &mut Robot, input: &mut InputSnapshot) {
        if !input.buttons.take_pressed(Button::Cross) {
            return;
        }

        if self.running {
            robot.platform.set_velocity(0.0, 0.0);
        } else {
            let held = [
                (Button::Up, 2.0),
                (Button::Right, 1.85),
                (Button::Left, 1.7),
                (Button::Down, 1.0),
            ];
            self.speed_multiplier = held
                .iter()
                .find(|(b, _)| input.buttons.get(*b) == Press::Held)
                .map(|&(b, m)| {
                    input.buttons.take_held(b);
                    m
                })
                .unwrap_or(DEFAULT_MULTIPLIER);
        }
        self.running = !self.running;
        debug!("Line running: {} (x{})", self.running, self.speed_multiplier);
    }

    /// Forward speed and turn rate for one detector result
    fn follow(&mut self, fit: Option<LineFit>, cruise: f32) -> (f32, f32) {
        let fit = fit.filter(|f| !(self.lost > 0 && f.nearest > 0.5));

        let Some(fit) = fit else {
            debug!("Lost line, last seen {}", self.side);
            self.lost += 1;
            if self.lost > self.search {
                self.side = -self.side;
                self.search *= 2;
            }
            return (0.0, SEARCH_OMEGA.copysign(self.side));
        };

        self.lost = 0;
        self.search = SEARCH_FRAMES;
        if fit.offset != 0.0 {
            self.side = fit.offset;
        }

        if fit.slope.abs() < 0.1 && fit.offset.abs() < 0.1 {
            // Straight and centred: go fast, steer harder than usual
            (cruise * self.speed_multiplier, MAX_TURN * fit.offset * 1.5)
        } else {
            let reduction = fit.slope.abs().min(0.95);
            (MAX_SPEED * (1.0 - reduction), MAX_TURN * fit.offset)
        }
    }
}

impl Task<Robot> for LineTask {
    fn tick(&mut self, robot: &mut Robot, input: &mut InputSnapshot) {
        self.handle_buttons(robot, input);

        let Some((frame, at)) = robot.platform.get_frame() else {
            return;
        };
        if self.last_frame == Some(at) {
            return;
        }
        self.last_frame = Some(at);

        let fit = self.detector.fit(frame);
        let cruise = robot.platform.get_max_boosted_velocity(Boost::None);
        let (vel, omega) = self.follow(fit, cruise);

        if self.running {
            robot.platform.set_arc(vel, omega);
        }
    }

    fn color(&self) -> Option<Rgba> {
        Some(Rgba::new(0xff, 0xff, 0x00, 0x80))
    }
}

impl LifecycleTask<Robot> for LineTask {
    fn enter(&mut self, robot: &mut Robot) {
        robot.platform.disable_camera();
        robot.platform.enable_camera();
        robot.platform.set_boost(Boost::Fast);
        self.running = false;
        self.last_frame = None;
    }

    fn exit(&mut self, robot: &mut Robot) {
        robot.platform.set_velocity(0.0, 0.0);
        robot.platform.disable_camera();
        robot.platform.set_boost(Boost::None);
    }
}
