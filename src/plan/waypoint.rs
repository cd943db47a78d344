// Drive to a point in the model's frame
use tracing::info;

use crate::input::InputSnapshot;
use crate::model::Coord;
use crate::peripherals::Rgba;
use crate::plan::{HeadingConfig, HeadingController, Task};
use crate::robot::Robot;

/// Arrival radius (mm)
const ARRIVED: f32 = 30.0;
const SPEED_FRACTION: f32 = 0.75;

pub struct WaypointTask {
    heading: HeadingController,
    waypoint: Coord,
    arrived: bool,
}

impl WaypointTask {
    pub fn new(waypoint: Coord, config: HeadingConfig) -> Self {
        Self {
            heading: HeadingController::new(config),
            waypoint,
            arrived: false,
        }
    }

    pub fn set_waypoint(&mut self, waypoint: Coord) {
        self.waypoint = waypoint;
        self.arrived = false;
    }

    pub fn arrived(&self) -> bool {
        self.arrived
    }
}

impl Task<Robot> for WaypointTask {
    fn tick(&mut self, robot: &mut Robot, _input: &mut InputSnapshot) {
        let delta = self.waypoint.sub(robot.model.position());
        let distance = delta.length();

        if distance <= ARRIVED {
            if !self.arrived {
                info!("Arrived at {:?}", self.waypoint);
                self.arrived = true;
            }
            robot.platform.set_velocity(0.0, 0.0);
            return;
        }
        self.arrived = false;

        // Slow down on approach so the last tick doesn't overshoot
        let speed = distance.min(robot.platform.get_max_velocity() * SPEED_FRACTION);
        self.heading.drive_heading(speed, delta.bearing());
        self.heading.steer(robot);
    }

    fn color(&self) -> Option<Rgba> {
        Some(Rgba::new(0xf4, 0x9e, 0x42, 0x80))
    }
}
