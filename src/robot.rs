// Context handed to every behavior
//
// Bundles the platform with the pose model so a task can command motion and
// read the pose through one borrow. The model is only advanced here, right
// after the platform has applied this tick's feedback.
use crate::link::TransportError;
use crate::model::Model;
use crate::platform::Platform;

pub struct Robot {
    pub platform: Platform,
    pub model: Model,
}

impl Robot {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            model: Model::new(),
        }
    }

    /// Exchange packets with the board, then fold the feedback into the pose
    ///
    /// The pose is advanced even when the transaction fails; it then simply
    /// sees no new odometry.
    pub fn update(&mut self) -> Result<(), TransportError> {
        let result = self.platform.update();
        self.model.tick(&self.platform);
        result
    }
}


#[cfg(test)]
mod tests {
    use super::testing::robot;
    use crate::motor::StepReport;

    #[test]
    fn test_update_advances_pose() {
        let (mock, mut robot) = robot();
        robot.update().unwrap();

        mock.respond(vec![
            StepReport::new(0, -300).to_packet(),
            StepReport::new(1, 300).to_packet(),
        ]);
        robot.update().unwrap();

        let dpr = robot.platform.geometry().distance_per_rev;
        assert!((robot.model.position().x - dpr / 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_update_reports_failure() {
        let (mock, mut robot) = robot();
        mock.fail_next("unplugged");
        assert!(robot.update().is_err());
        assert_eq!(robot.model.position().x, 0.0);
    }
}
