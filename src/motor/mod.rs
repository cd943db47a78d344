// Motor control module for the differential base
//
// Provides:
// - Differential-drive kinematics (arc/rotation -> wheel velocities)
// - Motor payloads on the packet link (rate commands, step reports)
// - Two-wheel motor driver with feedback integration and controlled moves

mod driver;
pub mod kinematics;
pub mod wire;

pub use driver::{MAX_RPS, MotorConfig, Motors, REPORT_PERIOD, STEPS_PER_REVOLUTION, rps_to_wire};
pub use kinematics::{Geometry, WheelVelocities, arc_to_wheels, omega_to_wheels};
pub use wire::StepReport;
