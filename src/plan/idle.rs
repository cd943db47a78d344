// Parking task
//
// Selected on shutdown, or by the operator to park the robot. It never
// touches the platform, so switching to it leaves the wheels as the outgoing
// task's Exit left them.

use crate::input::InputSnapshot;
use crate::plan::Task;

/// Does nothing; motors keep whatever the previous task left them at
#[derive(Debug, Default)]
pub struct IdleTask;

impl<C> Task<C> for IdleTask {
    fn tick(&mut self, _ctx: &mut C, _input: &mut InputSnapshot) {}
}
