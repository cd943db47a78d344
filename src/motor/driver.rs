// Two-wheel motor driver on top of the packet device
//
// Converts between physical units (revolutions, rev/s) and wire units
// (rad/s rate commands, encoder step reports). Wheel A is mounted mirrored,
// so its sign is inverted on the wire in both directions.

use std::f32::consts::TAU;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::wire::{EP_STEP_REPORT, StepReport, WHEEL_A, WHEEL_B, decode_step_report, rate_command};
use crate::device::{Component, Device, DeviceError};

/// Encoder resolution of the drive motors
pub const STEPS_PER_REVOLUTION: f32 = 600.0;

/// Characterized top speed of the drive motors
pub const MAX_RPS: f32 = 4.13;

/// Default board reporting period (one report per control tick)
pub const REPORT_PERIOD: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy)]
pub struct MotorConfig {
    pub steps_per_rev: f32,
    pub max_rps: f32,
    pub report_period: Duration,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            steps_per_rev: STEPS_PER_REVOLUTION,
            max_rps: MAX_RPS,
            report_period: REPORT_PERIOD,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Wheel {
    /// Radians per encoder step
    alpha: f32,
    /// Last requested rate, physical sign
    commanded_rps: f32,
    /// Accumulated since attach
    revolutions: f32,
    /// From the latest step report
    observed_rps: f32,
    /// Revolutions left in a controlled move
    remaining: Option<f32>,
}

impl Wheel {
    fn new(steps_per_rev: f32) -> Self {
        Self {
            alpha: TAU / steps_per_rev,
            ..Self::default()
        }
    }

    fn steps_to_revs(&self, steps: i32) -> f32 {
        steps as f32 * self.alpha / TAU
    }
}

/// Motor pair driver for the differential base
pub struct Motors {
    config: MotorConfig,
    wheels: [Wheel; 2], // [a, b]
    component: Component,
}

/// Convert rev/s to the rounded rad/s wire value
///
/// An exact zero request always encodes as 0.
pub fn rps_to_wire(rps: f32) -> i8 {
    if rps == 0.0 {
        return 0;
    }
    let radss = (rps * TAU).round();
    radss.clamp(i8::MIN as f32, i8::MAX as f32) as i8
}

impl Motors {
    /// Register the step report endpoint and create the driver
    pub fn attach(dev: &mut Device, config: MotorConfig) -> Result<Self, DeviceError> {
        let component = dev.add(EP_STEP_REPORT, Box::new(decode_step_report))?;
        info!(
            "Motors attached: {} steps/rev, max {} rev/s",
            config.steps_per_rev, config.max_rps
        );

        Ok(Self {
            config,
            wheels: [Wheel::new(config.steps_per_rev); 2],
            component,
        })
    }

    /// Deregister the step report endpoint
    pub fn detach(self, dev: &mut Device) -> Result<(), DeviceError> {
        dev.remove(self.component)
    }

    /// Command both wheel rates (rev/s), cancelling any controlled move
    pub fn set_rps(&mut self, dev: &mut Device, a: f32, b: f32) {
        if self.moving() {
            debug!("Controlled move superseded by rate command");
        }
        for wheel in &mut self.wheels {
            wheel.remaining = None;
        }
        self.command(dev, a, b);
    }

    fn command(&mut self, dev: &mut Device, a: f32, b: f32) {
        self.wheels[0].commanded_rps = a;
        self.wheels[1].commanded_rps = b;

        dev.queue(rate_command(WHEEL_A, rps_to_wire(-a)));
        dev.queue(rate_command(WHEEL_B, rps_to_wire(b)));
    }

    /// Drive each wheel a fixed number of revolutions at the given rate
    ///
    /// Each wheel stops on its own once its distance is covered. A later
    /// `set_rps` or `controlled_move` replaces the move immediately.
    pub fn controlled_move(
        &mut self,
        dev: &mut Device,
        a_revs: f32,
        a_rps: f32,
        b_revs: f32,
        b_rps: f32,
    ) {
        let targets = [(a_revs.abs(), a_rps), (b_revs.abs(), b_rps)];
        let mut rates = [0.0f32; 2];

        for (i, (revs, rps)) in targets.into_iter().enumerate() {
            if revs > 0.0 && rps != 0.0 {
                self.wheels[i].remaining = Some(revs);
                rates[i] = rps;
            } else {
                self.wheels[i].remaining = None;
            }
        }

        debug!(
            "Controlled move: a={} rev @ {} rev/s, b={} rev @ {} rev/s",
            a_revs, rates[0], b_revs, rates[1]
        );
        self.command(dev, rates[0], rates[1]);
    }

    /// True while a controlled move has distance left on either wheel
    pub fn moving(&self) -> bool {
        self.wheels.iter().any(|w| w.remaining.is_some())
    }

    /// Apply one step report from the board
    pub fn add_steps(&mut self, dev: &mut Device, report: &StepReport) {
        let period = self.config.report_period.as_secs_f32();

        let (index, sign) = match report.wheel_id {
            id if id == WHEEL_A as u32 => (0, -1.0),
            id if id == WHEEL_B as u32 => (1, 1.0),
            id => {
                warn!("Step report for unknown wheel {}", id);
                return;
            }
        };

        let wheel = &mut self.wheels[index];
        let revs = sign * wheel.steps_to_revs(report.steps);
        wheel.revolutions += revs;
        wheel.observed_rps = revs / period;

        if let Some(remaining) = wheel.remaining {
            let left = remaining - revs.abs();
            if left <= 0.0 {
                wheel.remaining = None;
                wheel.commanded_rps = 0.0;
                let (a, b) = self.commanded_rps();
                self.command(dev, a, b);
                if !self.moving() {
                    debug!("Controlled move complete");
                }
            } else {
                wheel.remaining = Some(left);
            }
        }
    }

    /// Observed wheel rates (rev/s)
    pub fn get_rps(&self) -> (f32, f32) {
        (self.wheels[0].observed_rps, self.wheels[1].observed_rps)
    }

    /// Accumulated wheel revolutions
    pub fn get_revolutions(&self) -> (f32, f32) {
        (self.wheels[0].revolutions, self.wheels[1].revolutions)
    }

    /// Last commanded wheel rates (rev/s)
    pub fn commanded_rps(&self) -> (f32, f32) {
        (self.wheels[0].commanded_rps, self.wheels[1].commanded_rps)
    }

    pub fn get_max_rps(&self) -> f32 {
        self.config.max_rps
    }

    pub fn config(&self) -> &MotorConfig {
        &self.config
    }
}
