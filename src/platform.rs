// Differential-drive platform
//
// Owns the packet device, the motor pair and the peripherals. Behaviors talk
// to the robot exclusively through this type: body-level motion commands in,
// wheel feedback and sensor readings out.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::device::{Device, DeviceError, Report};
use crate::link::{Packet, Transport, TransportError};
use crate::motor::{Geometry, MotorConfig, Motors, WheelVelocities, arc_to_wheels, omega_to_wheels};
use crate::peripherals::{
    BatteryMonitor, Camera, CameraSlot, Frame, Led, LedState, OrientationSource, Rgba,
    ServoConnector, ServoLink, Trigger,
};

/// The board answers one frame per request frame and reports each wheel in
/// its own frame, so every transaction carries at least this many frames.
pub const FEEDBACK_SLOTS: usize = 2;

/// Forced onto the LED while the battery is low
pub const LOW_BATTERY_COLOR: Rgba = Rgba::new(0xff, 0x00, 0x00, 0x80);

/// Speed ceiling level; scales the platform ceiling, never the motors'
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boost {
    #[default]
    None,
    Slow,
    Fast,
}

impl Boost {
    pub fn multiplier(self) -> f32 {
        match self {
            Boost::None => 1.0,
            Boost::Slow => 0.3,
            Boost::Fast => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlatformConfig {
    pub geometry: Geometry,
    pub motors: MotorConfig,
    /// Minimum frames per link transaction
    pub min_batch: usize,
    pub reconnect_interval: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            motors: MotorConfig::default(),
            min_batch: 0,
            reconnect_interval: Duration::from_secs(5),
        }
    }
}

pub struct Platform {
    device: Device,
    motors: Motors,
    geometry: Geometry,
    boost: Boost,
    commanded: WheelVelocities,

    orientation: Option<Box<dyn OrientationSource>>,
    rot: Option<f32>,
    camera: Option<CameraSlot>,
    servos: ServoLink,
    led: LedState,
    battery: Option<Box<dyn BatteryMonitor>>,
    battery_low: bool,
}

impl Platform {
    pub fn new(transport: Box<dyn Transport>, config: PlatformConfig) -> Result<Self, DeviceError> {
        let mut device = Device::with_min_batch(transport, config.min_batch);
        let motors = Motors::attach(&mut device, config.motors)?;

        info!(
            "Platform ready: wheelbase {} mm, {:.1} mm/rev, min batch {}",
            config.geometry.wheelbase, config.geometry.distance_per_rev, config.min_batch
        );

        Ok(Self {
            device,
            motors,
            geometry: config.geometry,
            boost: Boost::None,
            commanded: WheelVelocities::zero(),
            orientation: None,
            rot: None,
            camera: None,
            servos: ServoLink::new(config.reconnect_interval),
            led: LedState::default(),
            battery: None,
            battery_low: false,
        })
    }

    pub fn attach_orientation(&mut self, source: Box<dyn OrientationSource>) {
        self.orientation = Some(source);
    }

    pub fn attach_camera(&mut self, camera: Box<dyn Camera>) {
        self.camera = Some(CameraSlot::new(camera));
    }

    pub fn attach_led(&mut self, led: Box<dyn Led>) {
        self.led.attach(led);
    }

    pub fn attach_battery(&mut self, battery: Box<dyn BatteryMonitor>) {
        self.battery = Some(battery);
    }

    /// Open the servo board, retrying in the background if it is absent
    pub fn connect_servos(&mut self, connector: ServoConnector) -> bool {
        self.servos.connect(connector)
    }

    // === Motion ===

    /// Independent wheel velocities (mm/s)
    pub fn set_velocity(&mut self, a: f32, b: f32) {
        self.drive(WheelVelocities::new(a, b));
    }

    /// Rotate in place at `omega` rad/s
    pub fn set_omega(&mut self, omega: f32) {
        self.drive(omega_to_wheels(omega, self.geometry.wheelbase));
    }

    /// Forward velocity (mm/s) plus turn rate (rad/s), kept under the ceiling
    pub fn set_arc(&mut self, vel: f32, omega: f32) {
        let wheels = arc_to_wheels(vel, omega, self.geometry.wheelbase, self.get_max_velocity());
        self.drive(wheels);
    }

    fn drive(&mut self, wheels: WheelVelocities) {
        let (a, b) = wheels.to_rps(self.geometry.distance_per_rev);
        self.commanded = wheels;
        self.motors.set_rps(&mut self.device, a, b);
    }

    /// Drive straight for `distance` mm at `velocity` mm/s, then stop
    pub fn controlled_move(&mut self, distance: f32, velocity: f32) {
        let revs = distance.abs() / self.geometry.distance_per_rev;
        let rps = velocity / self.geometry.distance_per_rev;

        self.commanded = WheelVelocities::new(velocity, velocity);
        self.motors
            .controlled_move(&mut self.device, revs, rps, revs, rps);
    }

    /// Drive `angle` radians around a circle of `radius` mm at `tangential` mm/s
    ///
    /// Wheel slip makes this imprecise on the real base.
    pub fn controlled_arc(&mut self, radius: f32, tangential: f32, angle: f32) {
        let half = self.geometry.wheelbase / 2.0;
        let (inner_r, outer_r) = (radius - half, radius + half);

        let omega = tangential / radius;
        if !omega.is_finite() {
            warn!("Controlled arc with radius {} ignored", radius);
            return;
        }

        let dpr = self.geometry.distance_per_rev;
        let inner = ((inner_r * angle).abs() / dpr, omega * inner_r / dpr);
        let outer = ((outer_r * angle).abs() / dpr, omega * outer_r / dpr);

        // Positive angles turn towards wheel B, so wheel A runs the outer track
        let (a, b) = if angle > 0.0 { (outer, inner) } else { (inner, outer) };
        self.commanded = WheelVelocities::new(a.1 * dpr, b.1 * dpr);
        self.motors
            .controlled_move(&mut self.device, a.0, a.1, b.0, b.1);
    }

    pub fn moving(&self) -> bool {
        self.motors.moving()
    }

    pub fn set_boost(&mut self, boost: Boost) {
        if boost != self.boost {
            debug!("Boost {:?} -> {:?}", self.boost, boost);
        }
        self.boost = boost;
    }

    pub fn boost(&self) -> Boost {
        self.boost
    }

    /// Wheel velocity ceiling (mm/s) under the current boost
    pub fn get_max_velocity(&self) -> f32 {
        self.get_max_boosted_velocity(self.boost)
    }

    /// Wheel velocity ceiling (mm/s) under an arbitrary boost level
    pub fn get_max_boosted_velocity(&self, boost: Boost) -> f32 {
        self.motors.get_max_rps() * boost.multiplier() * self.geometry.distance_per_rev
    }

    /// Turn rate (rad/s) with both wheels at the ceiling in opposite directions
    pub fn get_max_omega(&self) -> f32 {
        self.get_max_velocity() * 2.0 / self.geometry.wheelbase
    }

    /// Measured wheel velocities (mm/s)
    pub fn get_velocity(&self) -> (f32, f32) {
        let (a, b) = self.motors.get_rps();
        (a * self.geometry.distance_per_rev, b * self.geometry.distance_per_rev)
    }

    /// Wheel odometry (mm)
    pub fn get_distance(&self) -> (f32, f32) {
        let (a, b) = self.motors.get_revolutions();
        (a * self.geometry.distance_per_rev, b * self.geometry.distance_per_rev)
    }

    /// Last commanded wheel velocities (mm/s)
    pub fn commanded_velocity(&self) -> WheelVelocities {
        self.commanded
    }

    pub fn commanded_rps(&self) -> (f32, f32) {
        self.motors.commanded_rps()
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn wheelbase(&self) -> f32 {
        self.geometry.wheelbase
    }

    /// Latest absolute yaw (radians), if an orientation source is attached
    pub fn get_rot(&self) -> Option<f32> {
        self.rot
    }

    // === Camera ===

    pub fn enable_camera(&mut self) {
        if let Some(camera) = self.camera.as_mut() {
            camera.enable();
        }
    }

    pub fn disable_camera(&mut self) {
        if let Some(camera) = self.camera.as_mut() {
            camera.disable();
        }
    }

    pub fn camera_enabled(&self) -> bool {
        self.camera.as_ref().is_some_and(|c| c.enabled())
    }

    /// Most recent frame and when it was received
    pub fn get_frame(&self) -> Option<(&Frame, Instant)> {
        self.camera.as_ref().and_then(|c| c.frame())
    }

    // === Servos and LED (best effort) ===

    pub fn set_servos(&mut self, a: f32, b: f32) {
        self.servos.set_pos(a, b);
    }

    pub fn enable_servos(&mut self, a: bool, b: bool) {
        self.servos.enable(a, b);
    }

    pub fn servos_connected(&self) -> bool {
        self.servos.connected()
    }

    pub fn set_led_color(&mut self, color: Rgba) {
        self.led.set_color(color);
    }

    pub fn set_led_trigger(&mut self, trigger: Trigger) {
        self.led.set_trigger(trigger);
    }

    pub fn reset_led(&mut self) {
        self.led.reset();
    }

    pub fn led(&self) -> &LedState {
        &self.led
    }

    pub fn battery_low(&self) -> bool {
        self.battery_low
    }

    fn check_battery(&mut self) {
        if let Some(battery) = self.battery.as_mut() {
            match battery.low() {
                Ok(low) => {
                    if low && !self.battery_low {
                        warn!("Battery low");
                    }
                    self.battery_low = low;
                }
                Err(e) => warn!("Battery read failed: {}", e),
            }
        }

        if self.battery_low && self.led.color() != LOW_BATTERY_COLOR {
            self.led.set_color(LOW_BATTERY_COLOR);
        }
    }

    // === Tick ===

    /// Exchange packets with the board and refresh every reading
    ///
    /// Must run to completion before any behavior logic in the same tick.
    /// On transport failure nothing is applied and the motors keep their
    /// last command.
    pub fn update(&mut self) -> Result<(), TransportError> {
        // Step reports only come back in request slots, commands or not
        while self.device.pending() < FEEDBACK_SLOTS {
            self.device.queue(Packet::padding());
        }

        let results = self.device.poll()?;
        self.check_battery();

        if let Some(camera) = self.camera.as_mut() {
            camera.refresh();
        }

        for result in results {
            match result {
                Ok(Report::Steps(report)) => self.motors.add_steps(&mut self.device, &report),
                Ok(Report::Raw(packet)) => {
                    debug!("Unhandled packet on endpoint {}: {:02X?}", packet.endpoint, packet.payload)
                }
                Err(e) => warn!("{}", e),
            }
        }

        if let Some(source) = self.orientation.as_mut() {
            match source.orientation() {
                Ok(rot) => self.rot = Some(rot),
                Err(e) => warn!("Orientation read failed: {}", e),
            }
        }

        self.servos.poll_reconnect();

        Ok(())
    }
}
