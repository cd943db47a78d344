// Peripheral contracts consumed by the platform
//
// The drivers behind these traits live outside this crate (or in `sim`);
// the platform only needs the narrow surface below.

pub mod led;
pub mod servo;

use std::time::Instant;

pub use led::{DEFAULT_COLOR, Led, LedState, Rgba, Trigger};
pub use servo::{ServoConnector, ServoLink, Servos};

/// Error types for peripheral transactions
#[derive(Debug, thiserror::Error)]
pub enum PeripheralError {
    #[error("{device} not responding: {reason}")]
    NotResponding { device: &'static str, reason: String },
}

impl PeripheralError {
    pub fn not_responding(device: &'static str, reason: impl Into<String>) -> Self {
        Self::NotResponding {
            device,
            reason: reason.into(),
        }
    }
}

/// Absolute yaw estimate (radians), e.g. from an IMU
pub trait OrientationSource: Send {
    fn orientation(&mut self) -> Result<f32, PeripheralError>;
}

/// Low-battery input, e.g. a GPIO line from the power board
pub trait BatteryMonitor: Send {
    fn low(&mut self) -> Result<bool, PeripheralError>;
}

/// Greyscale camera frame
///
/// Frames are owned; dropping one releases its buffer back to the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }
}

pub trait Camera: Send {
    fn enable(&mut self);
    fn disable(&mut self);
    fn enabled(&self) -> bool;

    /// Newest frame captured since the previous call, if any
    fn latest_frame(&mut self) -> Option<Frame>;
}

/// Camera plus the frame currently handed out to behaviors
pub struct CameraSlot {
    camera: Box<dyn Camera>,
    frame: Option<(Frame, Instant)>,
}

impl CameraSlot {
    pub fn new(camera: Box<dyn Camera>) -> Self {
        Self {
            camera,
            frame: None,
        }
    }

    /// Swap in the newest frame, releasing the previous one first
    pub fn refresh(&mut self) {
        if !self.camera.enabled() {
            return;
        }
        if let Some(frame) = self.camera.latest_frame() {
            drop(self.frame.take());
            self.frame = Some((frame, Instant::now()));
        }
    }

    pub fn frame(&self) -> Option<(&Frame, Instant)> {
        self.frame.as_ref().map(|(f, t)| (f, *t))
    }

    pub fn enable(&mut self) {
        self.camera.enable();
    }

    pub fn disable(&mut self) {
        self.frame = None;
        self.camera.disable();
    }

    pub fn enabled(&self) -> bool {
        self.camera.enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedCamera {
        enabled: bool,
        frames: VecDeque<Frame>,
    }

    impl Camera for ScriptedCamera {
        fn enable(&mut self) {
            self.enabled = true;
        }
        fn disable(&mut self) {
            self.enabled = false;
        }
        fn enabled(&self) -> bool {
            self.enabled
        }
        fn latest_frame(&mut self) -> Option<Frame> {
            self.frames.pop_front()
        }
    }

    fn frame(fill: u8) -> Frame {
        Frame {
            width: 2,
            height: 2,
            data: vec![fill; 4],
        }
    }

    #[test]
    fn test_refresh_keeps_last_frame_when_none_new() {
        let camera = ScriptedCamera {
            enabled: true,
            frames: VecDeque::from(vec![frame(1)]),
        };
        let mut slot = CameraSlot::new(Box::new(camera));

        slot.refresh();
        let (_, first_time) = slot.frame().unwrap();
        slot.refresh();
        let (held, time) = slot.frame().unwrap();
        assert_eq!(held.pixel(0, 0), Some(1));
        assert_eq!(time, first_time);
    }

    #[test]
    fn test_disable_releases_frame() {
        let camera = ScriptedCamera {
            enabled: true,
            frames: VecDeque::from(vec![frame(1), frame(2)]),
        };
        let mut slot = CameraSlot::new(Box::new(camera));

        slot.refresh();
        slot.disable();
        assert!(slot.frame().is_none());

        // Disabled cameras are not polled
        slot.refresh();
        assert!(slot.frame().is_none());
    }

    #[test]
    fn test_pixel_bounds() {
        let f = frame(7);
        assert_eq!(f.pixel(1, 1), Some(7));
        assert_eq!(f.pixel(2, 0), None);
    }
}
