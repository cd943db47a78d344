// Status LED
//
// Color and trigger are remembered while no LED is attached and pushed
// out when one shows up.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Idle color: half-brightness green
pub const DEFAULT_COLOR: Rgba = Rgba::new(0x00, 0xff, 0x00, 0x80);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    None,
    Heartbeat,
}

pub trait Led: Send {
    fn set_color(&mut self, color: Rgba);
    fn set_trigger(&mut self, trigger: Trigger);
}

pub struct LedState {
    led: Option<Box<dyn Led>>,
    color: Rgba,
    trigger: Trigger,
}

impl Default for LedState {
    fn default() -> Self {
        Self {
            led: None,
            color: DEFAULT_COLOR,
            trigger: Trigger::Heartbeat,
        }
    }
}

impl LedState {
    pub fn attach(&mut self, led: Box<dyn Led>) {
        self.led = Some(led);
        self.push_trigger();
        self.push_color();
    }

    pub fn set_color(&mut self, color: Rgba) {
        self.color = color;
        self.push_color();
    }

    pub fn set_trigger(&mut self, trigger: Trigger) {
        self.trigger = trigger;
        self.push_trigger();
    }

    /// Back to heartbeat + idle color
    pub fn reset(&mut self) {
        self.set_trigger(Trigger::Heartbeat);
        self.set_color(DEFAULT_COLOR);
    }

    pub fn color(&self) -> Rgba {
        self.color
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    fn push_color(&mut self) {
        if let Some(led) = self.led.as_mut() {
            led.set_color(self.color);
        }
    }

    fn push_trigger(&mut self) {
        if let Some(led) = self.led.as_mut() {
            led.set_trigger(self.trigger);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingLed(Arc<Mutex<Vec<String>>>);

    impl Led for RecordingLed {
        fn set_color(&mut self, color: Rgba) {
            self.0.lock().unwrap().push(format!("color {:?}", color));
        }
        fn set_trigger(&mut self, trigger: Trigger) {
            self.0.lock().unwrap().push(format!("trigger {:?}", trigger));
        }
    }

    #[test]
    fn test_setters_noop_without_led() {
        let mut state = LedState::default();
        state.set_color(Rgba::new(1, 2, 3, 4));
        state.set_trigger(Trigger::None);
        assert_eq!(state.color(), Rgba::new(1, 2, 3, 4));
        assert_eq!(state.trigger(), Trigger::None);
    }

    #[test]
    fn test_attach_pushes_remembered_state() {
        let led = RecordingLed::default();
        let mut state = LedState::default();
        state.set_color(Rgba::new(0xff, 0, 0, 0x80));

        state.attach(Box::new(led.clone()));
        let log = led.0.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "trigger Heartbeat".to_string(),
                format!("color {:?}", Rgba::new(0xff, 0, 0, 0x80)),
            ]
        );
    }

    #[test]
    fn test_reset_restores_default() {
        let mut state = LedState::default();
        state.set_color(Rgba::new(9, 9, 9, 9));
        state.set_trigger(Trigger::None);
        state.reset();
        assert_eq!(state.color(), DEFAULT_COLOR);
        assert_eq!(state.trigger(), Trigger::Heartbeat);
    }
}
