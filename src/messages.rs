// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::input::{Button, Press};

// Operator input -> runtime
// Tagged so teleop scripts can send e.g. {"type":"sticks","a":0.5,"b":0.0}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Sticks { a: f32, b: f32 },
    Triggers { l2: f32, r2: f32 },
    Button { button: Button, press: Press },
    SelectTask { name: String },
    // Keeps the input watchdog fed without changing anything
    Heartbeat,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    #[default]
    Ok,
    InputStale,
    LinkDown,
}

// State snapshot runtime -> observers
// Copied out under a lock by the publisher, so keep it plain data
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Telemetry {
    pub tick: u64,
    pub task: Option<String>,
    pub x: f32,
    pub y: f32,
    pub theta: f32,
    pub wheel_velocity: [f32; 2],
    pub wheel_distance: [f32; 2],
    pub commanded_rps: [f32; 2],
    pub boost: crate::platform::Boost,
    pub servos_connected: bool,
    pub battery_low: bool,
    pub health: RuntimeHealth,
}
