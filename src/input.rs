// Operator input collected in the background, drained once per tick
//
// Events arrive on their own schedule (zenoh subscriber task). The control
// loop takes a snapshot each tick: axes are copied, buttons are read and
// cleared, so a press is seen by exactly one tick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::messages::InputEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Cross,
    Square,
    Triangle,
    Circle,
    Ps,
    Share,
    Options,
    L1,
    L2,
    L3,
    R1,
    R2,
    R3,
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Press {
    #[default]
    None,
    Pressed,
    Held,
}

/// Button states for one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buttons(HashMap<Button, Press>);

impl Buttons {
    pub fn get(&self, button: Button) -> Press {
        self.0.get(&button).copied().unwrap_or_default()
    }

    pub fn set(&mut self, button: Button, press: Press) {
        self.0.insert(button, press);
    }

    /// Consume a press so later consumers in the same tick don't see it
    pub fn take_pressed(&mut self, button: Button) -> bool {
        if self.get(button) == Press::Pressed {
            self.0.remove(&button);
            return true;
        }
        false
    }

    pub fn take_held(&mut self, button: Button) -> bool {
        if self.get(button) == Press::Held {
            self.0.remove(&button);
            return true;
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|p| *p == Press::None)
    }
}

/// Everything a behavior sees of the operator in one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    /// Forward stick, [-1, 1]
    pub stick_a: f32,
    /// Turn stick, [-1, 1]
    pub stick_b: f32,
    /// Analog triggers, [0, 1]
    pub l2: f32,
    pub r2: f32,
    pub buttons: Buttons,
}

#[derive(Default)]
struct State {
    snapshot: InputSnapshot,
    task_request: Option<String>,
    last_event: Option<Instant>,
    stale: bool,
}

/// Shared collector: the subscriber side applies events, the loop drains them
#[derive(Clone)]
pub struct Collector {
    state: Arc<Mutex<State>>,
    timeout: Duration,
}

impl Collector {
    /// Axes fall back to zero when no event arrives within `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                stale: true,
                ..State::default()
            })),
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn apply(&self, event: InputEvent) {
        let mut state = self.lock();
        state.last_event = Some(Instant::now());

        match event {
            InputEvent::Sticks { a, b } => {
                state.snapshot.stick_a = a.clamp(-1.0, 1.0);
                state.snapshot.stick_b = b.clamp(-1.0, 1.0);
            }
            InputEvent::Triggers { l2, r2 } => {
                state.snapshot.l2 = l2.clamp(0.0, 1.0);
                state.snapshot.r2 = r2.clamp(0.0, 1.0);
            }
            InputEvent::Button { button, press } => {
                state.snapshot.buttons.set(button, press);
            }
            InputEvent::SelectTask { name } => {
                debug!("Task switch requested: {}", name);
                state.task_request = Some(name);
            }
            InputEvent::Heartbeat => {}
        }
    }

    /// Copy the axes and drain the buttons
    pub fn snapshot(&self) -> InputSnapshot {
        let timeout = self.timeout;
        let mut state = self.lock();

        let stale = state.last_event.is_none_or(|t| t.elapsed() > timeout);
        if stale {
            if !state.stale {
                warn!("Input stale (no event for {:?}), zeroing axes", timeout);
            }
            state.snapshot.stick_a = 0.0;
            state.snapshot.stick_b = 0.0;
            state.snapshot.l2 = 0.0;
            state.snapshot.r2 = 0.0;
        }
        state.stale = stale;

        let snapshot = state.snapshot.clone();
        state.snapshot.buttons = Buttons::default();
        snapshot
    }

    /// Take the pending task switch request, if any
    pub fn take_task_request(&self) -> Option<String> {
        self.lock().task_request.take()
    }

    /// Whether the last snapshot found the input stale
    pub fn stale(&self) -> bool {
        self.lock().stale
    }
}
