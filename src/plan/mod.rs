// Behavior selection
//
// Exactly one task is active at a time. Tasks come in two tiers: tick-only,
// and tasks that also want Enter/Exit around their active period. The tier is
// fixed when the task is registered, so switching never needs to inspect the
// task's type.

pub mod bounce;
pub mod heading;
pub mod idle;
pub mod line;
pub mod menu;
pub mod rc;
pub mod square;
pub mod waypoint;

use std::collections::HashMap;

use tracing::info;

use crate::input::InputSnapshot;
use crate::peripherals::Rgba;

pub use bounce::{BounceTask, HorizonDetector, RowStepHorizon};
pub use heading::{ArcCommand, HeadingConfig, HeadingController};
pub use idle::IdleTask;
pub use line::{ContrastDetector, LineDetector, LineFit, LineTask};
pub use menu::{Direction, Menu, MenuAction};
pub use rc::RcTask;
pub use square::SquareTask;
pub use waypoint::WaypointTask;

/// Error types for task selection
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlannerError {
    #[error("Duplicate task name '{0}'")]
    DuplicateTaskName(String),

    #[error("Unknown task '{0}'")]
    UnknownTask(String),
}

/// A behavior ticked once per control cycle while active
///
/// `C` is the context handed to every call; for the robot that is
/// [`crate::robot::Robot`].
pub trait Task<C>: Send {
    /// The task may consume buttons from `input` so nothing later in the
    /// tick acts on the same press.
    fn tick(&mut self, ctx: &mut C, input: &mut InputSnapshot);

    /// LED color shown while this task is active
    fn color(&self) -> Option<Rgba> {
        None
    }
}

/// A task that sets up and tears down resources around its active period
pub trait LifecycleTask<C>: Task<C> {
    fn enter(&mut self, ctx: &mut C);
    fn exit(&mut self, ctx: &mut C);
}

pub enum TaskHandle<C> {
    Basic(Box<dyn Task<C>>),
    Lifecycle(Box<dyn LifecycleTask<C>>),
}

impl<C> TaskHandle<C> {
    pub fn basic(task: impl Task<C> + 'static) -> Self {
        TaskHandle::Basic(Box::new(task))
    }

    pub fn lifecycle(task: impl LifecycleTask<C> + 'static) -> Self {
        TaskHandle::Lifecycle(Box::new(task))
    }

    fn tick(&mut self, ctx: &mut C, input: &mut InputSnapshot) {
        match self {
            TaskHandle::Basic(task) => task.tick(ctx, input),
            TaskHandle::Lifecycle(task) => task.tick(ctx, input),
        }
    }

    fn color(&self) -> Option<Rgba> {
        match self {
            TaskHandle::Basic(task) => task.color(),
            TaskHandle::Lifecycle(task) => task.color(),
        }
    }

    fn enter(&mut self, ctx: &mut C) {
        if let TaskHandle::Lifecycle(task) = self {
            task.enter(ctx);
        }
    }

    fn exit(&mut self, ctx: &mut C) {
        if let TaskHandle::Lifecycle(task) = self {
            task.exit(ctx);
        }
    }
}

pub struct Planner<C> {
    tasks: HashMap<String, TaskHandle<C>>,
    current: Option<String>,
}

impl<C> Default for Planner<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Planner<C> {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            current: None,
        }
    }

    pub fn add_task(&mut self, name: &str, task: TaskHandle<C>) -> Result<(), PlannerError> {
        if self.tasks.contains_key(name) {
            return Err(PlannerError::DuplicateTaskName(name.to_string()));
        }
        self.tasks.insert(name.to_string(), task);
        Ok(())
    }

    /// Switch to `name`, exiting the outgoing task before entering the new one
    ///
    /// Selecting the active task again runs its Exit then Enter.
    pub fn set_task(&mut self, name: &str, ctx: &mut C) -> Result<(), PlannerError> {
        if !self.tasks.contains_key(name) {
            return Err(PlannerError::UnknownTask(name.to_string()));
        }

        if let Some(outgoing) = self.current.take() {
            if let Some(task) = self.tasks.get_mut(&outgoing) {
                task.exit(ctx);
            }
        }

        info!("Task -> {}", name);
        if let Some(task) = self.tasks.get_mut(name) {
            task.enter(ctx);
        }
        self.current = Some(name.to_string());

        Ok(())
    }

    pub fn tick(&mut self, ctx: &mut C, input: &mut InputSnapshot) {
        let Some(name) = self.current.as_deref() else {
            return;
        };
        if let Some(task) = self.tasks.get_mut(name) {
            task.tick(ctx, input);
        }
    }

    pub fn current_task(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// LED color of the active task
    pub fn current_color(&self) -> Option<Rgba> {
        self.current
            .as_deref()
            .and_then(|name| self.tasks.get(name))
            .and_then(|task| task.color())
    }

    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
