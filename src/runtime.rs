// 16 ms control loop
//
// Each tick: exchange packets with the board and update the pose, take the
// operator input, apply any task switch (requested or picked from the D-pad
// menu), tick the active task. Input arrives
// on its own task through the collector; telemetry leaves on its own task
// through a shared snapshot, so neither can stall the control tick.

use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::config::{
    CMD_TIMEOUT, DEFAULT_WAYPOINT, PUBLISH_PERIOD, RuntimeConfig, TICK_PERIOD, TOPIC_HEALTH,
    TOPIC_INPUT, TOPIC_TELEMETRY,
};
use crate::input::Collector;
use crate::link::SerialTransport;
use crate::messages::{InputEvent, RuntimeHealth, Telemetry};
use crate::peripherals::{Rgba, Trigger};
use crate::plan::{
    BounceTask, ContrastDetector, Direction, HeadingConfig, HeadingController, IdleTask, LineTask,
    Menu, MenuAction, Planner, PlannerError, RcTask, RowStepHorizon, SquareTask, TaskHandle,
    WaypointTask,
};
use crate::platform::Platform;
use crate::robot::Robot;
use crate::sim::{self, SimBoard, SimLed};

type BoxError = Box<dyn Error + Send + Sync>;

/// Register every behavior under its operator-facing name
pub fn build_planner() -> Result<Planner<Robot>, PlannerError> {
    let heading = HeadingConfig::default();
    let mut planner = Planner::new();

    planner.add_task("idle", TaskHandle::basic(IdleTask))?;
    planner.add_task("rc", TaskHandle::lifecycle(RcTask::new()))?;
    planner.add_task("heading", TaskHandle::basic(HeadingController::new(heading)))?;
    planner.add_task("square", TaskHandle::lifecycle(SquareTask::new(heading)))?;
    planner.add_task(
        "waypoint",
        TaskHandle::basic(WaypointTask::new(DEFAULT_WAYPOINT, heading)),
    )?;
    planner.add_task(
        "line",
        TaskHandle::lifecycle(LineTask::new(Box::new(ContrastDetector::default()))),
    )?;
    planner.add_task(
        "bounce",
        TaskHandle::lifecycle(BounceTask::new(Box::new(RowStepHorizon::default()), heading)),
    )?;

    Ok(planner)
}

/// D-pad shortcuts for the autonomous tasks, shown in each task's color
pub fn build_menu() -> Menu {
    let mut menu = Menu::new();
    menu.add_item(Direction::North, Rgba::new(0xff, 0xff, 0x00, 0x80), "line");
    menu.add_item(Direction::East, Rgba::new(0xf4, 0x42, 0x86, 0x80), "square");
    menu.add_item(Direction::South, Rgba::new(0xf4, 0x9e, 0x42, 0x80), "waypoint");
    menu.add_item(Direction::West, Rgba::new(0xff, 0x00, 0xff, 0x80), "bounce");
    menu
}

/// Bring up the platform on the serial link, or on the simulated board
///
/// Must be called from within a tokio runtime (servo reconnects are spawned).
pub fn build_robot(config: &RuntimeConfig) -> Result<Robot, BoxError> {
    let platform = if config.simulate {
        info!("Simulated board");
        let board = SimBoard::new(config.platform.geometry, config.platform.motors);
        let imu = board.imu();

        let mut platform = Platform::new(Box::new(board), config.platform)?;
        platform.attach_orientation(Box::new(imu));
        platform.attach_led(Box::new(SimLed));
        platform.connect_servos(sim::servo_connector());
        platform
    } else {
        let link = SerialTransport::open_with_baudrate(&config.port, config.baud)?;
        Platform::new(Box::new(link), config.platform)?
    };

    Ok(Robot::new(platform))
}

pub struct Runtime {
    robot: Robot,
    planner: Planner<Robot>,
    menu: Menu,
    collector: Collector,
    tick: u64,
}

impl Runtime {
    pub fn new(robot: Robot, planner: Planner<Robot>, collector: Collector) -> Self {
        Self {
            robot,
            planner,
            menu: build_menu(),
            collector,
            tick: 0,
        }
    }

    /// Switch tasks and show the new task's color; failures are only logged
    pub fn select_task(&mut self, name: &str) {
        match self.planner.set_task(name, &mut self.robot) {
            Ok(()) => self.show_task_led(),
            Err(e) => warn!("Couldn't switch task: {}", e),
        }
    }

    fn show_task_led(&mut self) {
        let platform = &mut self.robot.platform;
        match self.planner.current_color() {
            Some(color) => {
                platform.set_led_trigger(Trigger::Heartbeat);
                platform.set_led_color(color);
            }
            None => platform.reset_led(),
        }
    }

    /// Run one control tick and return the resulting snapshot
    pub fn step(&mut self) -> Telemetry {
        self.tick += 1;

        // Feedback must be applied before anything reads the pose
        let link_ok = match self.robot.update() {
            Ok(()) => true,
            Err(e) => {
                warn!("Link transaction failed: {}", e);
                false
            }
        };

        let mut input = self.collector.snapshot();
        if let Some(name) = self.collector.take_task_request() {
            self.select_task(&name);
        }
        match self.menu.tick(&mut self.robot.platform, &mut input) {
            Some(MenuAction::Pick(name)) => self.select_task(&name),
            Some(MenuAction::Dismiss) => self.show_task_led(),
            None => {}
        }
        self.planner.tick(&mut self.robot, &mut input);

        let health = if !link_ok {
            RuntimeHealth::LinkDown
        } else if self.collector.stale() {
            RuntimeHealth::InputStale
        } else {
            RuntimeHealth::Ok
        };
        self.telemetry(health)
    }

    /// `step` from async code: moves the blocking serial exchange off the
    /// worker so other tasks keep running. Needs the multi-threaded runtime.
    pub fn step_blocking(&mut self) -> Telemetry {
        tokio::task::block_in_place(|| self.step())
    }

    fn telemetry(&self, health: RuntimeHealth) -> Telemetry {
        let platform = &self.robot.platform;
        let (pos, theta) = self.robot.model.pose();
        let (va, vb) = platform.get_velocity();
        let (da, db) = platform.get_distance();
        let (ra, rb) = platform.commanded_rps();

        Telemetry {
            tick: self.tick,
            task: self.planner.current_task().map(str::to_string),
            x: pos.x,
            y: pos.y,
            theta,
            wheel_velocity: [va, vb],
            wheel_distance: [da, db],
            commanded_rps: [ra, rb],
            boost: platform.boost(),
            servos_connected: platform.servos_connected(),
            battery_low: platform.battery_low(),
            health,
        }
    }

    /// Stop the wheels and push the command out
    pub fn shutdown(&mut self) {
        self.select_task("idle");
        self.robot.platform.set_velocity(0.0, 0.0);
        if let Err(e) = self.robot.update() {
            warn!("Couldn't stop motors: {}", e);
        }
    }
}

fn lock(shared: &Mutex<Telemetry>) -> MutexGuard<'_, Telemetry> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Feed operator input events into the collector until the session closes
async fn receive_input(session: zenoh::Session, collector: Collector) -> Result<(), BoxError> {
    let subscriber = session.declare_subscriber(TOPIC_INPUT).await?;
    info!("Subscribed to: {}", TOPIC_INPUT);

    while let Ok(sample) = subscriber.recv_async().await {
        let payload = sample.payload().to_bytes();
        match serde_json::from_slice::<InputEvent>(&payload) {
            Ok(event) => collector.apply(event),
            Err(e) => warn!("Failed to parse input event: {}", e),
        }
    }
    Ok(())
}

/// Publish the latest snapshot at its own rate
async fn publish_state(
    session: zenoh::Session,
    shared: Arc<Mutex<Telemetry>>,
) -> Result<(), BoxError> {
    let pub_telemetry = session.declare_publisher(TOPIC_TELEMETRY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;
    info!("Publishing to: {}, {}", TOPIC_TELEMETRY, TOPIC_HEALTH);

    let mut tick = interval(PUBLISH_PERIOD);
    loop {
        tick.tick().await;

        // Copy out, then release the lock before awaiting
        let snapshot = lock(&shared).clone();

        pub_telemetry.put(serde_json::to_string(&snapshot)?).await?;
        pub_health.put(serde_json::to_string(&snapshot.health)?).await?;
    }
}

/// Needs the multi-threaded tokio runtime: each tick blocks on serial I/O.
pub async fn run(config: RuntimeConfig) -> Result<(), BoxError> {
    let robot = build_robot(&config)?;
    let planner = build_planner()?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    let collector = Collector::new(CMD_TIMEOUT);
    let shared = Arc::new(Mutex::new(Telemetry::default()));

    let input = {
        let (session, collector) = (session.clone(), collector.clone());
        tokio::spawn(async move {
            if let Err(e) = receive_input(session, collector).await {
                error!("Input task stopped: {}", e);
            }
        })
    };
    let publisher = {
        let (session, shared) = (session.clone(), shared.clone());
        tokio::spawn(async move {
            if let Err(e) = publish_state(session, shared).await {
                error!("Publisher task stopped: {}", e);
            }
        })
    };

    let mut runtime = Runtime::new(robot, planner, collector);
    runtime.select_task(&config.task);

    let mut tick = interval(TICK_PERIOD);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Runtime started: {}ms tick, {}ms input watchdog",
        TICK_PERIOD.as_millis(),
        CMD_TIMEOUT.as_millis()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }

        // Serial reads block for up to a frame timeout each
        let telemetry = runtime.step_blocking();
        *lock(&shared) = telemetry;
    }

    tokio::task::block_in_place(|| runtime.shutdown());
    input.abort();
    publisher.abort();
    session.close().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Button, Press};
    use crate::peripherals::DEFAULT_COLOR;
    use crate::robot::testing::robot;
    use std::time::Duration;

    fn runtime() -> (crate::link::MockTransport, Collector, Runtime) {
        let (mock, robot) = robot();
        let collector = Collector::new(Duration::from_secs(60));
        let runtime = Runtime::new(robot, build_planner().unwrap(), collector.clone());
        (mock, collector, runtime)
    }

    #[test]
    fn test_all_tasks_registered() {
        let planner = build_planner().unwrap();
        assert_eq!(
            planner.task_names(),
            vec!["bounce", "heading", "idle", "line", "rc", "square", "waypoint"]
        );
    }

    #[test]
    fn test_rc_follows_sticks() {
        let (_mock, collector, mut runtime) = runtime();
        runtime.select_task("rc");
        collector.apply(InputEvent::Sticks { a: 1.0, b: 0.0 });

        let telemetry = runtime.step();
        assert_eq!(telemetry.task.as_deref(), Some("rc"));
        assert_eq!(telemetry.health, RuntimeHealth::Ok);
        assert!(telemetry.commanded_rps[0] > 4.0);
        assert!(telemetry.commanded_rps[1] > 4.0);
    }

    #[test]
    fn test_task_request_switches_and_colors() {
        let (_mock, collector, mut runtime) = runtime();
        runtime.select_task("rc");

        collector.apply(InputEvent::SelectTask {
            name: "square".to_string(),
        });
        let telemetry = runtime.step();
        assert_eq!(telemetry.task.as_deref(), Some("square"));
        assert_ne!(runtime.robot.platform.led().color(), DEFAULT_COLOR);

        // Unknown names are logged and ignored
        collector.apply(InputEvent::SelectTask {
            name: "dance".to_string(),
        });
        assert_eq!(runtime.step().task.as_deref(), Some("square"));

        // Tasks without a color fall back to the idle color
        runtime.select_task("idle");
        assert_eq!(runtime.robot.platform.led().color(), DEFAULT_COLOR);
    }

    #[test]
    fn test_link_failure_reported_and_survived() {
        let (mock, _collector, mut runtime) = runtime();
        mock.fail_next("unplugged");
        assert_eq!(runtime.step().health, RuntimeHealth::LinkDown);
        assert_ne!(runtime.step().health, RuntimeHealth::LinkDown);
    }

    #[test]
    fn test_stale_input_reported() {
        let (_mock, _collector, mut runtime) = runtime();
        assert_eq!(runtime.step().health, RuntimeHealth::InputStale);
    }

    #[test]
    fn test_shutdown_stops_motors() {
        let (mock, collector, mut runtime) = runtime();
        runtime.select_task("rc");
        collector.apply(InputEvent::Sticks { a: 0.5, b: 0.0 });
        runtime.step();

        runtime.shutdown();
        assert_eq!(runtime.step().commanded_rps, [0.0, 0.0]);
        assert_eq!(runtime.step().task.as_deref(), Some("idle"));
        assert!(mock.transactions() >= 3);
    }

    #[test]
    fn test_menu_picks_task() {
        let (_mock, collector, mut runtime) = runtime();
        runtime.select_task("rc");

        for (button, press) in [
            (Button::L1, Press::Held),
            (Button::Up, Press::Held),
            (Button::Cross, Press::Pressed),
        ] {
            collector.apply(InputEvent::Button { button, press });
        }
        let telemetry = runtime.step();
        assert_eq!(telemetry.task.as_deref(), Some("line"));
        assert_eq!(runtime.robot.platform.led().color(), Rgba::new(0xff, 0xff, 0x00, 0x80));

        // The pick's Cross never reached the new task
        for _ in 0..20 {
            runtime.step();
        }
        assert_eq!(runtime.robot.platform.led().trigger(), Trigger::Heartbeat);
        assert_eq!(runtime.robot.platform.commanded_rps(), (0.0, 0.0));
    }

    #[test]
    fn test_menu_names_registered_tasks() {
        let (_mock, collector, mut runtime) = runtime();
        for dir in [Button::Up, Button::Right, Button::Down, Button::Left] {
            runtime.select_task("idle");
            for (button, press) in [
                (Button::L1, Press::Held),
                (dir, Press::Held),
                (Button::Cross, Press::Pressed),
            ] {
                collector.apply(InputEvent::Button { button, press });
            }
            assert_ne!(runtime.step().task.as_deref(), Some("idle"), "{:?}", dir);
        }
    }

    struct LowBattery;

    impl crate::peripherals::BatteryMonitor for LowBattery {
        fn low(&mut self) -> Result<bool, crate::peripherals::PeripheralError> {
            Ok(true)
        }
    }

    #[test]
    fn test_low_battery_reported() {
        let (_mock, _collector, mut runtime) = runtime();
        runtime.robot.platform.attach_battery(Box::new(LowBattery));
        runtime.select_task("square");

        assert!(runtime.step().battery_low);
        assert_eq!(
            runtime.robot.platform.led().color(),
            crate::platform::LOW_BATTERY_COLOR
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_step_on_worker_runtime() {
        let (_mock, collector, mut runtime) = runtime();
        runtime.select_task("rc");

        let feeder = {
            let collector = collector.clone();
            tokio::spawn(async move {
                collector.apply(InputEvent::Sticks { a: 1.0, b: 0.0 });
            })
        };
        feeder.await.unwrap();

        let telemetry = runtime.step_blocking();
        assert_eq!(telemetry.tick, 1);
        assert!(telemetry.commanded_rps[1] > 4.0);
    }
}
