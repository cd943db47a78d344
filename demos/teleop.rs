// Keyboard teleop: WASD drive, R/F speed, T triangle, Space cross, arrows menu, 1-7 task, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use diffbot_runtime::config::TOPIC_INPUT;
use diffbot_runtime::input::{Button, Press};
use diffbot_runtime::messages::InputEvent;
use std::time::{Duration, Instant};
use tracing::info;

const SPEEDS: [f32; 3] = [0.25, 0.5, 1.0]; // fraction of full stick
const TASKS: [&str; 7] = ["idle", "rc", "heading", "square", "waypoint", "line", "bounce"];
const INPUT_TIMEOUT_MS: u64 = 100; // Center sticks after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_INPUT).await?;

    info!("Controls: WASD=drive, R/F=speed, T=triangle, Space=cross, Q=quit");
    info!("Menu: hold an arrow to preview, Space to pick");
    for (i, name) in TASKS.iter().enumerate() {
        info!("  {} -> {}", i + 1, name);
    }
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn send(
    publisher: &zenoh::pubsub::Publisher<'_>,
    event: &InputEvent,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    publisher.put(serde_json::to_string(event)?).await?;
    Ok(())
}

fn press(button: Button) -> InputEvent {
    InputEvent::Button {
        button,
        press: Press::Pressed,
    }
}

// Arrow keys act as the D-pad with L1 held
async fn hold_menu(
    publisher: &zenoh::pubsub::Publisher<'_>,
    dir: Button,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    for button in [Button::L1, dir] {
        let event = InputEvent::Button {
            button,
            press: Press::Held,
        };
        send(publisher, &event).await?;
    }
    Ok(())
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    // Persistent stick state
    let mut stick_a = 0.0;
    let mut stick_b = 0.0;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Movement - update stick and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        stick_a = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        stick_a = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        stick_b = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        stick_b = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Buttons
                    KeyCode::Char('t') if pressed => send(publisher, &press(Button::Triangle)).await?,
                    KeyCode::Char(' ') if pressed => send(publisher, &press(Button::Cross)).await?,

                    // Menu
                    KeyCode::Up if pressed => hold_menu(publisher, Button::Up).await?,
                    KeyCode::Down if pressed => hold_menu(publisher, Button::Down).await?,
                    KeyCode::Left if pressed => hold_menu(publisher, Button::Left).await?,
                    KeyCode::Right if pressed => hold_menu(publisher, Button::Right).await?,

                    // Task selection
                    KeyCode::Char(c @ '1'..='7') if pressed => {
                        let name = TASKS[c as usize - '1' as usize];
                        info!("Task: {}", name);
                        let event = InputEvent::SelectTask {
                            name: name.to_string(),
                        };
                        send(publisher, &event).await?;
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Center sticks if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            stick_a = 0.0;
            stick_b = 0.0;
        }

        // Always publish at ~50Hz, this also feeds the runtime's watchdog
        send(
            publisher,
            &InputEvent::Sticks {
                a: stick_a,
                b: stick_b,
            },
        )
        .await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
