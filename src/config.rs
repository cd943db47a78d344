// Timeouts, topics, link and robot configuration
use std::time::Duration;

use clap::Parser;

use crate::link::serial::DEFAULT_BAUDRATE;
use crate::model::Coord;
use crate::motor::{Geometry, MotorConfig};
use crate::platform::PlatformConfig;

// Control loop period, matches the board's step report period
pub const TICK_PERIOD: Duration = Duration::from_millis(16);

// Input watchdog: axes drop to zero when the operator goes quiet
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Telemetry publishing period
pub const PUBLISH_PERIOD: Duration = Duration::from_millis(100);

// Zenoh topics
pub const TOPIC_INPUT: &str = "diffbot/cmd/input"; // operator input events
pub const TOPIC_TELEMETRY: &str = "diffbot/state/telemetry"; // pose, wheels, task
pub const TOPIC_HEALTH: &str = "diffbot/state/health"; // health status

// Serial port of the peripheral board
pub const SERIAL_PORT: &str = "/dev/ttyAMA0";

// The board wants at least this many frames per transaction
pub const MIN_BATCH: usize = 4;

// Retry interval for intermittently absent peripherals
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

// Task selected at startup
pub const DEFAULT_TASK: &str = "rc";

// Target for the waypoint task, mm in the pose model's frame
pub const DEFAULT_WAYPOINT: Coord = Coord { x: 500.0, y: 0.0 };

/// Differential-drive robot runtime
#[derive(Debug, Parser)]
#[command(version)]
pub struct Cli {
    /// Serial port of the peripheral board
    #[arg(long, default_value = SERIAL_PORT)]
    pub port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    pub baud: u32,

    /// Run against a simulated board instead of the serial link
    #[arg(long)]
    pub simulate: bool,

    /// Minimum frames per link transaction
    #[arg(long, default_value_t = MIN_BATCH)]
    pub min_batch: usize,

    /// Task selected at startup
    #[arg(long, default_value = DEFAULT_TASK)]
    pub task: String,

    /// Peripheral reconnect interval in milliseconds
    #[arg(long, default_value_t = RECONNECT_INTERVAL.as_millis() as u64)]
    pub reconnect_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub port: String,
    pub baud: u32,
    pub simulate: bool,
    pub task: String,
    pub platform: PlatformConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            port: SERIAL_PORT.to_string(),
            baud: DEFAULT_BAUDRATE,
            simulate: false,
            task: DEFAULT_TASK.to_string(),
            platform: PlatformConfig {
                geometry: Geometry::default(),
                motors: MotorConfig::default(),
                min_batch: MIN_BATCH,
                reconnect_interval: RECONNECT_INTERVAL,
            },
        }
    }
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        let defaults = RuntimeConfig::default();
        Self {
            port: cli.port,
            baud: cli.baud,
            simulate: cli.simulate,
            task: cli.task,
            platform: PlatformConfig {
                min_batch: cli.min_batch,
                reconnect_interval: Duration::from_millis(cli.reconnect_ms),
                ..defaults.platform
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let config = RuntimeConfig::from(Cli::parse_from(["diffbot-runtime"]));
        assert_eq!(config.port, SERIAL_PORT);
        assert!(!config.simulate);
        assert_eq!(config.task, "rc");
        assert_eq!(config.platform.min_batch, MIN_BATCH);
        assert_eq!(config.platform.reconnect_interval, RECONNECT_INTERVAL);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "diffbot-runtime",
            "--simulate",
            "--min-batch",
            "0",
            "--task",
            "square",
            "--reconnect-ms",
            "250",
        ]);
        let config = RuntimeConfig::from(cli);
        assert!(config.simulate);
        assert_eq!(config.task, "square");
        assert_eq!(config.platform.min_batch, 0);
        assert_eq!(config.platform.reconnect_interval, Duration::from_millis(250));
    }
}
