// Servo pair with best-effort delivery
//
// Commands are dropped while the servo board is absent. A failed
// transaction invalidates the handle and starts a background reconnect;
// the fresh handle is installed the next time the platform drains it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::PeripheralError;
use crate::reconnect::Reconnector;

pub trait Servos: Send {
    /// Positions in [0, 1]
    fn set_pos(&mut self, a: f32, b: f32) -> Result<(), PeripheralError>;
    fn enable(&mut self, a: bool, b: bool) -> Result<(), PeripheralError>;
}

/// Opens the servo board; called again on every reconnect attempt
pub type ServoConnector =
    Arc<dyn Fn() -> Result<Box<dyn Servos>, PeripheralError> + Send + Sync>;

pub struct ServoLink {
    servos: Option<Box<dyn Servos>>,
    connector: Option<ServoConnector>,
    reconnect: Reconnector<Box<dyn Servos>>,
}

/// Open and bring the board to a known state: centred and enabled
fn open(connector: &ServoConnector) -> Result<Box<dyn Servos>, PeripheralError> {
    let mut servos = connector()?;
    servos.set_pos(0.0, 0.0)?;
    servos.enable(true, true)?;
    Ok(servos)
}

impl ServoLink {
    pub fn new(reconnect_interval: Duration) -> Self {
        Self {
            servos: None,
            connector: None,
            reconnect: Reconnector::new(reconnect_interval),
        }
    }

    /// Try to open the board now; on failure keep retrying in the background
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&mut self, connector: ServoConnector) -> bool {
        self.connector = Some(connector.clone());
        match open(&connector) {
            Ok(servos) => {
                info!("Servos connected");
                self.servos = Some(servos);
                true
            }
            Err(e) => {
                warn!("Couldn't get servos: {}", e);
                self.schedule_reconnect();
                false
            }
        }
    }

    pub fn connected(&self) -> bool {
        self.servos.is_some()
    }

    pub fn reconnecting(&self) -> bool {
        self.reconnect.pending()
    }

    /// Install a reconnected board if the supervisor handed one back
    pub fn poll_reconnect(&mut self) -> bool {
        match self.reconnect.take() {
            Some(servos) => {
                info!("Servos reconnected");
                self.servos = Some(servos);
                true
            }
            None => false,
        }
    }

    pub fn set_pos(&mut self, a: f32, b: f32) {
        self.transact(|s| s.set_pos(a, b));
    }

    pub fn enable(&mut self, a: bool, b: bool) {
        self.transact(|s| s.enable(a, b));
    }

    fn transact<F>(&mut self, op: F)
    where
        F: FnOnce(&mut dyn Servos) -> Result<(), PeripheralError>,
    {
        let Some(servos) = self.servos.as_mut() else {
            return;
        };

        if let Err(e) = op(servos.as_mut()) {
            warn!("Servo command failed, dropping handle: {}", e);
            self.servos = None;
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        let Some(connector) = self.connector.clone() else {
            return;
        };
        info!("Scheduling servo reconnect every {:?}", self.reconnect.interval());
        self.reconnect.schedule(move || match open(&connector) {
            Ok(servos) => Some(servos),
            Err(e) => {
                warn!("Couldn't get servos: {}", e);
                None
            }
        });
    }
}
