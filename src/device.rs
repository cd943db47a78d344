// Endpoint multiplexer over the shared packet link
//
// Every logical subsystem registers a receiver for its endpoint and queues
// outbound packets here; one poll per tick exchanges the whole batch.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::link::{EP_NONE, Packet, Transport, TransportError};
use crate::motor::StepReport;

/// Error types for endpoint routing
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Duplicate endpoint {0}")]
    DuplicateEndpoint(u8),

    #[error("Endpoint {0} is reserved")]
    ReservedEndpoint(u8),

    #[error("Received packet for unknown endpoint {0}")]
    UnknownEndpoint(u8),

    #[error("Failed to decode packet on endpoint {endpoint}: {reason}")]
    Decode { endpoint: u8, reason: String },
}

/// Value produced by a receiver for one inbound packet
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Steps(StepReport),
    Raw(Packet),
}

/// Decoder for one endpoint's inbound traffic
pub type Receiver = Box<dyn FnMut(&Packet) -> Result<Report, DeviceError> + Send>;

/// Handle returned by `Device::add`, used to deregister the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    endpoint: u8,
}

impl Component {
    pub fn endpoint(&self) -> u8 {
        self.endpoint
    }
}

/// Packet router sharing one transport among logical endpoints
pub struct Device {
    transport: Box<dyn Transport>,
    receivers: HashMap<u8, Receiver>,
    queue: Vec<Packet>,
    min_batch: usize,
}

impl Device {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::with_min_batch(transport, 0)
    }

    /// Create a device that pads every non-empty batch up to `min_batch` packets
    pub fn with_min_batch(transport: Box<dyn Transport>, min_batch: usize) -> Self {
        Self {
            transport,
            receivers: HashMap::new(),
            queue: Vec::new(),
            min_batch,
        }
    }

    /// Register a receiver for an endpoint
    pub fn add(&mut self, endpoint: u8, receiver: Receiver) -> Result<Component, DeviceError> {
        if endpoint == EP_NONE {
            return Err(DeviceError::ReservedEndpoint(endpoint));
        }
        if self.receivers.contains_key(&endpoint) {
            return Err(DeviceError::DuplicateEndpoint(endpoint));
        }

        debug!("Registered endpoint {}", endpoint);
        self.receivers.insert(endpoint, receiver);
        Ok(Component { endpoint })
    }

    /// Deregister a previously added endpoint
    pub fn remove(&mut self, component: Component) -> Result<(), DeviceError> {
        match self.receivers.remove(&component.endpoint) {
            Some(_) => {
                debug!("Removed endpoint {}", component.endpoint);
                Ok(())
            }
            None => Err(DeviceError::UnknownEndpoint(component.endpoint)),
        }
    }

    /// Append a packet to the outbound queue for the next poll
    pub fn queue(&mut self, packet: Packet) {
        trace!("Queued {} bytes for endpoint {}", packet.payload.len(), packet.endpoint);
        self.queue.push(packet);
    }

    /// Number of packets waiting for the next poll
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn min_batch(&self) -> usize {
        self.min_batch
    }

    /// Exchange the outbound queue for the board's responses
    ///
    /// The queue is taken before the transaction, so on transport failure
    /// this tick's commands are dropped rather than re-sent. Per-packet
    /// routing failures are reported in place and do not abort the batch.
    pub fn poll(&mut self) -> Result<Vec<Result<Report, DeviceError>>, TransportError> {
        let mut batch = std::mem::take(&mut self.queue);
        if !batch.is_empty() && batch.len() < self.min_batch {
            batch.resize(self.min_batch, Packet::padding());
        }

        let responses = self.transport.transact(batch)?;

        Ok(responses
            .iter()
            .filter(|p| !p.is_padding())
            .map(|p| self.receive(p))
            .collect())
    }

    fn receive(&mut self, packet: &Packet) -> Result<Report, DeviceError> {
        match self.receivers.get_mut(&packet.endpoint) {
            Some(receiver) => receiver(packet),
            None => Err(DeviceError::UnknownEndpoint(packet.endpoint)),
        }
    }
}
