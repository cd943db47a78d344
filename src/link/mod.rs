// Packet link to the peripheral board
//
// Provides:
// - The packet shape shared by every logical stream on the link
// - The Transport trait (one batch out, one batch back)
// - A serial implementation and a scripted mock for tests

pub mod mock;
pub mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

/// Endpoint 0 is reserved: padding on the way out, "nothing to say" on the way back
pub const EP_NONE: u8 = 0;

/// One framed packet on the link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pub endpoint: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(endpoint: u8, payload: Vec<u8>) -> Self {
        Self { endpoint, payload }
    }

    /// Empty packet used to pad a batch up to the board's minimum frame count
    pub fn padding() -> Self {
        Self::default()
    }

    pub fn is_padding(&self) -> bool {
        self.endpoint == EP_NONE
    }
}

/// Error types for link transactions
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("Checksum mismatch on endpoint {endpoint}")]
    ChecksumMismatch { endpoint: u8 },

    #[error("Timeout waiting for response frame {index} of {expected}")]
    Timeout { index: usize, expected: usize },

    #[error("Link unavailable: {0}")]
    Unavailable(String),
}

/// Duplex exchange of one batch of packets for one batch of responses
pub trait Transport: Send {
    fn transact(&mut self, packets: Vec<Packet>) -> Result<Vec<Packet>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn transact(&mut self, packets: Vec<Packet>) -> Result<Vec<Packet>, TransportError> {
        (**self).transact(packets)
    }
}
