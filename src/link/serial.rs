// Framed serial link to the peripheral board
//
// Frame format: [0xFF, 0xFF, Endpoint, Length, Payload..., Checksum]
// The board answers every request frame with exactly one response frame,
// so padding frames double as slots for feedback traffic.

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

use super::{Packet, Transport, TransportError};

/// Default serial configuration for the peripheral board
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 20;

/// Frame header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Largest payload a single frame can carry (length is one byte)
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

pub type Result<T> = std::result::Result<T, TransportError>;

/// Serial transport - handles framing and the request/response exchange
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a new connection to the board
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        info!("Opening packet link on {} @ {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Calculate checksum for a frame (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u32 = data.iter().map(|&b| b as u32).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a frame with header and checksum
    fn build_frame(packet: &Packet) -> Result<Vec<u8>> {
        if packet.payload.len() > MAX_PAYLOAD {
            return Err(TransportError::InvalidFrame {
                reason: format!(
                    "payload of {} bytes on endpoint {} exceeds {}",
                    packet.payload.len(),
                    packet.endpoint,
                    MAX_PAYLOAD
                ),
            });
        }

        let mut frame = Vec::with_capacity(5 + packet.payload.len());
        frame.extend_from_slice(&HEADER);
        frame.push(packet.endpoint);
        frame.push(packet.payload.len() as u8);
        frame.extend_from_slice(&packet.payload);

        // Checksum over endpoint, length, payload
        let checksum = Self::checksum(&frame[2..]);
        frame.push(checksum);

        Ok(frame)
    }

    /// Parse one complete frame (header included)
    fn parse_frame(frame: &[u8]) -> Result<Packet> {
        if frame.len() < 5 || frame[..2] != HEADER {
            return Err(TransportError::InvalidFrame {
                reason: format!("Invalid header: {:02X?}", &frame[..frame.len().min(2)]),
            });
        }

        let endpoint = frame[2];
        let length = frame[3] as usize;
        if frame.len() != length + 5 {
            return Err(TransportError::InvalidFrame {
                reason: format!("Length mismatch: header says {}, got {}", length, frame.len() - 5),
            });
        }

        let body = &frame[2..frame.len() - 1];
        if Self::checksum(body) != frame[frame.len() - 1] {
            return Err(TransportError::ChecksumMismatch { endpoint });
        }

        Ok(Packet::new(endpoint, frame[4..4 + length].to_vec()))
    }

    /// Read exactly one response frame from the port
    fn read_frame(&mut self, index: usize, expected: usize) -> Result<Packet> {
        let timeout = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                TransportError::Timeout { index, expected }
            } else {
                TransportError::Io(e)
            }
        };

        let mut head = [0u8; 4];
        self.port.read_exact(&mut head).map_err(timeout)?;

        let length = head[3] as usize;
        let mut rest = vec![0u8; length + 1];
        self.port.read_exact(&mut rest).map_err(timeout)?;

        let mut frame = head.to_vec();
        frame.extend_from_slice(&rest);
        Self::parse_frame(&frame)
    }
}

impl Transport for SerialTransport {
    fn transact(&mut self, packets: Vec<Packet>) -> Result<Vec<Packet>> {
        if packets.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for packet in &packets {
            out.extend_from_slice(&Self::build_frame(packet)?);
        }
        self.port.write_all(&out)?;
        self.port.flush()?;
        debug!("Sent {} frames ({} bytes)", packets.len(), out.len());

        let expected = packets.len();
        (0..expected)
            .map(|index| self.read_frame(index, expected))
            .collect()
    }
}
