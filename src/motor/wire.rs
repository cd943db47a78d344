// Motor payloads on the packet link
//
// Rate command (EP_RATE_COMMAND):  [wheel_id: u8, rate: i8]        rad/s
// Step report  (EP_STEP_REPORT):   [wheel_id: u32 LE, steps: i32 LE]

use crate::device::{DeviceError, Report};
use crate::link::Packet;

/// Endpoint carrying per-wheel rate commands to the board
pub const EP_RATE_COMMAND: u8 = 0x01;

/// Endpoint carrying per-wheel step deltas back from the board
pub const EP_STEP_REPORT: u8 = 0x12;

/// Wheel ids as the board numbers them
pub const WHEEL_A: u8 = 0;
pub const WHEEL_B: u8 = 1;

const STEP_REPORT_LEN: usize = 8;

/// Signed step delta for one wheel since the previous report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub wheel_id: u32,
    pub steps: i32,
}

impl StepReport {
    pub fn new(wheel_id: u32, steps: i32) -> Self {
        Self { wheel_id, steps }
    }

    /// Encode as the board would send it
    pub fn to_packet(&self) -> Packet {
        let mut payload = Vec::with_capacity(STEP_REPORT_LEN);
        payload.extend_from_slice(&self.wheel_id.to_le_bytes());
        payload.extend_from_slice(&self.steps.to_le_bytes());
        Packet::new(EP_STEP_REPORT, payload)
    }
}

/// Build a rate command packet (rad/s, already rounded and sign-corrected)
pub fn rate_command(wheel_id: u8, rate: i8) -> Packet {
    Packet::new(EP_RATE_COMMAND, vec![wheel_id, rate as u8])
}

/// Decode a rate command (used by the simulated board)
pub fn parse_rate_command(packet: &Packet) -> Option<(u8, i8)> {
    match packet.payload.as_slice() {
        [wheel, rate] if packet.endpoint == EP_RATE_COMMAND => Some((*wheel, *rate as i8)),
        _ => None,
    }
}

/// Receiver for the step report endpoint
pub fn decode_step_report(packet: &Packet) -> Result<Report, DeviceError> {
    let payload = packet.payload.as_slice();
    if payload.len() < STEP_REPORT_LEN {
        return Err(DeviceError::Decode {
            endpoint: packet.endpoint,
            reason: format!("Expected {} bytes, got {}", STEP_REPORT_LEN, payload.len()),
        });
    }

    let wheel_id = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let steps = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);

    Ok(Report::Steps(StepReport { wheel_id, steps }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_command_layout() {
        let packet = rate_command(WHEEL_A, -6);
        assert_eq!(packet.endpoint, EP_RATE_COMMAND);
        assert_eq!(packet.payload, vec![0, 0xFA]);
        assert_eq!(parse_rate_command(&packet), Some((WHEEL_A, -6)));
    }

    #[test]
    fn test_decode_step_report_little_endian() {
        // wheel 1, -10 steps
        let packet = Packet::new(EP_STEP_REPORT, vec![1, 0, 0, 0, 0xF6, 0xFF, 0xFF, 0xFF]);
        let report = decode_step_report(&packet).unwrap();
        assert_eq!(report, Report::Steps(StepReport::new(1, -10)));
    }

    #[test]
    fn test_decode_short_step_report() {
        let packet = Packet::new(EP_STEP_REPORT, vec![1, 0, 0]);
        assert!(matches!(
            decode_step_report(&packet),
            Err(DeviceError::Decode { endpoint: EP_STEP_REPORT, .. })
        ));
    }

    #[test]
    fn test_parse_rate_command_rejects_other_endpoints() {
        assert_eq!(parse_rate_command(&Packet::new(2, vec![0, 1])), None);
    }
}
