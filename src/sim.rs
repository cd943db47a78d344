// Simulated peripheral board for running without hardware
//
// The board keeps the last rate command per wheel and, on every transaction,
// advances each wheel by one report period worth of steps. Fractional steps
// carry over so slow rates still move. Heading is integrated from the same
// steps and exposed as an orientation source.
//
// Like the real board it answers exactly one frame per request frame. Step
// reports go out in the first slots, one per wheel; steps that found no slot
// are owed until a later transaction has room.

use std::f32::consts::TAU;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::link::{Packet, Transport, TransportError};
use crate::model::normalize_angle;
use crate::motor::wire::parse_rate_command;
use crate::motor::{Geometry, MotorConfig, StepReport};
use crate::peripherals::{
    Led, OrientationSource, PeripheralError, Rgba, ServoConnector, Servos, Trigger,
};

#[derive(Debug, Default)]
struct BoardState {
    /// Last commanded rate per wheel (rad/s, board sign)
    rate: [i8; 2],
    residue: [f32; 2],
    /// Steps taken but not yet reported
    owed: [i32; 2],
    heading: f32,
    transactions: u64,
}

#[derive(Clone)]
pub struct SimBoard {
    state: Arc<Mutex<BoardState>>,
    geometry: Geometry,
    motors: MotorConfig,
}

impl SimBoard {
    pub fn new(geometry: Geometry, motors: MotorConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(BoardState::default())),
            geometry,
            motors,
        }
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Orientation source reading the board's integrated heading
    pub fn imu(&self) -> SimImu {
        SimImu {
            state: self.state.clone(),
        }
    }

    pub fn heading(&self) -> f32 {
        self.state().heading
    }

    pub fn transactions(&self) -> u64 {
        self.state().transactions
    }
}

impl Transport for SimBoard {
    fn transact(&mut self, packets: Vec<Packet>) -> Result<Vec<Packet>, TransportError> {
        let steps_per_rev = self.motors.steps_per_rev;
        let dt = self.motors.report_period.as_secs_f32();
        let mut state = self.state();
        state.transactions += 1;

        for packet in packets.iter().filter(|p| !p.is_padding()) {
            match parse_rate_command(packet) {
                Some((wheel, rate)) if (wheel as usize) < state.rate.len() => {
                    state.rate[wheel as usize] = rate;
                }
                _ => debug!("Sim board ignoring packet on endpoint {}", packet.endpoint),
            }
        }

        let mut moved = [0i32; 2];
        for (wheel, steps) in moved.iter_mut().enumerate() {
            let exact = state.rate[wheel] as f32 * steps_per_rev / TAU * dt + state.residue[wheel];
            let whole = exact.trunc();
            state.residue[wheel] = exact - whole;
            *steps = whole as i32;
            state.owed[wheel] += *steps;
        }

        // Wheel A is mounted mirrored, so its board sign is inverted
        let dpr = self.geometry.distance_per_rev;
        let da = -(moved[0] as f32) / steps_per_rev * dpr;
        let db = moved[1] as f32 / steps_per_rev * dpr;
        state.heading = normalize_angle(state.heading + (da - db) / self.geometry.wheelbase);

        let reports = state.owed.len().min(packets.len());
        let mut responses: Vec<Packet> = (0..reports)
            .map(|wheel| {
                let steps = std::mem::take(&mut state.owed[wheel]);
                StepReport::new(wheel as u32, steps).to_packet()
            })
            .collect();
        responses.resize(packets.len(), Packet::padding());
        Ok(responses)
    }
}

pub struct SimImu {
    state: Arc<Mutex<BoardState>>,
}

impl OrientationSource for SimImu {
    fn orientation(&mut self) -> Result<f32, PeripheralError> {
        Ok(self.state.lock().unwrap_or_else(|e| e.into_inner()).heading)
    }
}

pub struct SimServos;

impl Servos for SimServos {
    fn set_pos(&mut self, a: f32, b: f32) -> Result<(), PeripheralError> {
        debug!("Sim servos -> ({:.2}, {:.2})", a, b);
        Ok(())
    }

    fn enable(&mut self, a: bool, b: bool) -> Result<(), PeripheralError> {
        debug!("Sim servos enable ({}, {})", a, b);
        Ok(())
    }
}

pub fn servo_connector() -> ServoConnector {
    Arc::new(|| Ok(Box::new(SimServos) as Box<dyn Servos>))
}

pub struct SimLed;

impl Led for SimLed {
    fn set_color(&mut self, color: Rgba) {
        info!(
            "LED #{:02x}{:02x}{:02x} (alpha {:02x})",
            color.r, color.g, color.b, color.a
        );
    }

    fn set_trigger(&mut self, trigger: Trigger) {
        debug!("LED trigger {:?}", trigger);
    }
}
