// Scripted transport for tests
//
// Clones share the same script and log, so a test can keep one handle
// while the device owns the other.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Packet, Transport, TransportError};

enum Reply {
    Packets(Vec<Packet>),
    Fail(String),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    sent: Vec<Vec<Packet>>,
}

/// Transport that records every batch and replays queued responses
///
/// With nothing queued it answers every transaction with an empty batch.
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread must not hide the log from the next assertion
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the response for the next transaction
    pub fn respond(&self, packets: Vec<Packet>) {
        self.script().replies.push_back(Reply::Packets(packets));
    }

    /// Make the next transaction fail
    pub fn fail_next(&self, reason: &str) {
        self.script().replies.push_back(Reply::Fail(reason.to_string()));
    }

    /// Every batch transacted so far, oldest first
    pub fn sent(&self) -> Vec<Vec<Packet>> {
        self.script().sent.clone()
    }

    pub fn transactions(&self) -> usize {
        self.script().sent.len()
    }
}

impl Transport for MockTransport {
    fn transact(&mut self, packets: Vec<Packet>) -> Result<Vec<Packet>, TransportError> {
        let mut script = self.script();
        script.sent.push(packets);
        match script.replies.pop_front() {
            Some(Reply::Packets(packets)) => Ok(packets),
            Some(Reply::Fail(reason)) => Err(TransportError::Unavailable(reason)),
            None => Ok(Vec::new()),
        }
    }
}
