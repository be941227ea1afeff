//! Test harness shared by the end-to-end tests.
//!
//! [`RecordingTransport`] keeps a register file, records every packet it is asked to
//! execute and can be told to fail a given packet.
use std::{collections::HashMap, sync::Mutex};

use swt_bridge::{
    Transport,
    error::TransportError,
    packet::{Packet, Transaction},
};

#[derive(Debug, Default)]
pub struct RecordingTransport {
    registers: Mutex<HashMap<u32, u32>>,
    sent: Mutex<Vec<Vec<Transaction>>>,
    fail_at: Option<usize>,
}

impl RecordingTransport {
    pub fn new() -> RecordingTransport {
        RecordingTransport::default()
    }

    /// A transport that fails the packet with the given index (0 is the first packet).
    pub fn failing_at(packet: usize) -> RecordingTransport {
        RecordingTransport {
            fail_at: Some(packet),
            ..Default::default()
        }
    }

    /// Presets a register.
    pub fn with_register(self, address: u32, value: u32) -> RecordingTransport {
        if let Ok(mut registers) = self.registers.lock() {
            registers.insert(address, value);
        }
        self
    }

    pub fn register(&self, address: u32) -> Option<u32> {
        self.registers.lock().ok()?.get(&address).copied()
    }

    /// All packets received so far, in order, including a failed one.
    pub fn sent(&self) -> Vec<Vec<Transaction>> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Transport for RecordingTransport {
    fn transceive(&self, packet: &Packet) -> Result<Vec<u32>, TransportError> {
        let index = {
            let mut sent = self
                .sent
                .lock()
                .map_err(|_| TransportError::MalformedReply("poisoned".to_string()))?;
            sent.push(packet.transactions().to_vec());
            sent.len() - 1
        };
        if self.fail_at == Some(index) {
            log::debug!("Failing packet {} on request", index);
            return Err(TransportError::TransactionFailed {
                transaction: 0,
                code: 0x4,
            });
        }

        let mut registers = self
            .registers
            .lock()
            .map_err(|_| TransportError::MalformedReply("poisoned".to_string()))?;
        let replies = packet
            .transactions()
            .iter()
            .map(|transaction| {
                let register = registers.entry(transaction.address()).or_default();
                match *transaction {
                    Transaction::Read { .. } => *register,
                    Transaction::Write { value, .. } => {
                        *register = value;
                        value
                    }
                    Transaction::RmwBits {
                        and_mask, or_mask, ..
                    } => {
                        *register = (*register & and_mask) | or_mask;
                        *register
                    }
                    Transaction::RmwSum { addend, .. } => {
                        *register = register.wrapping_add(addend);
                        *register
                    }
                }
            })
            .collect();
        Ok(replies)
    }
}
