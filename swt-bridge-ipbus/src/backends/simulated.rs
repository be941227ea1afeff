//! # Simulated Backend
//!
//! An in-memory register file for dry runs without hardware. Registers start at
//! zero. Read-modify-write transactions reply with the register content before the
//! update, as an IPbus target does.
use std::{collections::HashMap, io, sync::Mutex};

use swt_bridge::{
    Transport,
    error::TransportError,
    packet::{Packet, Transaction},
};

#[derive(Debug, Default)]
pub struct SimulatedBackend {
    registers: Mutex<HashMap<u32, u32>>,
}

impl SimulatedBackend {
    pub fn new() -> SimulatedBackend {
        SimulatedBackend::default()
    }
}

impl Transport for SimulatedBackend {
    fn transceive(&self, packet: &Packet) -> Result<Vec<u32>, TransportError> {
        let mut registers = self
            .registers
            .lock()
            .map_err(|_| io::Error::other("register file lock poisoned"))?;
        let replies = packet
            .transactions()
            .iter()
            .map(|transaction| {
                let register = registers.entry(transaction.address()).or_default();
                let before = *register;
                match *transaction {
                    Transaction::Read { .. } => {}
                    Transaction::Write { value, .. } => *register = value,
                    Transaction::RmwBits {
                        and_mask, or_mask, ..
                    } => *register = (before & and_mask) | or_mask,
                    Transaction::RmwSum { addend, .. } => *register = before.wrapping_add(addend),
                }
                log::trace!(
                    "Simulated {:?}: 0x{:08X} -> 0x{:08X}",
                    transaction,
                    before,
                    *register
                );
                match transaction {
                    Transaction::Write { value, .. } => *value,
                    _ => before,
                }
            })
            .collect();
        Ok(replies)
    }
}

#[cfg(test)]
mod test {
    use swt_bridge::{
        Transport,
        packet::{Packet, Transaction},
    };

    use super::SimulatedBackend;

    #[test]
    fn register_file_semantics() {
        let backend = SimulatedBackend::new();
        let mut packet = Packet::new();
        packet.push(
            Transaction::Write {
                address: 0x10,
                value: 0x00FF,
            },
            None,
        );
        packet.push(
            Transaction::RmwBits {
                address: 0x10,
                and_mask: 0x0F0F,
                or_mask: 0x1000,
            },
            Some(1),
        );
        packet.push(
            Transaction::RmwSum {
                address: 0x10,
                addend: 1,
            },
            Some(2),
        );
        packet.push(Transaction::Read { address: 0x10 }, Some(3));
        packet.push(Transaction::Read { address: 0x20 }, Some(4));

        let replies = backend.transceive(&packet).unwrap();
        assert_eq!(replies, vec![0x00FF, 0x00FF, 0x100F, 0x1010, 0]);
    }
}
