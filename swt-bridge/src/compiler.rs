//! Compiles parsed operations into size-bounded packets.
use swt_protocol::{Frame, Operation, TransactionKind};

use crate::{
    error::{CompileError, RmwError},
    packet::{Packet, PacketLimits, Transaction},
};

/// Walks the operations once and packs every transaction into packets bounded by `limits`.
///
/// Padding frames produce no transaction. An RMW bits pair consumes its AND frame, an
/// optional padding frame and its OR frame, and yields a single transaction bound to
/// the AND frame's operation. Empty packets are never returned.
///
/// Any error aborts the whole compilation so nothing of a malformed sequence is executed.
pub fn compile(operations: &[Operation], limits: PacketLimits) -> Result<Vec<Packet>, CompileError> {
    let mut packets = Vec::new();
    let mut current = Packet::new();
    let mut index = 0;

    while index < operations.len() {
        let frame = operations[index].frame();
        let kind = frame
            .transaction_kind()
            .ok_or(CompileError::UnsupportedMode {
                operation: index,
                mode: frame.mode,
            })?;

        let (transaction, binding, consumed) = match kind {
            TransactionKind::NoOp => {
                index += 1;
                continue;
            }
            TransactionKind::Read => (
                Transaction::Read {
                    address: frame.address,
                },
                Some(index),
                1,
            ),
            TransactionKind::Write => (
                Transaction::Write {
                    address: frame.address,
                    value: frame.data,
                },
                None,
                1,
            ),
            TransactionKind::RmwSum => (
                Transaction::RmwSum {
                    address: frame.address,
                    addend: frame.data,
                },
                Some(index),
                1,
            ),
            TransactionKind::RmwOr => {
                return Err(RmwError::MissingAndFrame { operation: index }.into());
            }
            TransactionKind::RmwAnd => {
                let (or_frame, consumed) = rmw_or_frame(operations, index)?;
                (
                    Transaction::RmwBits {
                        address: frame.address,
                        and_mask: frame.data,
                        or_mask: or_frame.data,
                    },
                    Some(index),
                    consumed,
                )
            }
        };

        if limits.is_full(&current) {
            log::warn!(
                "Max packet size exceeded at {} words, splitting packet",
                current.request_size()
            );
            packets.push(std::mem::take(&mut current));
        }
        log::trace!("Packet {}: {:?}", packets.len(), transaction);
        current.push(transaction, binding);
        index += consumed;
    }

    if !current.is_empty() {
        packets.push(current);
    }
    Ok(packets)
}

/// Finds the OR frame belonging to the AND frame at `and_index`.
/// Returns the frame and the number of operations the pair consumes.
fn rmw_or_frame(operations: &[Operation], and_index: usize) -> Result<(Frame, usize), RmwError> {
    let next = operations
        .get(and_index + 1)
        .ok_or(RmwError::MissingOrFrame {
            operation: and_index,
        })?
        .frame();

    let (or_frame, consumed) = if next.is_padding() {
        let after = operations
            .get(and_index + 2)
            .ok_or(RmwError::MissingOrFrame {
                operation: and_index,
            })?
            .frame();
        (after, 3)
    } else {
        (next, 2)
    };

    if or_frame.mode != Frame::MODE_RMW_OR {
        return Err(RmwError::UnexpectedMode {
            operation: and_index + consumed - 1,
            mode: or_frame.mode,
        });
    }
    Ok((or_frame, consumed))
}
