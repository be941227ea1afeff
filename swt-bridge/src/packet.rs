//! Transactions and the size-bounded packets that carry them.
//!
//! Sizes are counted in 32-bit words as they appear in an IPbus 2.0 control packet.
use crate::error::LimitsError;

/// Largest packet, in words, that fits a 1500 byte MTU.
pub const MAX_PACKET_SIZE: usize = 368;
/// Room kept free in every packet before a new one is opened.
pub const PACKET_SIZE_PADDING: usize = 128;
/// Request size of the largest transaction, an RMW bits.
pub const LARGEST_TRANSACTION_SIZE: usize = 4;

/// A single bus transaction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Transaction {
    Read {
        address: u32,
    },
    Write {
        address: u32,
        value: u32,
    },
    /// Sets the register to `(value & and_mask) | or_mask`.
    RmwBits {
        address: u32,
        and_mask: u32,
        or_mask: u32,
    },
    /// Adds `addend` to the register.
    RmwSum {
        address: u32,
        addend: u32,
    },
}

impl Transaction {
    pub fn address(&self) -> u32 {
        match self {
            Transaction::Read { address }
            | Transaction::Write { address, .. }
            | Transaction::RmwBits { address, .. }
            | Transaction::RmwSum { address, .. } => *address,
        }
    }

    /// IPbus transaction type id.
    pub fn type_id(&self) -> u8 {
        match self {
            Transaction::Read { .. } => 0x0,
            Transaction::Write { .. } => 0x1,
            Transaction::RmwBits { .. } => 0x4,
            Transaction::RmwSum { .. } => 0x5,
        }
    }

    /// Words following the transaction header in the request.
    pub fn request_body(&self) -> Vec<u32> {
        match *self {
            Transaction::Read { address } => vec![address],
            Transaction::Write { address, value } => vec![address, value],
            Transaction::RmwBits {
                address,
                and_mask,
                or_mask,
            } => vec![address, and_mask, or_mask],
            Transaction::RmwSum { address, addend } => vec![address, addend],
        }
    }

    /// Request words including the transaction header.
    pub fn request_size(&self) -> usize {
        1 + self.request_body().len()
    }

    /// Data words following the transaction header in the reply.
    pub fn reply_words(&self) -> usize {
        match self {
            Transaction::Write { .. } => 0,
            _ => 1,
        }
    }

    /// Reply words including the transaction header.
    pub fn response_size(&self) -> usize {
        1 + self.reply_words()
    }
}

/// Capacity bound applied while compiling.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PacketLimits {
    /// A packet's request size never reaches this many words.
    max_packet_size: usize,
    /// A new packet is opened once the current one comes within this many words of the maximum.
    padding: usize,
}

impl Default for PacketLimits {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
            padding: PACKET_SIZE_PADDING,
        }
    }
}

impl PacketLimits {
    /// Validates a packet bound and its padding.
    ///
    /// The padding must fit the largest transaction, so that appending to a packet that is
    /// not full keeps it below the bound, and an empty packet must never be full.
    pub fn new(max_packet_size: usize, padding: usize) -> Result<PacketLimits, LimitsError> {
        if padding < LARGEST_TRANSACTION_SIZE {
            return Err(LimitsError::PaddingTooSmall {
                padding,
                min: LARGEST_TRANSACTION_SIZE,
            });
        }
        // the packet header alone must leave room
        if Packet::new().request_size() + padding >= max_packet_size {
            return Err(LimitsError::PaddingTooLarge {
                padding,
                max_packet_size,
            });
        }
        Ok(PacketLimits {
            max_packet_size,
            padding,
        })
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Whether `packet` is too full to take another transaction.
    pub fn is_full(&self, packet: &Packet) -> bool {
        packet.request_size() + self.padding >= self.max_packet_size
    }
}

/// An ordered batch of transactions sent to the transport in one call.
///
/// Each transaction may be bound to the operation that receives its reply word.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    transactions: Vec<Transaction>,
    bindings: Vec<Option<usize>>,
    request_size: usize,
    response_size: usize,
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl Packet {
    pub fn new() -> Packet {
        Packet {
            transactions: Vec::new(),
            bindings: Vec::new(),
            // packet header
            request_size: 1,
            response_size: 1,
        }
    }

    pub fn push(&mut self, transaction: Transaction, binding: Option<usize>) {
        self.request_size += transaction.request_size();
        self.response_size += transaction.response_size();
        self.transactions.push(transaction);
        self.bindings.push(binding);
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The operation index bound to each transaction, if any.
    pub fn bindings(&self) -> &[Option<usize>] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn request_size(&self) -> usize {
        self.request_size
    }

    pub fn response_size(&self) -> usize {
        self.response_size
    }
}
