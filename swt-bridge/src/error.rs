use std::{error::Error, fmt::Display, io};

use swt_protocol::error::SequenceError;

/// Ways a read-modify-write bits pair can be malformed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RmwError {
    /// An OR mask frame appeared without a preceding AND mask frame.
    MissingAndFrame { operation: usize },
    /// The sequence ended before the OR mask frame.
    MissingOrFrame { operation: usize },
    /// The frame in the OR mask position has another mode.
    UnexpectedMode { operation: usize, mode: u16 },
}

impl Display for RmwError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RmwError::MissingAndFrame { operation } => write!(
                f,
                "operation {}: first frame is not the AND frame",
                operation
            ),
            RmwError::MissingOrFrame { operation } => write!(
                f,
                "operation {}: second frame has not been received",
                operation
            ),
            RmwError::UnexpectedMode { operation, mode } => write!(
                f,
                "operation {}: invalid second frame with mode {}",
                operation, mode
            ),
        }
    }
}

/// Packet limits that would let a packet reach its bound or stay empty.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LimitsError {
    PaddingTooSmall { padding: usize, min: usize },
    PaddingTooLarge { padding: usize, max_packet_size: usize },
}

impl Display for LimitsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitsError::PaddingTooSmall { padding, min } => write!(
                f,
                "Packet padding ({}) must be at least {} words",
                padding, min
            ),
            LimitsError::PaddingTooLarge {
                padding,
                max_packet_size,
            } => write!(
                f,
                "Packet padding ({}) leaves no room in a packet of {} words",
                padding, max_packet_size
            ),
        }
    }
}

impl Error for LimitsError {}

/// Errors that abort compilation before anything is sent.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CompileError {
    MalformedRmwSequence(RmwError),
    UnsupportedMode { operation: usize, mode: u16 },
}

impl From<RmwError> for CompileError {
    fn from(value: RmwError) -> Self {
        CompileError::MalformedRmwSequence(value)
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::MalformedRmwSequence(err) => write!(f, "RMW bits failed: {}", err),
            CompileError::UnsupportedMode { operation, mode } => {
                write!(f, "operation {}: unsupported mode {}", operation, mode)
            }
        }
    }
}

impl Error for CompileError {}

/// Errors reported by a [Transport](crate::Transport) while executing a packet.
#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    /// The device answered with something that is not a valid reply to the packet.
    MalformedReply(String),
    /// The device reported a failed transaction.
    TransactionFailed { transaction: usize, code: u8 },
    /// The number of reply words does not match the number of transactions.
    ReplyCountMismatch { expected: usize, got: usize },
}

impl From<io::Error> for TransportError {
    fn from(value: io::Error) -> Self {
        TransportError::Io(value)
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Io(error) => write!(f, "{}", error),
            TransportError::MalformedReply(reason) => write!(f, "Malformed reply: {}", reason),
            TransportError::TransactionFailed { transaction, code } => write!(
                f,
                "Transaction {} failed with info code 0x{:X}",
                transaction, code
            ),
            TransportError::ReplyCountMismatch { expected, got } => write!(
                f,
                "Expected {} reply words, but got {}",
                expected, got
            ),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::Io(error) => Some(error),
            _ => None,
        }
    }
}

/// Everything that can make a request answer `failure`.
#[derive(Debug)]
pub enum BridgeError {
    SequenceRejected(SequenceError),
    Compile(CompileError),
    TransportFailure { packet: usize, error: TransportError },
}

impl From<SequenceError> for BridgeError {
    fn from(value: SequenceError) -> Self {
        BridgeError::SequenceRejected(value)
    }
}

impl From<CompileError> for BridgeError {
    fn from(value: CompileError) -> Self {
        BridgeError::Compile(value)
    }
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::SequenceRejected(err) => write!(f, "Sequence rejected: {}", err),
            BridgeError::Compile(err) => write!(f, "Sequence failed: {}", err),
            BridgeError::TransportFailure { packet, error } => {
                write!(f, "Packet {} failed: {}", packet, error)
            }
        }
    }
}

impl Error for BridgeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BridgeError::SequenceRejected(err) => Some(err),
            BridgeError::Compile(err) => Some(err),
            BridgeError::TransportFailure { error, .. } => Some(error),
        }
    }
}
