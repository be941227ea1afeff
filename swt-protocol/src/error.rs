use std::{error::Error, fmt::Display, io, str::Utf8Error};

/// Errors that may occur when decoding a hexadecimal frame payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DecodeError {
    /// A character that is not in `0-9A-Fa-f` was found where a nibble is required.
    InvalidHexDigit(char),
    /// The payload does not have the fixed frame width.
    MalformedFrame { len: usize },
    /// A response entry is neither an acknowledgement nor a `0x` frame.
    UnexpectedEntry(String),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidHexDigit(ch) => write!(f, "Invalid hexadecimal character {:?}", ch),
            DecodeError::MalformedFrame { len } => {
                write!(f, "SWT frame must be 19 characters, but got {}", len)
            }
            DecodeError::UnexpectedEntry(entry) => {
                write!(f, "Response entry {:?} is neither '0' nor a frame", entry)
            }
        }
    }
}

impl Error for DecodeError {}

/// Reasons for rejecting a whole command sequence.
/// Line numbers are 1-based and count the leading directive.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SequenceError {
    /// The first line is not the `reset` directive. Holds the line that was found instead.
    MissingReset(String),
    /// A command line carries no `0x` payload.
    MissingPayload { line: usize },
    /// A `read` line has no preceding operation to echo.
    DanglingRead { line: usize },
    /// The payload of a command line could not be decoded.
    InvalidFrame { line: usize, error: DecodeError },
}

impl Display for SequenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceError::MissingReset(line) => {
                write!(f, "Sequence must start with 'reset', got {:?}", line)
            }
            SequenceError::MissingPayload { line } => {
                write!(f, "Line {} carries no '0x' payload", line)
            }
            SequenceError::DanglingRead { line } => {
                write!(f, "Line {}: 'read' without a preceding frame", line)
            }
            SequenceError::InvalidFrame { line, error } => {
                write!(f, "Line {}: {}", line, error)
            }
        }
    }
}

impl Error for SequenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SequenceError::InvalidFrame { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Errors that may occur when reading an RPC message from a stream.
#[derive(Debug)]
pub enum ReadError {
    IoError(io::Error),
    InvalidFormat(String),
    TooManyBytes { max: usize, got: usize },
    /// The peer closed the stream before a complete message arrived.
    ConnectionClosed,
}

impl From<io::Error> for ReadError {
    fn from(value: io::Error) -> Self {
        ReadError::IoError(value)
    }
}

impl From<Utf8Error> for ReadError {
    fn from(value: Utf8Error) -> Self {
        ReadError::InvalidFormat(format!("Invalid UTF8: {}", value))
    }
}

impl Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::IoError(error) => write!(f, "{}", error),
            ReadError::InvalidFormat(format) => write!(f, "{}", format),
            ReadError::TooManyBytes { max, got } => {
                write!(f, "Message too large! Maximum is {}, but got {}", max, got)
            }
            ReadError::ConnectionClosed => write!(f, "Connection closed mid-message"),
        }
    }
}

impl Error for ReadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReadError::IoError(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sequence_error_exposes_decode_source() {
        let err = SequenceError::InvalidFrame {
            line: 2,
            error: DecodeError::InvalidHexDigit('G'),
        };
        assert_eq!(err.to_string(), "Line 2: Invalid hexadecimal character 'G'");
        assert!(err.source().is_some());
    }

    #[test]
    fn malformed_frame_display() {
        let err = DecodeError::MalformedFrame { len: 20 };
        assert_eq!(err.to_string(), "SWT frame must be 19 characters, but got 20");
    }
}
