use std::fmt::Display;

use crate::{error::DecodeError, protocol::Frame, sequence::PAYLOAD_MARKER};

const SUCCESS_PREFIX: &str = "success ";
const FAILURE: &str = "failure";

/// The answer to one command sequence, as sent back over the RPC boundary.
///
/// Any failure, whether the sequence was malformed or the transport failed, is reported
/// as the bare `failure` literal without further detail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Response {
    /// Holds the newline terminated per-line entries.
    Success(String),
    Failure,
}

/// One entry of a successful response.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    /// A `write` line was executed.
    Acknowledged,
    /// A `read` line echoed a frame with its result data.
    Frame(Frame),
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    /// Parses a response string. Anything that is not a success is a failure.
    pub fn parse(text: &str) -> Response {
        match text.strip_prefix(SUCCESS_PREFIX) {
            Some(entries) => Response::Success(entries.to_string()),
            None => Response::Failure,
        }
    }

    /// Decodes the entries of a successful response. A failure has no entries.
    pub fn entries(&self) -> Result<Vec<Reply>, DecodeError> {
        let Response::Success(entries) = self else {
            return Ok(Vec::new());
        };
        entries
            .lines()
            .map(|line| match line.strip_prefix(PAYLOAD_MARKER) {
                Some(hex) => Frame::from_hex(hex).map(Reply::Frame),
                None if line == "0" => Ok(Reply::Acknowledged),
                None => Err(DecodeError::UnexpectedEntry(line.to_string())),
            })
            .collect()
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Response::Success(entries) => write!(f, "{}{}", SUCCESS_PREFIX, entries),
            Response::Failure => write!(f, "{}", FAILURE),
        }
    }
}

#[test]
fn display_literals() {
    assert_eq!(Response::Failure.to_string(), "failure");
    assert_eq!(
        Response::Success("0\n".to_string()).to_string(),
        "success 0\n"
    );
    assert_eq!(Response::Success(String::new()).to_string(), "success ");
}

#[test]
fn parse_entries() {
    let response = Response::parse("success 0\n0x0020000001000000F0F\n");
    assert!(response.is_success());
    assert_eq!(
        response.entries().unwrap(),
        vec![
            Reply::Acknowledged,
            Reply::Frame(Frame::new(2, 0x10, 0xF0F))
        ]
    );
    assert_eq!(Response::parse("failure"), Response::Failure);
    assert_eq!(Response::Failure.entries().unwrap(), Vec::new());
}

#[test]
fn unknown_entry_is_rejected() {
    let response = Response::parse("success 0
1
");
    assert_eq!(
        response.entries(),
        Err(DecodeError::UnexpectedEntry("1".to_string()))
    );
    assert_eq!(
        Response::parse("success 0x12
").entries(),
        Err(DecodeError::MalformedFrame { len: 2 })
    );
}
