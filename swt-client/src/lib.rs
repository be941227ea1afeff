//! # SWT Client
//!
//! A Rust client library for connecting to an SWT bridge and executing register
//! operations on a detector front-end.
//!
//! ## Overview
//!
//! This crate provides a client interface to the bridge RPC, allowing applications
//! to send command sequences over network connections. It handles message framing and
//! response parsing, and provides convenient methods for single register operations.
//!
//! For detailed protocol information, see the [`swt_protocol`] crate.
//!
//! ## Basic Usage
//!
//! ### Connecting to a Bridge
//!
//! ```ignore
//! use swt_client::SwtClient;
//!
//! let mut client = SwtClient::new("127.0.0.1:5000")?;
//!
//! // Write a register, then read it back
//! client.write_register(0x0A, 0xB0)?;
//! let value = client.read_register(0x0A)?;
//! println!("Register 0x0A: 0x{:08X}", value);
//! ```
//!
//! ### Sending Whole Sequences
//!
//! ```ignore
//! use swt_protocol::sequence::SequenceBuilder;
//!
//! let sequence = SequenceBuilder::new()
//!     .write_register(0x10, 0xFF)
//!     .rmw_bits(0x10, 0xF0, 0x01)
//!     .build();
//! let response = client.execute(&sequence)?;
//! for reply in response.entries()? {
//!     println!("{:?}", reply);
//! }
//! ```
//!
//! ## Related Crates
//!
//! - [`swt_bridge`](../swt_bridge/index.html) - Bridge and server implementation
//! - [`swt_protocol`] - Frame and sequence encoding/decoding
use std::{
    error::Error,
    fmt::Display,
    io::{self, BufReader},
    net::{TcpStream, ToSocketAddrs},
};

use swt_protocol::{
    Frame,
    error::{DecodeError, ReadError},
    message::{DEFAULT_MAX_MESSAGE_LEN, read_message, write_message},
    response::{Reply, Response},
    sequence::SequenceBuilder,
};

/// Errors of a single client operation.
#[derive(Debug)]
pub enum ClientError {
    Read(ReadError),
    /// The bridge answered `failure`.
    Failure,
    /// The bridge answered with entries that do not match the request.
    UnexpectedResponse(String),
    /// The register cannot be read with a read frame.
    UnreadableAddress(u32),
}

impl From<io::Error> for ClientError {
    fn from(value: io::Error) -> Self {
        ClientError::Read(ReadError::IoError(value))
    }
}

impl From<ReadError> for ClientError {
    fn from(value: ReadError) -> Self {
        ClientError::Read(value)
    }
}

impl From<DecodeError> for ClientError {
    fn from(value: DecodeError) -> Self {
        ClientError::UnexpectedResponse(value.to_string())
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Read(error) => write!(f, "{}", error),
            ClientError::Failure => write!(f, "Bridge reported failure"),
            ClientError::UnexpectedResponse(reason) => {
                write!(f, "Unexpected response: {}", reason)
            }
            ClientError::UnreadableAddress(address) => write!(
                f,
                "Register 0x{:08X} cannot be read: its read frame is the padding frame",
                address
            ),
        }
    }
}

impl Error for ClientError {}

/// SWT client for remote register operations.
///
/// Connects to an SWT bridge and sends one command sequence per call.
pub struct SwtClient {
    tcp: BufReader<TcpStream>,
}

impl SwtClient {
    pub fn new(addr: impl ToSocketAddrs) -> io::Result<SwtClient> {
        Ok(SwtClient {
            tcp: BufReader::new(TcpStream::connect(addr)?),
        })
    }

    /// Send a raw command sequence and wait for the response.
    pub fn execute(&mut self, sequence: &str) -> Result<Response, ClientError> {
        write_message(self.tcp.get_mut(), sequence)?;
        match read_message(&mut self.tcp, DEFAULT_MAX_MESSAGE_LEN)? {
            Some(text) => Ok(Response::parse(&text)),
            None => Err(ReadError::ConnectionClosed.into()),
        }
    }

    /// Send a sequence and decode its entries, treating `failure` as an error.
    pub fn execute_entries(&mut self, sequence: &str) -> Result<Vec<Reply>, ClientError> {
        let response = self.execute(sequence)?;
        if !response.is_success() {
            return Err(ClientError::Failure);
        }
        Ok(response.entries()?)
    }

    /// Read a single register.
    ///
    /// Address 0 is rejected with [ClientError::UnreadableAddress] without contacting the
    /// bridge: a read of address 0 encodes as the all-zero frame, which the bridge treats as
    /// padding and never sends to the bus. Use [SwtClient::rmw_sum] with an addend of 0 to
    /// fetch that register.
    pub fn read_register(&mut self, address: u32) -> Result<u32, ClientError> {
        if Frame::read(address).is_padding() {
            return Err(ClientError::UnreadableAddress(address));
        }
        let sequence = SequenceBuilder::new().read_register(address).build();
        self.single_frame(&sequence)
    }

    pub fn write_register(&mut self, address: u32, value: u32) -> Result<(), ClientError> {
        let sequence = SequenceBuilder::new()
            .write_register(address, value)
            .build();
        match self.execute_entries(&sequence)?.as_slice() {
            [Reply::Acknowledged] => Ok(()),
            other => Err(ClientError::UnexpectedResponse(format!("{:?}", other))),
        }
    }

    /// Update a register to `(value & and_mask) | or_mask`.
    ///
    /// # Returns
    ///
    /// The word the device reported for the transaction.
    pub fn rmw_bits(&mut self, address: u32, and_mask: u32, or_mask: u32) -> Result<u32, ClientError> {
        let sequence = SequenceBuilder::new()
            .rmw_bits(address, and_mask, or_mask)
            .build();
        self.single_frame(&sequence)
    }

    /// Add `addend` to a register.
    ///
    /// # Returns
    ///
    /// The word the device reported for the transaction.
    pub fn rmw_sum(&mut self, address: u32, addend: u32) -> Result<u32, ClientError> {
        let sequence = SequenceBuilder::new().rmw_sum(address, addend).build();
        self.single_frame(&sequence)
    }

    /// Runs a sequence whose only echoed frame carries the value of interest.
    fn single_frame(&mut self, sequence: &str) -> Result<u32, ClientError> {
        let entries = self.execute_entries(sequence)?;
        entries
            .iter()
            .find_map(|reply| match reply {
                Reply::Frame(frame) => Some(frame.data),
                Reply::Acknowledged => None,
            })
            .ok_or_else(|| ClientError::UnexpectedResponse(format!("{:?}", entries)))
    }
}
