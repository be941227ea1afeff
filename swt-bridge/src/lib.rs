//! # SWT Bridge Library
//!
//! This crate turns SWT command sequences into IPbus transaction packets, executes
//! them through a pluggable transport and answers with the SWT response text.
//!
//! ## Overview
//!
//! A detector-control system sends a command sequence as one string and expects one
//! string back. This library parses the sequence, compiles it into packets small
//! enough for the bus, hands the packets to a backend and formats the replies.
//!
//! ## Architecture
//!
//! - **[`Transport`] Trait**: Defines the interface that bus backends must implement
//!   to execute a packet of transactions
//! - **[`compiler::compile`]**: Packs operations into packets bounded by [`packet::PacketLimits`]
//! - **[`bridge::Bridge`]**: Runs one request from text to response
//! - **[`server::Server`]**: Serves requests over TCP, each message a NUL terminated string
//!
//! ## How It Works
//!
//! 1. A backend (e.g. IPbus over UDP) implements the [`Transport`] trait
//! 2. The backend is wrapped in a [`server::Server`] instance
//! 3. The server listens for TCP connections and reads NUL terminated requests
//! 4. Each request is parsed and compiled; a malformed request never reaches the backend
//! 5. Packets are sent in order, replies are bound back to the lines that asked for them
//! 6. The response is serialized and sent back to the client
//!
//! ## Basic Usage
//!
//! ### Implementing a Backend
//!
//! ```ignore
//! use swt_bridge::{Transport, error::TransportError, packet::Packet};
//!
//! struct MyBus {
//!     // device-specific fields
//! }
//!
//! impl Transport for MyBus {
//!     fn transceive(&self, packet: &Packet) -> Result<Vec<u32>, TransportError> {
//!         // Execute every transaction and collect one reply word each
//!         Ok(vec![0; packet.len()])
//!     }
//! }
//! ```
//!
//! ### Starting the Server
//!
//! ```ignore
//! use swt_bridge::server::Builder;
//!
//! let server = Builder::new().build(MyBus::new()?);
//! server.listen("127.0.0.1:5000").await?;
//! ```
//!
//! ## Error Handling
//!
//! Every failure answers with the literal `failure`. The reason is logged with the
//! `log` crate at error level.
//!
//! ## Configuration
//!
//! Server behavior can be customized via [`server::Config`]:
//!
//! - **max_request_len**: Longest accepted request (default: 1 MiB)
//! - **limits**: Packet size bound and padding (default: 368 and 128 words)
//!
//! ## Logging
//!
//! This crate uses the `log` crate for diagnostics. Enable logging to see:
//! - Client connections and disconnections
//! - Compilation results and packet splits
//! - Failed requests with their reason
//!
//! ## Thread Model
//!
//! Each client connection is served by its own task and each request runs on the
//! blocking thread pool, so requests from different clients run in parallel.
//! Requests share nothing but the transport.
pub mod bridge;
pub mod compiler;
pub mod error;
pub mod packet;
pub mod server;

use crate::{error::TransportError, packet::Packet};

/// Trait that bus backends must implement to execute transactions.
///
/// This trait defines the interface between the bridge and the bus. Implementors
/// encode the packet for their medium, wait for the device to answer and report the
/// reply of every transaction.
pub trait Transport {
    /// Execute all transactions of a packet.
    ///
    /// Blocks until the device answered or the backend gave up. On success, returns one
    /// word per transaction in submission order: the value read for reads, the value
    /// reported by the device for read-modify-write transactions and any value for writes.
    ///
    /// # Error Handling
    ///
    /// A failed packet fails the whole request. Transactions of the packet may or may not
    /// have been executed.
    fn transceive(&self, packet: &Packet) -> Result<Vec<u32>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn transceive(&self, packet: &Packet) -> Result<Vec<u32>, TransportError> {
        (**self).transceive(packet)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn transceive(&self, packet: &Packet) -> Result<Vec<u32>, TransportError> {
        (**self).transceive(packet)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn transceive(&self, packet: &Packet) -> Result<Vec<u32>, TransportError> {
        (**self).transceive(packet)
    }
}
