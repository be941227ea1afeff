//! # SWT Protocol Library
//!
//! This crate implements the text side of the FIT SWT bridge: the line oriented
//! command sequences a detector-control system sends, the fixed width frames those
//! lines carry, and the response text sent back once the operations have run.
//!
//! ## Overview
//!
//! A command sequence is a newline separated list of lines. The first line is always
//! the `reset` directive. Each following line is either a bare `read`, another line
//! mentioning `read` that only holds a place, or a line that carries a frame payload
//! of the form `0x<19 hex digits>` terminated by a comma or the end of the line.
//!
//! ```text
//! reset
//! write 0x0000000000A00000000,
//! read
//! ```
//!
//! This library allows you to:
//!
//! - Decode and encode SWT frames ([`Frame::from_hex`], [`Frame::to_hex`])
//! - Parse a command sequence into ordered [`Operation`]s ([`sequence::Sequence::parse`])
//! - Classify frames by transaction kind ([`Frame::transaction_kind`])
//! - Render and parse responses ([`response::Response`])
//! - Frame RPC messages as NUL terminated strings ([`message`])
//!
//! ## Frame Format
//!
//! | characters | field   | width   |
//! |------------|---------|---------|
//! | `[0..3]`   | mode    | 12 bits |
//! | `[3..11]`  | address | 32 bits |
//! | `[11..19]` | data    | 32 bits |
//!
//! Modes: `0` read, `1` write, `2` RMW-bits AND mask, `3` RMW-bits OR mask, `4` RMW sum.
//! The all-zero frame is a padding marker and is never executed.
//!
//! ## Basic Usage
//!
//! ```
//! use swt_protocol::{Frame, Operation, sequence::Sequence};
//!
//! let sequence = Sequence::parse("reset\nwrite 0x0010000000A000000B0,\n").expect("Sequence should parse");
//! assert_eq!(
//!     sequence.operations(),
//!     &[Operation::Frame { frame: Frame::new(1, 0x0A, 0xB0), acknowledge: true }]
//! );
//! assert_eq!(sequence.format_entries(&[0xB0]), "0\n");
//! ```
//!
//! ## Error Handling
//!
//! Frame decoding fails with [`error::DecodeError`]; a sequence is rejected as a whole
//! with [`error::SequenceError`]; message I/O fails with [`error::ReadError`].
//!
//! ## Features
//!
//! - `tokio`: provides [`message::NulTerminatedCodec`] for use with `tokio_util::codec`.

pub mod protocol;
pub use protocol::*;
pub mod codec;
pub mod error;
pub mod message;
pub mod response;
pub mod sequence;
