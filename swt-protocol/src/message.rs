//! RPC message framing.
//!
//! Every request and response travelling between a client and the bridge is a
//! single ASCII string terminated by a NUL byte.
use std::io::{self, BufRead, Write};

use crate::error::ReadError;

pub const TERMINATOR: u8 = b'\0';

/// Largest request accepted by default.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1024 * 1024;

pub fn write_message(writer: &mut impl Write, text: &str) -> io::Result<()> {
    writer.write_all(text.as_bytes())?;
    writer.write_all(&[TERMINATOR])?;
    writer.flush()
}

/// Reads one NUL terminated message. Returns `Ok(None)` if the stream ended cleanly before
/// any byte of a new message arrived.
pub fn read_message(
    reader: &mut impl BufRead,
    max_len: usize,
) -> Result<Option<String>, ReadError> {
    let mut buf = Vec::with_capacity(256);
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(ReadError::ConnectionClosed)
            };
        }
        match available.iter().position(|b| *b == TERMINATOR) {
            Some(end) => {
                buf.extend_from_slice(&available[..end]);
                reader.consume(end + 1);
                break;
            }
            None => {
                let len = available.len();
                buf.extend_from_slice(available);
                reader.consume(len);
            }
        }
        if buf.len() > max_len {
            return Err(ReadError::TooManyBytes {
                max: max_len,
                got: buf.len(),
            });
        }
    }
    if buf.len() > max_len {
        return Err(ReadError::TooManyBytes {
            max: max_len,
            got: buf.len(),
        });
    }
    into_ascii(buf).map(Some)
}

fn into_ascii(buf: Vec<u8>) -> Result<String, ReadError> {
    if !buf.is_ascii() {
        return Err(ReadError::InvalidFormat(
            "Message contains non-ASCII bytes".to_string(),
        ));
    }
    Ok(str::from_utf8(&buf)?.to_string())
}

#[cfg(feature = "tokio")]
pub use nul_codec::NulTerminatedCodec;

#[cfg(feature = "tokio")]
mod nul_codec {
    use std::io;

    use bytes::{BufMut, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};

    use super::{DEFAULT_MAX_MESSAGE_LEN, TERMINATOR};

    /// Splits a byte stream into NUL terminated ASCII messages.
    #[derive(Debug, Clone)]
    pub struct NulTerminatedCodec {
        max_len: usize,
        /// Bytes already searched for a terminator.
        scanned: usize,
    }

    impl NulTerminatedCodec {
        pub fn new(max_len: usize) -> NulTerminatedCodec {
            NulTerminatedCodec { max_len, scanned: 0 }
        }

        pub fn max_len(&self) -> usize {
            self.max_len
        }
    }

    impl Default for NulTerminatedCodec {
        fn default() -> Self {
            Self::new(DEFAULT_MAX_MESSAGE_LEN)
        }
    }

    impl Decoder for NulTerminatedCodec {
        type Item = String;
        type Error = io::Error;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
            let start = self.scanned.min(src.len());
            let Some(offset) = src[start..].iter().position(|b| *b == TERMINATOR) else {
                self.scanned = src.len();
                if src.len() > self.max_len {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "Message too large! Maximum is {}, but got {}",
                            self.max_len,
                            src.len()
                        ),
                    ));
                }
                return Ok(None);
            };
            let end = start + offset;
            self.scanned = 0;

            let message = src.split_to(end + 1);
            let body = &message[..end];
            if body.len() > self.max_len {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Message too large! Maximum is {}, but got {}",
                        self.max_len,
                        body.len()
                    ),
                ));
            }
            if !body.is_ascii() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Message contains non-ASCII bytes",
                ));
            }
            // ASCII is valid UTF-8
            Ok(Some(String::from_utf8_lossy(body).into_owned()))
        }
    }

    impl<T: AsRef<str>> Encoder<T> for NulTerminatedCodec {
        type Error = io::Error;

        fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), io::Error> {
            let text = item.as_ref().as_bytes();
            dst.reserve(text.len() + 1);
            dst.put_slice(text);
            dst.put_u8(TERMINATOR);
            Ok(())
        }
    }

}
