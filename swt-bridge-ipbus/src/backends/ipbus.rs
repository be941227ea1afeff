//! # IPbus Backend
//!
//! Executes packets on an IPbus 2.0 target over UDP. Every packet is sent as one
//! control packet and the backend blocks until the matching reply arrives or the
//! timeout expires. Lost packets are not resent, and a reply arriving after its timeout
//! is discarded before the next request goes out.
//!
//! ## Example Usage
//!
//! ```ignore
//! use swt_bridge::server::{Server, Config};
//!
//! let backend = IpbusBackend::new("172.20.75.175:50001".parse()?, 0, Duration::from_secs(1))?;
//! let server = Server::new(backend, Config::default());
//! server.listen("127.0.0.1:5000").await?;
//! ```
use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    sync::Mutex,
    time::Duration,
};

use swt_bridge::{
    Transport,
    error::TransportError,
    packet::{Packet, Transaction},
};

const PROTOCOL_VERSION: u32 = 2;
const BYTE_ORDER_QUALIFIER: u32 = 0xF;
const CONTROL_PACKET: u32 = 0x0;
const REQUEST_INFO_CODE: u32 = 0xF;
const SUCCESS_INFO_CODE: u8 = 0x0;
/// Every transaction addresses a single register.
const WORDS_PER_TRANSACTION: u8 = 1;

/// Packet ID 0 disables the IPbus reliability mechanism.
const PACKET_ID: u16 = 0;

const RECEIVE_BUFFER_LEN: usize = 4096;

fn packet_header(packet_id: u16) -> u32 {
    (PROTOCOL_VERSION << 28) | (u32::from(packet_id) << 8) | (BYTE_ORDER_QUALIFIER << 4) | CONTROL_PACKET
}

fn transaction_header(transaction_id: usize, words: u8, type_id: u8, info_code: u32) -> u32 {
    (PROTOCOL_VERSION << 28)
        | ((transaction_id as u32 & 0xFFF) << 16)
        | (u32::from(words) << 8)
        | (u32::from(type_id) << 4)
        | info_code
}

/// Serializes a packet into big-endian IPbus words.
pub fn encode_request(packet: &Packet, packet_id: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(packet.request_size() * 4);
    out.extend_from_slice(&packet_header(packet_id).to_be_bytes());
    for (id, transaction) in packet.transactions().iter().enumerate() {
        let header = transaction_header(
            id,
            WORDS_PER_TRANSACTION,
            transaction.type_id(),
            REQUEST_INFO_CODE,
        );
        out.extend_from_slice(&header.to_be_bytes());
        for word in transaction.request_body() {
            out.extend_from_slice(&word.to_be_bytes());
        }
    }
    out
}

/// Parses the reply to `packet`, returning one word per transaction.
/// Writes report the value they stored.
pub fn decode_reply(packet: &Packet, packet_id: u16, bytes: &[u8]) -> Result<Vec<u32>, TransportError> {
    if bytes.len() % 4 != 0 {
        return Err(TransportError::MalformedReply(format!(
            "{} bytes is not a whole number of words",
            bytes.len()
        )));
    }
    let mut words = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    let mut next = |what: &str| {
        words
            .next()
            .ok_or_else(|| TransportError::MalformedReply(format!("reply ends before {}", what)))
    };

    let header = next("packet header")?;
    if header != packet_header(packet_id) {
        return Err(TransportError::MalformedReply(format!(
            "unexpected packet header 0x{:08X}",
            header
        )));
    }

    let mut replies = Vec::with_capacity(packet.len());
    for (id, transaction) in packet.transactions().iter().enumerate() {
        let header = next("transaction header")?;
        let info_code = (header & 0xF) as u8;
        let expected = transaction_header(
            id,
            WORDS_PER_TRANSACTION,
            transaction.type_id(),
            u32::from(info_code),
        );
        if header != expected {
            return Err(TransportError::MalformedReply(format!(
                "transaction {}: expected header 0x{:08X}, got 0x{:08X}",
                id, expected, header
            )));
        }
        if info_code != SUCCESS_INFO_CODE {
            return Err(TransportError::TransactionFailed {
                transaction: id,
                code: info_code,
            });
        }
        let value = match transaction {
            Transaction::Write { value, .. } => *value,
            _ => next("transaction data")?,
        };
        replies.push(value);
    }
    Ok(replies)
}

/// Drops replies that arrived after their request timed out.
///
/// With packet ID 0 a late reply cannot be told apart from the answer to the next request.
fn discard_stale_replies(socket: &UdpSocket) -> io::Result<()> {
    socket.set_nonblocking(true)?;
    let mut buf = [0u8; RECEIVE_BUFFER_LEN];
    let result = loop {
        match socket.recv(&mut buf) {
            Ok(len) => log::warn!("Discarding stale {} byte reply", len),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
            // pending ICMP error from an earlier send
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {}
            Err(e) => break Err(e),
        }
    };
    socket.set_nonblocking(false)?;
    result
}

/// IPbus target reached over UDP.
pub struct IpbusBackend {
    socket: Mutex<UdpSocket>,
    target: SocketAddr,
}

impl IpbusBackend {
    /// Binds a local socket (`local_port` 0 picks any) and connects it to `target`.
    pub fn new(target: SocketAddr, local_port: u16, timeout: Duration) -> io::Result<IpbusBackend> {
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, local_port).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, local_port).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(target)?;
        socket.set_read_timeout(Some(timeout))?;
        log::info!(
            "IPbus target {} via local {}, timeout {:?}",
            target,
            socket.local_addr()?,
            timeout
        );
        Ok(IpbusBackend {
            socket: Mutex::new(socket),
            target,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Transport for IpbusBackend {
    fn transceive(&self, packet: &Packet) -> Result<Vec<u32>, TransportError> {
        let request = encode_request(packet, PACKET_ID);
        log::debug!(
            "IPbus request: {} transactions, {} bytes",
            packet.len(),
            request.len()
        );
        log::trace!("IPbus request data: {:02x?}", request);

        // one exchange at a time, replies carry no request identity
        let socket = self
            .socket
            .lock()
            .map_err(|_| io::Error::other("IPbus socket lock poisoned"))?;
        discard_stale_replies(&socket)?;
        socket.send(&request)?;
        let mut buf = [0u8; RECEIVE_BUFFER_LEN];
        let len = socket.recv(&mut buf).inspect_err(|e| {
            log::error!("No reply from IPbus target {}: {}", self.target, e);
        })?;
        log::trace!("IPbus reply data: {:02x?}", &buf[..len]);
        decode_reply(packet, PACKET_ID, &buf[..len])
    }
}

#[cfg(test)]
mod test {
    use std::{net::UdpSocket, thread, time::Duration};

    use swt_bridge::{
        Transport,
        error::TransportError,
        packet::{Packet, Transaction},
    };

    use super::{IpbusBackend, decode_reply, encode_request};

    fn sample_packet() -> Packet {
        let mut packet = Packet::new();
        packet.push(Transaction::Read { address: 0x0A }, Some(0));
        packet.push(
            Transaction::Write {
                address: 0x0B,
                value: 0xB0,
            },
            None,
        );
        packet.push(
            Transaction::RmwBits {
                address: 0x0C,
                and_mask: 0xFFFF_0000,
                or_mask: 0x1,
            },
            Some(2),
        );
        packet
    }

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn encode_control_packet() {
        let encoded = encode_request(&sample_packet(), 0);
        assert_eq!(
            encoded,
            words(&[
                0x2000_00F0,
                0x2000_010F,
                0x0000_000A,
                0x2001_011F,
                0x0000_000B,
                0x0000_00B0,
                0x2002_014F,
                0x0000_000C,
                0xFFFF_0000,
                0x0000_0001,
            ])
        );
        assert_eq!(encoded.len(), sample_packet().request_size() * 4);
    }

    #[test]
    fn decode_successful_reply() {
        let reply = words(&[
            0x2000_00F0,
            0x2000_0100,
            0x1234_5678,
            0x2001_0110,
            0x2002_0140,
            0x0000_00FF,
        ]);
        assert_eq!(
            decode_reply(&sample_packet(), 0, &reply).unwrap(),
            vec![0x1234_5678, 0xB0, 0xFF]
        );
        assert_eq!(reply.len(), sample_packet().response_size() * 4);
    }

    #[test]
    fn decode_failed_transaction() {
        let reply = words(&[0x2000_00F0, 0x2000_0104]);
        match decode_reply(&sample_packet(), 0, &reply) {
            Err(TransportError::TransactionFailed {
                transaction: 0,
                code: 4,
            }) => {}
            other => panic!("expected TransactionFailed, got {:?}", other),
        }
    }

    #[test]
    fn decode_truncated_reply() {
        let reply = words(&[0x2000_00F0, 0x2000_0100]);
        assert!(matches!(
            decode_reply(&sample_packet(), 0, &reply),
            Err(TransportError::MalformedReply(_))
        ));
        assert!(matches!(
            decode_reply(&sample_packet(), 0, &[0x20, 0x00]),
            Err(TransportError::MalformedReply(_))
        ));
    }

    #[test]
    fn exchange_with_udp_target() {
        let target = UdpSocket::bind("127.0.0.1:0").unwrap();
        let target_addr = target.local_addr().unwrap();
        let responder = thread::spawn(move || {
            let mut buf = [0u8; 1500];
            let (len, peer) = target.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..len], &encode_request(&sample_packet(), 0)[..]);
            let reply = words(&[
                0x2000_00F0,
                0x2000_0100,
                0x0000_0042,
                0x2001_0110,
                0x2002_0140,
                0x0000_0007,
            ]);
            target.send_to(&reply, peer).unwrap();
        });

        let backend = IpbusBackend::new(target_addr, 0, Duration::from_secs(5)).unwrap();
        let replies = backend.transceive(&sample_packet()).unwrap();
        assert_eq!(replies, vec![0x42, 0xB0, 0x7]);
        responder.join().unwrap();
    }

    #[test]
    fn late_reply_is_not_taken_for_the_next() {
        let target = UdpSocket::bind("127.0.0.1:0").unwrap();
        let target_addr = target.local_addr().unwrap();
        let mut packet = Packet::new();
        packet.push(Transaction::Read { address: 0x0A }, Some(0));
        let reply = |value: u32| words(&[0x2000_00F0, 0x2000_0100, value]);

        let responder = thread::spawn(move || {
            let mut buf = [0u8; 1500];
            let (_, peer) = target.recv_from(&mut buf).unwrap();
            thread::sleep(Duration::from_millis(200));
            target.send_to(&reply(0xAAAA), peer).unwrap();
            let (_, peer) = target.recv_from(&mut buf).unwrap();
            target.send_to(&reply(0xBBBB), peer).unwrap();
        });

        let backend = IpbusBackend::new(target_addr, 0, Duration::from_millis(100)).unwrap();
        assert!(matches!(
            backend.transceive(&packet),
            Err(TransportError::Io(_))
        ));
        // let the late reply land in the socket buffer
        thread::sleep(Duration::from_millis(300));
        assert_eq!(backend.transceive(&packet).unwrap(), vec![0xBBBB]);
        responder.join().unwrap();
    }

    #[test]
    fn silent_target_times_out() {
        let target = UdpSocket::bind("127.0.0.1:0").unwrap();
        let backend =
            IpbusBackend::new(target.local_addr().unwrap(), 0, Duration::from_millis(50)).unwrap();
        assert!(matches!(
            backend.transceive(&sample_packet()),
            Err(TransportError::Io(_))
        ));
    }
}
