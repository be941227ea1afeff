use swt_protocol::{response::Response, sequence::Sequence};

use crate::{
    Transport,
    compiler::compile,
    error::{BridgeError, TransportError},
    packet::PacketLimits,
};

/// Executes command sequences against a [Transport].
///
/// All state of a request lives in [Bridge::handle], so one bridge can serve
/// concurrent requests as long as the transport can.
#[derive(Debug)]
pub struct Bridge<T: Transport> {
    transport: T,
    limits: PacketLimits,
}

impl<T: Transport> Bridge<T> {
    pub fn new(transport: T, limits: PacketLimits) -> Bridge<T> {
        Bridge { transport, limits }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn limits(&self) -> PacketLimits {
        self.limits
    }

    /// Runs one command sequence and renders the response.
    pub fn handle(&self, request: &str) -> Response {
        match self.execute(request) {
            Ok(entries) => Response::Success(entries),
            Err(err) => {
                log::error!("{}", err);
                Response::Failure
            }
        }
    }

    /// Runs one command sequence, returning the response entries.
    ///
    /// Nothing is sent unless the whole sequence parses and compiles. Packets are sent in
    /// order and the first transport failure ends the request; packets already sent are
    /// not rolled back.
    pub fn execute(&self, request: &str) -> Result<String, BridgeError> {
        let sequence = Sequence::parse(request)?;
        let packets = compile(sequence.operations(), self.limits)?;
        log::debug!(
            "Compiled {} operations into {} packets",
            sequence.len(),
            packets.len()
        );

        let mut results: Vec<u32> = sequence
            .operations()
            .iter()
            .map(|operation| operation.frame().data)
            .collect();

        for (index, packet) in packets.iter().enumerate() {
            let replies = self
                .transport
                .transceive(packet)
                .and_then(|replies| {
                    if replies.len() == packet.len() {
                        Ok(replies)
                    } else {
                        Err(TransportError::ReplyCountMismatch {
                            expected: packet.len(),
                            got: replies.len(),
                        })
                    }
                })
                .map_err(|error| BridgeError::TransportFailure {
                    packet: index,
                    error,
                })?;

            for (binding, value) in packet.bindings().iter().zip(replies) {
                if let Some(result) = binding.and_then(|operation| results.get_mut(operation)) {
                    *result = value;
                }
            }
        }

        Ok(sequence.format_entries(&results))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use swt_protocol::response::Response;

    use crate::bridge::Bridge;
    use crate::error::{BridgeError, TransportError};
    use crate::packet::{Packet, PacketLimits, Transaction};
    use crate::Transport;

    /// Answers every transaction with `address + 0x100`, failing the packet numbered `fail_at`.
    #[derive(Default)]
    struct Scripted {
        sent: Mutex<Vec<Vec<Transaction>>>,
        fail_at: Option<usize>,
    }

    impl Transport for Scripted {
        fn transceive(&self, packet: &Packet) -> Result<Vec<u32>, TransportError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(packet.transactions().to_vec());
            if self.fail_at == Some(sent.len() - 1) {
                return Err(TransportError::MalformedReply("scripted".to_string()));
            }
            Ok(packet
                .transactions()
                .iter()
                .map(|t| t.address() + 0x100)
                .collect())
        }
    }

    #[test]
    fn write_is_acknowledged() {
        let bridge = Bridge::new(Scripted::default(), PacketLimits::default());
        let response = bridge.handle("reset\nwrite 0x0010000000A000000B0,\n");
        assert_eq!(response.to_string(), "success 0\n");
        assert_eq!(
            bridge.transport().sent.lock().unwrap()[0],
            vec![Transaction::Write {
                address: 0x0A,
                value: 0xB0
            }]
        );
    }

    #[test]
    fn read_echoes_transport_value() {
        let bridge = Bridge::new(Scripted::default(), PacketLimits::default());
        let response = bridge.handle("reset\nwrite 0x0000000000A00000000,\nread\n");
        assert_eq!(response.to_string(), "success 0\n0x0000000000A0000010A\n");
    }

    #[test]
    fn rejected_sequence_sends_nothing() {
        let bridge = Bridge::new(Scripted::default(), PacketLimits::default());
        assert_eq!(
            bridge.handle("rest\nwrite 0x0010000000A000000B0,\n"),
            Response::Failure
        );
        assert!(bridge.transport().sent.lock().unwrap().is_empty());
    }

    #[test]
    fn reply_count_mismatch_fails() {
        struct Short;
        impl Transport for Short {
            fn transceive(&self, _packet: &Packet) -> Result<Vec<u32>, TransportError> {
                Ok(Vec::new())
            }
        }
        let bridge = Bridge::new(Short, PacketLimits::default());
        match bridge.execute("reset\nwrite 0x0010000000A000000B0,\n") {
            Err(BridgeError::TransportFailure {
                packet: 0,
                error: TransportError::ReplyCountMismatch {
                    expected: 1,
                    got: 0,
                },
            }) => {}
            other => panic!("expected ReplyCountMismatch, got {:?}", other),
        }
    }

    #[test]
    fn failure_on_second_packet() {
        let transport = Scripted {
            fail_at: Some(1),
            ..Default::default()
        };
        let limits = PacketLimits::new(8, 4).unwrap();
        let bridge = Bridge::new(transport, limits);
        let response =
            bridge.handle("reset\nwrite 0x0010000000100000001,\nwrite 0x0010000000200000002,\n");
        assert_eq!(response.to_string(), "failure");
        let sent = bridge.transport().sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0][0].address(), 1);
        assert_eq!(sent[1][0].address(), 2);
    }
}
