//! Command sequences: parsing the incoming text and rendering the per-line response.
use std::fmt::Write;

use crate::{
    codec::{encode16, encode32},
    error::SequenceError,
    protocol::{Frame, Operation},
};

/// First line of every sequence.
pub const RESET_DIRECTIVE: &str = "reset";
/// A line equal to this echoes the preceding frame. Other lines containing it are padding.
pub const READ_DIRECTIVE: &str = "read";
/// Marks a line that is acknowledged with `0`.
pub const WRITE_MARKER: &str = "write";
/// Precedes the hexadecimal frame payload.
pub const PAYLOAD_MARKER: &str = "0x";

/// A parsed command sequence: one [Operation] per line after the `reset` directive.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sequence {
    operations: Vec<Operation>,
}

/// Extracts the payload between `0x` and the next comma (or end of line).
fn payload(line: &str) -> Option<&str> {
    let start = line.find(PAYLOAD_MARKER)? + PAYLOAD_MARKER.len();
    let rest = &line[start..];
    Some(rest.find(',').map_or(rest, |end| &rest[..end]))
}

impl Sequence {
    pub fn new(operations: Vec<Operation>) -> Sequence {
        Sequence { operations }
    }

    /// Parses a newline separated command sequence.
    ///
    /// A single terminating newline does not produce an extra line, blank lines in
    /// between do and are rejected. Any malformed line rejects the whole sequence.
    pub fn parse(text: &str) -> Result<Sequence, SequenceError> {
        let mut lines = text.lines();
        match lines.next() {
            Some(RESET_DIRECTIVE) => {}
            other => {
                return Err(SequenceError::MissingReset(
                    other.unwrap_or_default().to_string(),
                ));
            }
        }

        let mut operations = Vec::new();
        // line 1 is the directive
        for (line, text) in (2..).zip(lines) {
            if text == READ_DIRECTIVE {
                if operations.is_empty() {
                    return Err(SequenceError::DanglingRead { line });
                }
                operations.push(Operation::Read);
                continue;
            }
            if text.contains(READ_DIRECTIVE) {
                operations.push(Operation::Padding {
                    acknowledge: text.contains(WRITE_MARKER),
                });
                continue;
            }

            let hex = payload(text).ok_or(SequenceError::MissingPayload { line })?;
            let frame =
                Frame::from_hex(hex).map_err(|error| SequenceError::InvalidFrame { line, error })?;
            log::trace!("Line {}: {:?}", line, frame);
            operations.push(Operation::Frame {
                frame,
                acknowledge: text.contains(WRITE_MARKER),
            });
        }

        Ok(Sequence { operations })
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Renders the response entries after execution.
    ///
    /// `results` holds one data word per operation, in order. For operations that
    /// were not bound to a transaction reply this is the frame's own data.
    /// A `read` echoes the operation before it with that operation's result.
    pub fn format_entries(&self, results: &[u32]) -> String {
        let mut out = String::new();
        for (index, operation) in self.operations.iter().enumerate() {
            match operation {
                Operation::Read => {
                    let Some(previous) = index.checked_sub(1) else {
                        continue;
                    };
                    let frame = self.operations[previous].frame();
                    let data = results.get(previous).copied().unwrap_or(frame.data);
                    let mode = encode16(frame.mode);
                    let _ = writeln!(
                        out,
                        "{}{}{}{}",
                        PAYLOAD_MARKER,
                        &mode[1..],
                        encode32(frame.address),
                        encode32(data)
                    );
                }
                Operation::Frame {
                    acknowledge: true, ..
                }
                | Operation::Padding { acknowledge: true } => out.push_str("0\n"),
                Operation::Frame { .. } | Operation::Padding { .. } => {}
            }
        }
        out
    }
}

/// Composes a well-formed command sequence.
///
/// ```
/// use swt_protocol::sequence::SequenceBuilder;
///
/// let text = SequenceBuilder::new().read_register(0x0A).build();
/// assert_eq!(text, "reset\nwrite 0x0000000000A00000000,\nread\n");
/// ```
#[derive(Clone, Debug)]
pub struct SequenceBuilder {
    text: String,
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceBuilder {
    pub fn new() -> SequenceBuilder {
        SequenceBuilder {
            text: format!("{}\n", RESET_DIRECTIVE),
        }
    }

    /// Appends an arbitrary frame as a `write` line.
    pub fn write_frame(mut self, frame: Frame) -> Self {
        let _ = writeln!(
            self.text,
            "{} {}{},",
            WRITE_MARKER,
            PAYLOAD_MARKER,
            frame.to_hex()
        );
        self
    }

    /// Appends a `read` line, echoing the previous frame after execution.
    pub fn read(mut self) -> Self {
        self.text.push_str(READ_DIRECTIVE);
        self.text.push('\n');
        self
    }

    /// Reads a register and echoes the fetched value.
    pub fn read_register(self, address: u32) -> Self {
        self.write_frame(Frame::read(address)).read()
    }

    pub fn write_register(self, address: u32, value: u32) -> Self {
        self.write_frame(Frame::write(address, value))
    }

    /// Updates a register to `(value & and_mask) | or_mask` and echoes the transaction result.
    pub fn rmw_bits(self, address: u32, and_mask: u32, or_mask: u32) -> Self {
        self.write_frame(Frame::new(Frame::MODE_RMW_AND, address, and_mask))
            .read()
            .write_frame(Frame::new(Frame::MODE_RMW_OR, address, or_mask))
    }

    /// Adds `addend` to a register and echoes the transaction result.
    pub fn rmw_sum(self, address: u32, addend: u32) -> Self {
        self.write_frame(Frame::new(Frame::MODE_RMW_SUM, address, addend))
            .read()
    }

    pub fn build(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod test {
    use crate::error::{DecodeError, SequenceError};
    use crate::protocol::{Frame, Operation};
    use crate::sequence::{Sequence, SequenceBuilder};

    #[test]
    fn parse_write_line() {
        let sequence = Sequence::parse("reset\nwrite 0x0010000000A000000B0,\n").unwrap();
        assert_eq!(
            sequence.operations(),
            &[Operation::Frame {
                frame: Frame::new(1, 0x0A, 0xB0),
                acknowledge: true,
            }]
        );
    }

    #[test]
    fn payload_runs_to_end_of_line_without_comma() {
        let sequence = Sequence::parse("reset\nwrite 0x0010000000A000000B0").unwrap();
        assert_eq!(sequence.operations()[0].frame(), Frame::new(1, 0x0A, 0xB0));
    }

    #[test]
    fn carriage_returns_are_stripped() {
        let sequence = Sequence::parse("reset\r\nwrite 0x0010000000A000000B0,\r\nread\r\n").unwrap();
        assert_eq!(sequence.len(), 2);
        assert_eq!(sequence.operations()[1], Operation::Read);
    }

    #[test]
    fn missing_reset_rejects() {
        assert_eq!(
            Sequence::parse("write 0x0010000000A000000B0,\n"),
            Err(SequenceError::MissingReset(
                "write 0x0010000000A000000B0,".to_string()
            ))
        );
        assert_eq!(
            Sequence::parse(""),
            Err(SequenceError::MissingReset(String::new()))
        );
        assert!(matches!(
            Sequence::parse(" reset\n"),
            Err(SequenceError::MissingReset(_))
        ));
    }

    #[test]
    fn reset_only_is_empty() {
        assert!(Sequence::parse("reset\n").unwrap().is_empty());
    }

    #[test]
    fn invalid_payload_rejects_whole_sequence() {
        let text = "reset\nwrite 0x0010000000A000000B0,\nwrite 0x0010000000A00000B0,\n";
        assert_eq!(
            Sequence::parse(text),
            Err(SequenceError::InvalidFrame {
                line: 3,
                error: DecodeError::MalformedFrame { len: 18 }
            })
        );
    }

    #[test]
    fn blank_line_rejects() {
        let text = "reset\nwrite 0x0010000000A000000B0,\n\nread\n";
        assert_eq!(
            Sequence::parse(text),
            Err(SequenceError::MissingPayload { line: 3 })
        );
    }

    #[test]
    fn read_first_rejects() {
        assert_eq!(
            Sequence::parse("reset\nread\n"),
            Err(SequenceError::DanglingRead { line: 2 })
        );
    }

    #[test]
    fn format_entries_echoes_previous_result() {
        let sequence = Sequence::parse(
            "reset\nwrite 0x0000000000A00000000,\nread\nwrite 0x0010000000B00000001,\n",
        )
        .unwrap();
        let entries = sequence.format_entries(&[0x1234_5678, 0, 1]);
        assert_eq!(entries, "0\n0x0000000000A12345678\n0\n");
    }

    #[test]
    fn only_bare_read_lines_echo() {
        let sequence =
            Sequence::parse("reset\nwrite 0x0010000000A000000B0,\nwrite readback,\n").unwrap();
        assert_eq!(
            sequence.operations()[1],
            Operation::Padding { acknowledge: true }
        );
        assert_eq!(sequence.format_entries(&[0xB0, 0]), "0\n0\n");

        let sequence = Sequence::parse("reset\nwrite 0x0010000000A000000B0,\nread \n").unwrap();
        assert_eq!(
            sequence.operations()[1],
            Operation::Padding { acknowledge: false }
        );
        assert_eq!(sequence.format_entries(&[0xB0, 0]), "0\n");
    }

    #[test]
    fn padding_line_may_lead() {
        let sequence = Sequence::parse("reset\nreadout\nwrite 0x0010000000A000000B0,\n").unwrap();
        assert_eq!(sequence.len(), 2);
        assert_eq!(sequence.format_entries(&[0, 0xB0]), "0\n");
    }

    #[test]
    fn unacknowledged_frames_produce_no_entry() {
        let sequence = Sequence::parse("reset\n0x0010000000A000000B0\n").unwrap();
        assert_eq!(sequence.format_entries(&[0xB0]), "");
    }

    #[test]
    fn builder_output_parses() {
        let text = SequenceBuilder::new()
            .write_register(0x10, 0xFF)
            .rmw_bits(0x10, 0xF0, 0x01)
            .rmw_sum(0x11, 2)
            .read_register(0x12)
            .build();
        let sequence = Sequence::parse(&text).unwrap();
        let frames: Vec<Frame> = sequence.operations().iter().map(|op| op.frame()).collect();
        assert_eq!(
            frames,
            vec![
                Frame::write(0x10, 0xFF),
                Frame::new(2, 0x10, 0xF0),
                Frame::PADDING,
                Frame::new(3, 0x10, 0x01),
                Frame::new(4, 0x11, 2),
                Frame::PADDING,
                Frame::read(0x12),
                Frame::PADDING,
            ]
        );
    }
}
