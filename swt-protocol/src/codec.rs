/// Hexadecimal text representation of frames and register words
use crate::{error::DecodeError, protocol::Frame};

/// Number of characters in a frame payload: 3 for the mode, 8 for the address and 8 for the data.
pub const FRAME_HEX_LEN: usize = 19;

const MODE_DIGITS: usize = 3;
const WORD_DIGITS: usize = 8;

/// Decodes a single hexadecimal digit, accepting either case.
pub fn hex_nibble(ch: char) -> Result<u8, DecodeError> {
    match ch {
        '0'..='9' => Ok(ch as u8 - b'0'),
        'a'..='f' => Ok(ch as u8 - b'a' + 10),
        'A'..='F' => Ok(ch as u8 - b'A' + 10),
        _ => Err(DecodeError::InvalidHexDigit(ch)),
    }
}

/// Renders a half word as 4 uppercase hex digits.
pub fn encode16(value: u16) -> String {
    format!("{:04X}", value)
}

/// Renders a word as 8 uppercase hex digits.
pub fn encode32(value: u32) -> String {
    format!("{:08X}", value)
}

fn fold_nibbles(nibbles: &[u8]) -> u32 {
    nibbles
        .iter()
        .fold(0_u32, |acc, nibble| (acc << 4) | u32::from(*nibble))
}

impl Frame {
    /// Parses the 19 character payload that follows `0x` on a command line.
    pub fn from_hex(hex: &str) -> Result<Frame, DecodeError> {
        let len = hex.chars().count();
        if len != FRAME_HEX_LEN {
            return Err(DecodeError::MalformedFrame { len });
        }

        let mut nibbles = [0_u8; FRAME_HEX_LEN];
        for (nibble, ch) in nibbles.iter_mut().zip(hex.chars()) {
            *nibble = hex_nibble(ch)?;
        }

        let (mode, rest) = nibbles.split_at(MODE_DIGITS);
        let (address, data) = rest.split_at(WORD_DIGITS);
        Ok(Frame {
            // three nibbles never exceed 0xFFF
            mode: fold_nibbles(mode) as u16,
            address: fold_nibbles(address),
            data: fold_nibbles(data),
        })
    }

    /// Renders the frame in its 19 character wire form.
    ///
    /// The mode is rendered as a half word with the leading digit dropped, so only
    /// the low 12 bits survive.
    pub fn to_hex(&self) -> String {
        let mode = encode16(self.mode);
        format!(
            "{}{}{}",
            &mode[1..],
            encode32(self.address),
            encode32(self.data)
        )
    }
}

#[test]
fn encode_is_fixed_width_uppercase() {
    assert_eq!(encode16(0), "0000");
    assert_eq!(encode16(0xbeef), "BEEF");
    assert_eq!(encode32(0xA), "0000000A");
    assert_eq!(encode32(u32::MAX), "FFFFFFFF");
}

#[cfg(test)]
mod test {
    use crate::codec::{FRAME_HEX_LEN, encode16, encode32, hex_nibble};
    use crate::error::DecodeError;
    use crate::protocol::Frame;

    const VALID: &str = "0010000000A000000B0";

    #[test]
    fn decode_fields() {
        let frame = Frame::from_hex(VALID).unwrap();
        assert_eq!(frame, Frame::new(1, 0x0000_000A, 0x0000_00B0));
    }

    #[test]
    fn decode_is_case_insensitive() {
        let upper = Frame::from_hex("2FF12345678DEADBEEF").unwrap();
        let lower = Frame::from_hex("2ff12345678deadbeef").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.mode, 0x2FF);
        assert_eq!(upper.address, 0x1234_5678);
        assert_eq!(upper.data, 0xDEAD_BEEF);
    }

    #[test]
    fn wrong_length_is_malformed() {
        for len in [0, 1, 18, 20, 40] {
            let text = "0".repeat(len);
            assert_eq!(
                Frame::from_hex(&text),
                Err(DecodeError::MalformedFrame { len })
            );
        }
    }

    #[test]
    fn non_hex_character_in_any_position() {
        for position in 0..FRAME_HEX_LEN {
            for bad in ['G', 'x', ' ', ',', '-'] {
                let mut text: Vec<char> = VALID.chars().collect();
                text[position] = bad;
                let text: String = text.into_iter().collect();
                assert_eq!(
                    Frame::from_hex(&text),
                    Err(DecodeError::InvalidHexDigit(bad)),
                    "position {}",
                    position
                );
            }
        }
    }

    #[test]
    fn nibble_values() {
        assert_eq!(hex_nibble('0'), Ok(0));
        assert_eq!(hex_nibble('9'), Ok(9));
        assert_eq!(hex_nibble('a'), Ok(10));
        assert_eq!(hex_nibble('F'), Ok(15));
        assert_eq!(hex_nibble('g'), Err(DecodeError::InvalidHexDigit('g')));
    }

    #[test]
    fn encoded_fields_decode_to_same_values() {
        let frame = Frame::new(0x3, 0xCAFE_0001, 0x8000_0000);
        let text = frame.to_hex();
        assert_eq!(text, "003CAFE000180000000");
        assert_eq!(Frame::from_hex(&text), Ok(frame));

        let mode = u16::from_str_radix(&encode16(0x0ABC), 16).unwrap();
        let word = u32::from_str_radix(&encode32(0x0102_0304), 16).unwrap();
        assert_eq!(mode, 0x0ABC);
        assert_eq!(word, 0x0102_0304);
    }

    #[test]
    fn to_hex_drops_leading_mode_digit() {
        let frame = Frame::new(0x1234, 0, 0);
        assert_eq!(&frame.to_hex()[..3], "234");
    }
}
