/// A single SWT register operation as carried on one command line.
///
/// `mode` selects the transaction type, `address` is the register address on the
/// remote device and `data` is the input value. Frames decoded from text always
/// have `mode <= 0xFFF`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Frame {
    pub mode: u16,
    pub address: u32,
    pub data: u32,
}

impl Frame {
    pub const MODE_READ: u16 = 0;
    pub const MODE_WRITE: u16 = 1;
    pub const MODE_RMW_AND: u16 = 2;
    pub const MODE_RMW_OR: u16 = 3;
    pub const MODE_RMW_SUM: u16 = 4;

    /// The all-zero frame. Stands in for `read` lines and is never transmitted.
    pub const PADDING: Frame = Frame {
        mode: 0,
        address: 0,
        data: 0,
    };

    pub fn new(mode: u16, address: u32, data: u32) -> Frame {
        Frame {
            mode,
            address,
            data,
        }
    }

    pub fn read(address: u32) -> Frame {
        Frame::new(Self::MODE_READ, address, 0)
    }

    pub fn write(address: u32, value: u32) -> Frame {
        Frame::new(Self::MODE_WRITE, address, value)
    }

    pub fn is_padding(&self) -> bool {
        *self == Self::PADDING
    }

    /// Classifies the frame by its mode.
    ///
    /// Returns `None` for modes the bridge does not know how to execute.
    pub fn transaction_kind(&self) -> Option<TransactionKind> {
        if self.is_padding() {
            return Some(TransactionKind::NoOp);
        }
        match self.mode {
            Self::MODE_READ => Some(TransactionKind::Read),
            Self::MODE_WRITE => Some(TransactionKind::Write),
            Self::MODE_RMW_AND => Some(TransactionKind::RmwAnd),
            Self::MODE_RMW_OR => Some(TransactionKind::RmwOr),
            Self::MODE_RMW_SUM => Some(TransactionKind::RmwSum),
            _ => None,
        }
    }
}

/// The kind of bus transaction a frame contributes to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransactionKind {
    Read,
    Write,
    /// First frame of a read-modify-write bits pair, carrying the AND mask.
    RmwAnd,
    /// Second frame of a read-modify-write bits pair, carrying the OR mask.
    RmwOr,
    /// Adds the frame data to the register content.
    RmwSum,
    /// Padding marker. Keeps `read` lines in place but produces no transaction.
    NoOp,
}

/// One command line of a sequence, after the leading directive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    /// A bare `read` line. Echoes the operation right before it once the sequence has run.
    Read,
    /// Any other line mentioning `read`. Holds no payload and echoes nothing;
    /// `acknowledge` is set if the line also mentions `write`.
    Padding { acknowledge: bool },
    /// A line with a frame payload. `acknowledge` is set for `write` lines, which answer `0`.
    Frame { frame: Frame, acknowledge: bool },
}

impl Operation {
    /// The frame this operation contributes to compilation.
    pub fn frame(&self) -> Frame {
        match self {
            Operation::Read | Operation::Padding { .. } => Frame::PADDING,
            Operation::Frame { frame, .. } => *frame,
        }
    }
}
