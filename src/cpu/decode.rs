//! Instruction decoder for the HP 3000.
//!
//! Two instruction formats share the 16-bit word space:
//! - extended formats, each identified by a `(mask, base)` pair and tried
//!   in a fixed priority order (several masks are narrow subsets of
//!   broader ones, so the order is significant);
//! - format 2, used when the top four bits are zero: two packed 6-bit
//!   stack opcodes, bits 6..11 executed first, then bits 0..5.

use crate::word::arith::ShiftKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index flag for memory reference and branch formats.
pub const X_BIT: u16 = 0x0800;
/// Indirect flag for memory reference and branch formats.
pub const I_BIT: u16 = 0x0400;
/// DB-relative flag in LOAD.
const LOAD_DB_BIT: u16 = 0x0200;
/// Index flag in DLSL/DLSR.
const SHIFT_X_BIT: u16 = 0x0200;
/// Backward flag for 5-bit displacements.
const SHORT_BACK: u16 = 0x0020;
/// Backward flag for 8-bit displacements.
const LONG_BACK: u16 = 0x0100;

/// Largest 5-bit displacement magnitude.
pub const SHORT_DISP_MAX: u16 = 0x1F;
/// Largest 8-bit displacement magnitude.
pub const LONG_DISP_MAX: u16 = 0xFF;
/// Largest DB-relative displacement.
pub const DB_DISP_MAX: u16 = 0x1FF;

/// A sign-magnitude displacement from an instruction's own address.
///
/// `.-0` and `.+0` are distinct encodings, so the sign is kept as a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Displacement {
    pub back: bool,
    pub magnitude: u16,
}

impl Displacement {
    pub const fn forward(magnitude: u16) -> Self {
        Self { back: false, magnitude }
    }

    pub const fn backward(magnitude: u16) -> Self {
        Self { back: true, magnitude }
    }

    /// Apply to `origin`, wrapping in 16 bits.
    pub fn apply(self, origin: u16) -> u16 {
        if self.back {
            origin.wrapping_sub(self.magnitude)
        } else {
            origin.wrapping_add(self.magnitude)
        }
    }
}

/// Single and double word shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShiftOp {
    Asl,
    Asr,
    Lsl,
    Lsr,
    Dasl,
    Dasr,
    Dlsl,
    Dlsr,
}

impl ShiftOp {
    pub const ALL: [ShiftOp; 8] = [
        ShiftOp::Asl,
        ShiftOp::Asr,
        ShiftOp::Lsl,
        ShiftOp::Lsr,
        ShiftOp::Dasl,
        ShiftOp::Dasr,
        ShiftOp::Dlsl,
        ShiftOp::Dlsr,
    ];

    pub const fn base(self) -> u16 {
        match self {
            ShiftOp::Asl => 0x1000,
            ShiftOp::Asr => 0x1040,
            ShiftOp::Lsl => 0x1080,
            ShiftOp::Lsr => 0x10C0,
            ShiftOp::Dasl => 0x1400,
            ShiftOp::Dasr => 0x1440,
            ShiftOp::Dlsl => 0x1480,
            ShiftOp::Dlsr => 0x14C0,
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            ShiftOp::Asl => "ASL",
            ShiftOp::Asr => "ASR",
            ShiftOp::Lsl => "LSL",
            ShiftOp::Lsr => "LSR",
            ShiftOp::Dasl => "DASL",
            ShiftOp::Dasr => "DASR",
            ShiftOp::Dlsl => "DLSL",
            ShiftOp::Dlsr => "DLSR",
        }
    }

    /// Whether the shift works on the RB:RA doubleword.
    pub const fn is_double(self) -> bool {
        matches!(self, ShiftOp::Dasl | ShiftOp::Dasr | ShiftOp::Dlsl | ShiftOp::Dlsr)
    }

    /// Whether the count may be extended by X.
    pub const fn accepts_index(self) -> bool {
        matches!(self, ShiftOp::Dlsl | ShiftOp::Dlsr)
    }

    pub const fn kind(self) -> ShiftKind {
        match self {
            ShiftOp::Asl | ShiftOp::Dasl => ShiftKind::ArithmeticLeft,
            ShiftOp::Asr | ShiftOp::Dasr => ShiftKind::ArithmeticRight,
            ShiftOp::Lsl | ShiftOp::Dlsl => ShiftKind::LogicalLeft,
            ShiftOp::Lsr | ShiftOp::Dlsr => ShiftKind::LogicalRight,
        }
    }
}

/// DB-relative memory reference instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemOp {
    Incm,
    Decm,
    Stor,
    Ldd,
    Std,
}

impl MemOp {
    pub const ALL: [MemOp; 5] = [MemOp::Incm, MemOp::Decm, MemOp::Stor, MemOp::Ldd, MemOp::Std];

    pub const fn base(self) -> u16 {
        match self {
            MemOp::Incm => 0xA200,
            MemOp::Decm => 0xB200,
            MemOp::Stor => 0x5200,
            MemOp::Ldd => 0xD200,
            MemOp::Std => 0xE200,
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            MemOp::Incm => "INCM",
            MemOp::Decm => "DECM",
            MemOp::Stor => "STOR",
            MemOp::Ldd => "LDD",
            MemOp::Std => "STD",
        }
    }
}

/// Modify-and-branch-if-zero instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountOp {
    /// RA += 1
    Iabz,
    /// X += 1
    Ixbz,
    /// X -= 1
    Dxbz,
}

impl CountOp {
    pub const ALL: [CountOp; 3] = [CountOp::Iabz, CountOp::Ixbz, CountOp::Dxbz];

    pub const fn base(self) -> u16 {
        match self {
            CountOp::Iabz => 0x11C0,
            CountOp::Ixbz => 0x1280,
            CountOp::Dxbz => 0x12C0,
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            CountOp::Iabz => "IABZ",
            CountOp::Ixbz => "IXBZ",
            CountOp::Dxbz => "DXBZ",
        }
    }
}

/// Branches on the carry and overflow bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagTest {
    Bcy,
    Bncy,
    Bov,
    Bnov,
}

impl FlagTest {
    pub const ALL: [FlagTest; 4] = [FlagTest::Bcy, FlagTest::Bncy, FlagTest::Bov, FlagTest::Bnov];

    pub const fn base(self) -> u16 {
        match self {
            FlagTest::Bcy => 0x1300,
            FlagTest::Bncy => 0x1340,
            FlagTest::Bov => 0x1600,
            FlagTest::Bnov => 0x1640,
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            FlagTest::Bcy => "BCY",
            FlagTest::Bncy => "BNCY",
            FlagTest::Bov => "BOV",
            FlagTest::Bnov => "BNOV",
        }
    }
}

/// Conditional branch mnemonics indexed by selector.
///
/// Selector bit 1 accepts CCL, bit 2 CCE and bit 4 CCG.
pub const BRANCH_CONDITIONS: [&str; 8] = ["BN", "BL", "BE", "BLE", "BG", "BNE", "BGE", "BA"];

/// Operand of a LOAD instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadTarget {
    /// DB + displacement
    Db(u16),
    /// Own address plus or minus displacement
    Relative(Displacement),
}

/// Format-2 stack opcodes, numbered by their 6-bit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StackOp {
    Nop = 0,
    Delb,
    Ddel,
    Zrox,
    Incx,
    Decx,
    Zero,
    Dzro,
    Dcmp,
    Dadd,
    Dsub,
    Mpyl,
    Divl,
    Dneg,
    Dxch,
    Cmp,
    Add,
    Sub,
    Mpy,
    Div,
    Neg,
    Test,
    Stbx,
    Dtst,
    Dflt,
    Btst,
    Xch,
    Inca,
    Deca,
    Xax,
    Adax,
    Adxa,
    Del,
    Zrob,
    Ldxb,
    Stax,
    Ldxa,
    Dup,
    Ddup,
    Flt,
    Fcmp,
    Fadd,
    Fsub,
    Fmpy,
    Fdiv,
    Fneg,
    Cab,
    Lcmp,
    Ladd,
    Lsub,
    Lmpy,
    Ldiv,
    Not,
    Or,
    Xor,
    And,
    Fixr,
    Fixt,
    Unk,
    Incb,
    Decb,
    Xbx,
    Adbx,
    Adxb,
}

const STACK_OPS: [StackOp; 64] = {
    use StackOp::*;
    [
        Nop, Delb, Ddel, Zrox, Incx, Decx, Zero, Dzro,
        Dcmp, Dadd, Dsub, Mpyl, Divl, Dneg, Dxch, Cmp,
        Add, Sub, Mpy, Div, Neg, Test, Stbx, Dtst,
        Dflt, Btst, Xch, Inca, Deca, Xax, Adax, Adxa,
        Del, Zrob, Ldxb, Stax, Ldxa, Dup, Ddup, Flt,
        Fcmp, Fadd, Fsub, Fmpy, Fdiv, Fneg, Cab, Lcmp,
        Ladd, Lsub, Lmpy, Ldiv, Not, Or, Xor, And,
        Fixr, Fixt, Unk, Incb, Decb, Xbx, Adbx, Adxb,
    ]
};

const STACK_MNEMONICS: [&str; 64] = [
    "NOP", "DELB", "DDEL", "ZROX", "INCX", "DECX", "ZERO", "DZRO",
    "DCMP", "DADD", "DSUB", "MPYL", "DIVL", "DNEG", "DXCH", "CMP",
    "ADD", "SUB", "MPY", "DIV", "NEG", "TEST", "STBX", "DTST",
    "DFLT", "BTST", "XCH", "INCA", "DECA", "XAX", "ADAX", "ADXA",
    "DEL", "ZROB", "LDXB", "STAX", "LDXA", "DUP", "DDUP", "FLT",
    "FCMP", "FADD", "FSUB", "FMPY", "FDIV", "FNEG", "CAB", "LCMP",
    "LADD", "LSUB", "LMPY", "LDIV", "NOT", "OR", "XOR", "AND",
    "FIXR", "FIXT", "UNK", "INCB", "DECB", "XBX", "ADBX", "ADXB",
];

impl StackOp {
    /// Look up a 6-bit code; only the low six bits are used.
    pub fn from_code(code: u8) -> Self {
        STACK_OPS[(code & 0x3F) as usize]
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Mnemonic, or `None` for the undefined slot.
    pub fn mnemonic(self) -> Option<&'static str> {
        match self {
            StackOp::Unk => None,
            op => Some(STACK_MNEMONICS[op as usize]),
        }
    }

    /// Case-insensitive lookup of a defined mnemonic.
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        STACK_MNEMONICS
            .iter()
            .position(|m| m.eq_ignore_ascii_case(name))
            .map(|i| STACK_OPS[i])
            .filter(|op| *op != StackOp::Unk)
    }
}

/// Decoded HP 3000 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Control / I/O ====================

    /// Stop the machine.
    Halt { code: u8 },

    /// Read a byte from a device.
    Rio { device: u8 },

    /// Write a word to a device.
    Wio { device: u8 },

    /// Stack-based procedure call.
    Scal { n: u8 },

    /// Procedure return, deleting `n` parameters.
    Sxit { n: u8 },

    // ==================== Shifts ====================

    /// Shift RA, or RB:RA for the double forms.
    Shift { op: ShiftOp, count: u8, indexed: bool },

    // ==================== Memory Reference ====================

    /// INCM, DECM, STOR, LDD and STD: DB + disp.
    MemRef { op: MemOp, disp: u16, indexed: bool, indirect: bool },

    /// Load a word into the stack.
    Load { target: LoadTarget, indexed: bool, indirect: bool },

    /// Push an 8-bit immediate.
    Ldi { value: u8 },

    /// Load X with an 8-bit immediate.
    Ldxi { value: u8 },

    /// Doubleword divide, RD:RC / RB:RA.
    Ddiv,

    // ==================== Branches ====================

    /// Unconditional branch.
    Br { disp: Displacement, indexed: bool, indirect: bool },

    /// Branch on condition code, selector per [`BRANCH_CONDITIONS`].
    Bcc { selector: u8, disp: Displacement, indirect: bool },

    /// Modify a counter and branch if it became zero.
    CountBranch { op: CountOp, disp: Displacement, indirect: bool },

    /// Branch on carry or overflow, clearing the tested bit.
    FlagBranch { op: FlagTest, disp: Displacement, indirect: bool },

    /// Pop and branch if odd.
    Bro { disp: Displacement },

    // ==================== Format 2 ====================

    /// Two packed stack opcodes, `first` from bits 6..11.
    Stack { first: StackOp, second: StackOp },
}

/// Extended formats and the format-2 catch-all.
#[derive(Debug, Clone, Copy)]
enum Format {
    Halt,
    Rio,
    Wio,
    Scal,
    Sxit,
    Shift(ShiftOp),
    MemRef(MemOp),
    Ddiv,
    Ldi,
    Ldxi,
    CountBranch(CountOp),
    Bcc,
    FlagBranch(FlagTest),
    Bro,
    Br,
    Load,
    Stack,
}

/// `(mask, base, format)` in decode priority order. The first entry with
/// `word & mask == base` wins.
const FORMATS: [(u16, u16, Format); 32] = [
    (0xFFF0, 0x30F0, Format::Halt),
    (0xFFF0, 0x3080, Format::Rio),
    (0xFFF0, 0x3090, Format::Wio),
    (0xFF00, 0x3100, Format::Scal),
    (0xFF00, 0x3400, Format::Sxit),
    (0xFFC0, 0x1000, Format::Shift(ShiftOp::Asl)),
    (0xFFC0, 0x1040, Format::Shift(ShiftOp::Asr)),
    (0xFFC0, 0x1080, Format::Shift(ShiftOp::Lsl)),
    (0xFFC0, 0x10C0, Format::Shift(ShiftOp::Lsr)),
    (0xFFC0, 0x1400, Format::Shift(ShiftOp::Dasl)),
    (0xFFC0, 0x1440, Format::Shift(ShiftOp::Dasr)),
    (0xFDC0, 0x1480, Format::Shift(ShiftOp::Dlsl)),
    (0xFDC0, 0x14C0, Format::Shift(ShiftOp::Dlsr)),
    (0xF200, 0xA200, Format::MemRef(MemOp::Incm)),
    (0xF200, 0xB200, Format::MemRef(MemOp::Decm)),
    (0xFFFF, 0x2179, Format::Ddiv),
    (0xFF00, 0x2200, Format::Ldi),
    (0xFF00, 0x2300, Format::Ldxi),
    (0xF7C0, 0x11C0, Format::CountBranch(CountOp::Iabz)),
    (0xF7C0, 0x1280, Format::CountBranch(CountOp::Ixbz)),
    (0xF7C0, 0x12C0, Format::CountBranch(CountOp::Dxbz)),
    (0xFA00, 0xC200, Format::Bcc),
    (0xF7C0, 0x1300, Format::FlagBranch(FlagTest::Bcy)),
    (0xF7C0, 0x1340, Format::FlagBranch(FlagTest::Bncy)),
    (0xF7C0, 0x1600, Format::FlagBranch(FlagTest::Bov)),
    (0xF7C0, 0x1640, Format::FlagBranch(FlagTest::Bnov)),
    (0xFFC0, 0x1780, Format::Bro),
    (0xF200, 0x5200, Format::MemRef(MemOp::Stor)),
    (0xF200, 0xD200, Format::MemRef(MemOp::Ldd)),
    (0xF200, 0xE200, Format::MemRef(MemOp::Std)),
    (0xF200, 0xC000, Format::Br),
    (0xF000, 0x4000, Format::Load),
];

#[inline]
fn short_disp(word: u16) -> Displacement {
    Displacement {
        back: word & SHORT_BACK != 0,
        magnitude: word & SHORT_DISP_MAX,
    }
}

#[inline]
fn long_disp(word: u16) -> Displacement {
    Displacement {
        back: word & LONG_BACK != 0,
        magnitude: word & LONG_DISP_MAX,
    }
}

#[inline]
fn encode_short(disp: Displacement) -> u16 {
    (if disp.back { SHORT_BACK } else { 0 }) | (disp.magnitude & SHORT_DISP_MAX)
}

#[inline]
fn encode_long(disp: Displacement) -> u16 {
    (if disp.back { LONG_BACK } else { 0 }) | (disp.magnitude & LONG_DISP_MAX)
}

#[inline]
fn flag(on: bool, bit: u16) -> u16 {
    if on {
        bit
    } else {
        0
    }
}

fn build(format: Format, w: u16) -> Instruction {
    let indexed = w & X_BIT != 0;
    let indirect = w & I_BIT != 0;
    match format {
        Format::Halt => Instruction::Halt { code: (w & 0xF) as u8 },
        Format::Rio => Instruction::Rio { device: (w & 0xF) as u8 },
        Format::Wio => Instruction::Wio { device: (w & 0xF) as u8 },
        Format::Scal => Instruction::Scal { n: w as u8 },
        Format::Sxit => Instruction::Sxit { n: w as u8 },
        Format::Shift(op) => Instruction::Shift {
            op,
            count: (w & 0x3F) as u8,
            indexed: op.accepts_index() && w & SHIFT_X_BIT != 0,
        },
        Format::MemRef(op) => Instruction::MemRef {
            op,
            disp: w & DB_DISP_MAX,
            indexed,
            indirect,
        },
        Format::Ddiv => Instruction::Ddiv,
        Format::Ldi => Instruction::Ldi { value: w as u8 },
        Format::Ldxi => Instruction::Ldxi { value: w as u8 },
        // Short branches carry I in 0x0800
        Format::CountBranch(op) => Instruction::CountBranch {
            op,
            disp: short_disp(w),
            indirect: w & X_BIT != 0,
        },
        Format::Bcc => Instruction::Bcc {
            selector: ((w >> 6) & 0x7) as u8,
            disp: short_disp(w),
            indirect,
        },
        Format::FlagBranch(op) => Instruction::FlagBranch {
            op,
            disp: short_disp(w),
            indirect: w & X_BIT != 0,
        },
        Format::Bro => Instruction::Bro { disp: short_disp(w) },
        Format::Br => Instruction::Br {
            disp: long_disp(w),
            indexed,
            indirect,
        },
        Format::Load => {
            let target = if w & LOAD_DB_BIT != 0 {
                LoadTarget::Db(w & DB_DISP_MAX)
            } else {
                LoadTarget::Relative(long_disp(w))
            };
            Instruction::Load {
                target,
                indexed,
                indirect,
            }
        }
        Format::Stack => Instruction::Stack {
            first: StackOp::from_code((w >> 6) as u8),
            second: StackOp::from_code(w as u8),
        },
    }
}

/// Decode a 16-bit instruction word.
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    if let Some(&(_, _, format)) = FORMATS.iter().find(|(mask, base, _)| word & mask == *base) {
        return Ok(build(format, word));
    }
    if word & 0xF000 == 0 {
        return Ok(build(Format::Stack, word));
    }
    Err(DecodeError::UnknownInstruction(word))
}

/// Encode an instruction back to its word.
///
/// Fields wider than their bit slot are truncated.
pub fn encode(instr: &Instruction) -> u16 {
    match *instr {
        Instruction::Halt { code } => 0x30F0 | (code as u16 & 0xF),
        Instruction::Rio { device } => 0x3080 | (device as u16 & 0xF),
        Instruction::Wio { device } => 0x3090 | (device as u16 & 0xF),
        Instruction::Scal { n } => 0x3100 | n as u16,
        Instruction::Sxit { n } => 0x3400 | n as u16,
        Instruction::Shift { op, count, indexed } => {
            op.base() | flag(indexed && op.accepts_index(), SHIFT_X_BIT) | (count as u16 & 0x3F)
        }
        Instruction::MemRef {
            op,
            disp,
            indexed,
            indirect,
        } => op.base() | flag(indexed, X_BIT) | flag(indirect, I_BIT) | (disp & DB_DISP_MAX),
        Instruction::Load {
            target,
            indexed,
            indirect,
        } => {
            let field = match target {
                LoadTarget::Db(disp) => LOAD_DB_BIT | (disp & DB_DISP_MAX),
                LoadTarget::Relative(disp) => encode_long(disp),
            };
            0x4000 | flag(indexed, X_BIT) | flag(indirect, I_BIT) | field
        }
        Instruction::Ldi { value } => 0x2200 | value as u16,
        Instruction::Ldxi { value } => 0x2300 | value as u16,
        Instruction::Ddiv => 0x2179,
        Instruction::Br {
            disp,
            indexed,
            indirect,
        } => 0xC000 | flag(indexed, X_BIT) | flag(indirect, I_BIT) | encode_long(disp),
        Instruction::Bcc {
            selector,
            disp,
            indirect,
        } => 0xC200 | flag(indirect, I_BIT) | ((selector as u16 & 0x7) << 6) | encode_short(disp),
        Instruction::CountBranch { op, disp, indirect } => {
            op.base() | flag(indirect, X_BIT) | encode_short(disp)
        }
        Instruction::FlagBranch { op, disp, indirect } => {
            op.base() | flag(indirect, X_BIT) | encode_short(disp)
        }
        Instruction::Bro { disp } => 0x1780 | encode_short(disp),
        Instruction::Stack { first, second } => ((first.code() as u16) << 6) | second.code() as u16,
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown instruction {0:06o}")]
    UnknownInstruction(u16),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_packed_pair() {
        assert_eq!(
            decode(0x0410).unwrap(),
            Instruction::Stack {
                first: StackOp::Add,
                second: StackOp::Add
            }
        );
        assert_eq!(
            decode(0x095B).unwrap(),
            Instruction::Stack {
                first: StackOp::Dup,
                second: StackOp::Inca
            }
        );
    }

    #[test]
    fn test_stack_table() {
        assert_eq!(StackOp::from_code(16), StackOp::Add);
        assert_eq!(StackOp::from_code(58), StackOp::Unk);
        assert_eq!(StackOp::from_code(63), StackOp::Adxb);
        assert_eq!(StackOp::Adxb.code(), 63);
        assert_eq!(StackOp::from_mnemonic("inca"), Some(StackOp::Inca));
        assert_eq!(StackOp::from_mnemonic("UNK"), None);
        assert_eq!(StackOp::Unk.mnemonic(), None);
        for code in 0..64u8 {
            assert_eq!(StackOp::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_decode_control() {
        assert_eq!(decode(0x30F0).unwrap(), Instruction::Halt { code: 0 });
        assert_eq!(decode(0x3091).unwrap(), Instruction::Wio { device: 1 });
        assert_eq!(decode(0x308F).unwrap(), Instruction::Rio { device: 15 });
        assert_eq!(decode(0x3102).unwrap(), Instruction::Scal { n: 2 });
        assert_eq!(decode(0x2179).unwrap(), Instruction::Ddiv);
        assert_eq!(decode(0x2203).unwrap(), Instruction::Ldi { value: 3 });
    }

    #[test]
    fn test_decode_branches() {
        assert_eq!(
            decode(0xC008).unwrap(),
            Instruction::Br {
                disp: Displacement::forward(8),
                indexed: false,
                indirect: false
            }
        );
        assert_eq!(
            decode(0xCD08).unwrap(),
            Instruction::Br {
                disp: Displacement::backward(8),
                indexed: true,
                indirect: true
            }
        );
        assert_eq!(
            decode(0xC3C2).unwrap(),
            Instruction::Bcc {
                selector: 7,
                disp: Displacement::forward(2),
                indirect: false
            }
        );
        assert_eq!(
            decode(0x1782).unwrap(),
            Instruction::Bro {
                disp: Displacement::forward(2)
            }
        );
    }

    #[test]
    fn test_priority_shift_index_before_overflow_branch() {
        assert_eq!(
            decode(0x1681).unwrap(),
            Instruction::Shift {
                op: ShiftOp::Dlsl,
                count: 1,
                indexed: true
            }
        );
        assert_eq!(
            decode(0x1600).unwrap(),
            Instruction::FlagBranch {
                op: FlagTest::Bov,
                disp: Displacement::forward(0),
                indirect: false
            }
        );
    }

    #[test]
    fn test_decode_load_modes() {
        assert_eq!(
            decode(0x421E).unwrap(),
            Instruction::Load {
                target: LoadTarget::Db(0o36),
                indexed: false,
                indirect: false
            }
        );
        assert_eq!(
            decode(0x4105).unwrap(),
            Instruction::Load {
                target: LoadTarget::Relative(Displacement::backward(5)),
                indexed: false,
                indirect: false
            }
        );
    }

    #[test]
    fn test_unknown_instruction() {
        assert_eq!(decode(0x6000), Err(DecodeError::UnknownInstruction(0x6000)));
        assert_eq!(decode(0xF000), Err(DecodeError::UnknownInstruction(0xF000)));
        assert_eq!(decode(0x1800), Err(DecodeError::UnknownInstruction(0x1800)));
    }

    #[test]
    fn test_displacement_apply() {
        assert_eq!(Displacement::forward(10).apply(99), 109);
        assert_eq!(Displacement::backward(10).apply(99), 89);
        assert_eq!(Displacement::backward(0).apply(99), 99);
        assert_ne!(Displacement::backward(0), Displacement::forward(0));
        assert_eq!(Displacement::backward(1).apply(0), 0xFFFF);
    }

    proptest! {
        #[test]
        fn prop_encode_inverts_decode(word: u16) {
            if let Ok(instr) = decode(word) {
                prop_assert_eq!(encode(&instr), word);
            }
        }
    }

    #[test]
    fn test_encode_inverts_decode_exhaustive() {
        for word in 0..=u16::MAX {
            if let Ok(instr) = decode(word) {
                assert_eq!(encode(&instr), word, "word {:06o}", word);
            }
        }
    }
}
