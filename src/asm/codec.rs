//! Single-instruction assembler and disassembler.
//!
//! Text produced by [`disassemble`] always assembles back to the word it
//! came from, so a listing can be edited and re-assembled line by line.

use crate::asm::operand::{parse_literal, parse_operand, Address, Operand, Value};
use crate::cpu::decode::{
    decode, encode, CountOp, Displacement, FlagTest, Instruction, LoadTarget, MemOp, ShiftOp,
    StackOp, BRANCH_CONDITIONS, DB_DISP_MAX, LONG_DISP_MAX, SHORT_DISP_MAX,
};
use thiserror::Error;

const DEVICE_MAX: u64 = 0xF;
const BYTE_MAX: u64 = 0xFF;
const SHIFT_MAX: u64 = 0x3F;
const STACK_CODE_MAX: u64 = 0x3F;

// ==================== Disassembly ====================

/// Disassemble one word. Words that decode to nothing become `DATA nnnnnn`.
pub fn disassemble(word: u16) -> String {
    match decode(word) {
        Ok(instr) => format_instruction(&instr),
        Err(_) => format!("DATA {:06o}", word),
    }
}

fn relative(disp: Displacement) -> String {
    let sign = if disp.back { '-' } else { '+' };
    format!(".{}{:o}", sign, disp.magnitude)
}

fn suffixes(indirect: bool, indexed: bool) -> &'static str {
    match (indirect, indexed) {
        (false, false) => "",
        (true, false) => ",I",
        (false, true) => ",X",
        (true, true) => ",I,X",
    }
}

fn stack_half(op: StackOp) -> String {
    match op.mnemonic() {
        Some(name) => name.to_owned(),
        None => format!("DATA {:03o}", op.code()),
    }
}

/// Format a decoded instruction in canonical assembler syntax.
pub fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        Instruction::Halt { code: 0 } => "HALT".to_owned(),
        Instruction::Halt { code } => format!("HALT {:o}", code),
        Instruction::Rio { device } => format!("RIO {:o}", device),
        Instruction::Wio { device } => format!("WIO {:o}", device),
        Instruction::Scal { n } => format!("SCAL {:o}", n),
        Instruction::Sxit { n } => format!("SXIT {:o}", n),
        Instruction::Shift { op, count, indexed } => {
            format!("{} {:o}{}", op.mnemonic(), count, suffixes(false, indexed))
        }
        Instruction::MemRef {
            op,
            disp,
            indexed,
            indirect,
        } => format!("{} DB+{:o}{}", op.mnemonic(), disp, suffixes(indirect, indexed)),
        Instruction::Load {
            target,
            indexed,
            indirect,
        } => {
            let address = match target {
                LoadTarget::Db(disp) => format!("DB+{:o}", disp),
                LoadTarget::Relative(disp) => relative(disp),
            };
            format!("LOAD {}{}", address, suffixes(indirect, indexed))
        }
        Instruction::Ldi { value } => format!("LDI {:o}", value),
        Instruction::Ldxi { value } => format!("LDXI {:o}", value),
        Instruction::Ddiv => "DDIV".to_owned(),
        Instruction::Br {
            disp,
            indexed,
            indirect,
        } => format!("BR {}{}", relative(disp), suffixes(indirect, indexed)),
        Instruction::Bcc {
            selector,
            disp,
            indirect,
        } => format!(
            "{} {}{}",
            BRANCH_CONDITIONS[selector as usize & 0x7],
            relative(disp),
            suffixes(indirect, false)
        ),
        Instruction::CountBranch { op, disp, indirect } => {
            format!("{} {}{}", op.mnemonic(), relative(disp), suffixes(indirect, false))
        }
        Instruction::FlagBranch { op, disp, indirect } => {
            format!("{} {}{}", op.mnemonic(), relative(disp), suffixes(indirect, false))
        }
        Instruction::Bro { disp } => format!("BRO {}", relative(disp)),
        Instruction::Stack { first, second } => {
            format!("{}, {}", stack_half(first), stack_half(second))
        }
    }
}

// ==================== Assembly ====================

/// Assemble a whole instruction line, or `None` if it is not valid.
///
/// Accepts a lone mnemonic, a mnemonic and operand, a packed stack pair
/// (`DUP, INCA`) or `DATA n`.
pub fn try_assemble(text: &str) -> Option<u16> {
    assemble_line(text).ok()
}

/// Assemble `mnemonic` with `operand` text, or `None` if invalid.
pub fn try_assemble_operand(mnemonic: &str, operand: &str) -> Option<u16> {
    assemble_instruction(mnemonic, operand).ok()
}

/// Assemble a whole instruction line, reporting why it failed.
pub fn assemble_line(text: &str) -> Result<u16, EncodeError> {
    let text = text.trim();
    if let Some(word) = assemble_pair(text) {
        return Ok(word);
    }
    let (mnemonic, operand) = split_mnemonic(text);
    assemble_instruction(mnemonic, operand)
}

/// Assemble `mnemonic` with `operand` text; empty text means no operand.
pub fn assemble_instruction(mnemonic: &str, operand: &str) -> Result<u16, EncodeError> {
    let operand = if operand.trim().is_empty() {
        None
    } else {
        Some(parse_operand(operand)?)
    };
    encode_operand(mnemonic, operand.as_ref())
}

/// Split a line into its mnemonic and the operand text after it.
pub fn split_mnemonic(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((mnemonic, rest)) => (mnemonic, rest.trim()),
        None => (text, ""),
    }
}

/// Assemble a packed `A, B` stack pair. Either half may be `DATA n` for a
/// raw 6-bit code.
pub fn assemble_pair(text: &str) -> Option<u16> {
    let (first, second) = text.split_once(',')?;
    let first = stack_code(first)?;
    let second = stack_code(second)?;
    Some(((first as u16) << 6) | second as u16)
}

fn stack_code(text: &str) -> Option<u8> {
    let text = text.trim();
    if let Some(op) = StackOp::from_mnemonic(text) {
        return Some(op.code());
    }
    match split_mnemonic(text) {
        (name, value) if name.eq_ignore_ascii_case("DATA") => parse_literal(value)
            .filter(|&v| v <= STACK_CODE_MAX)
            .map(|v| v as u8),
        _ => None,
    }
}

/// Encode `mnemonic` with an already parsed operand.
///
/// Symbols must have been resolved to numbers first.
pub fn encode_operand(mnemonic: &str, operand: Option<&Operand>) -> Result<u16, EncodeError> {
    let name = mnemonic.trim().to_ascii_uppercase();
    if name == "DATA" {
        return plain(&name, required(&name, operand)?, u16::MAX as u64);
    }
    build(&name, operand).map(|instr| encode(&instr))
}

fn build(name: &str, operand: Option<&Operand>) -> Result<Instruction, EncodeError> {
    if let Some(op) = StackOp::from_mnemonic(name) {
        none(name, operand)?;
        return Ok(Instruction::Stack {
            first: StackOp::Nop,
            second: op,
        });
    }

    let instr = match name {
        "HALT" => {
            let code = match operand {
                Some(o) => plain(name, o, DEVICE_MAX)?,
                None => 0,
            };
            Instruction::Halt { code: code as u8 }
        }
        "DDIV" => {
            none(name, operand)?;
            Instruction::Ddiv
        }
        "RIO" | "WIO" => {
            let device = plain(name, required(name, operand)?, DEVICE_MAX)? as u8;
            if name == "RIO" {
                Instruction::Rio { device }
            } else {
                Instruction::Wio { device }
            }
        }
        "SCAL" | "SXIT" => {
            let n = plain(name, required(name, operand)?, BYTE_MAX)? as u8;
            if name == "SCAL" {
                Instruction::Scal { n }
            } else {
                Instruction::Sxit { n }
            }
        }
        "LDI" | "LDXI" => {
            let value = plain(name, required(name, operand)?, BYTE_MAX)? as u8;
            if name == "LDI" {
                Instruction::Ldi { value }
            } else {
                Instruction::Ldxi { value }
            }
        }
        "BR" => {
            let o = required(name, operand)?;
            Instruction::Br {
                disp: displacement(o, LONG_DISP_MAX)?,
                indexed: o.indexed,
                indirect: o.indirect,
            }
        }
        "BRO" => {
            let o = required(name, operand)?;
            allow(name, o, false, false)?;
            Instruction::Bro {
                disp: displacement(o, SHORT_DISP_MAX)?,
            }
        }
        "LOAD" => {
            let o = required(name, operand)?;
            let target = match &o.address {
                Address::Relative { .. } => LoadTarget::Relative(displacement(o, LONG_DISP_MAX)?),
                Address::Db(v) | Address::Plain(v) => LoadTarget::Db(number(v, DB_DISP_MAX as u64)?),
            };
            Instruction::Load {
                target,
                indexed: o.indexed,
                indirect: o.indirect,
            }
        }
        _ => return build_family(name, operand),
    };
    Ok(instr)
}

/// Mnemonics that belong to a family of related opcodes.
fn build_family(name: &str, operand: Option<&Operand>) -> Result<Instruction, EncodeError> {
    if let Some(op) = ShiftOp::ALL.into_iter().find(|op| op.mnemonic() == name) {
        let o = required(name, operand)?;
        allow(name, o, false, op.accepts_index())?;
        let count = plain_value(o, SHIFT_MAX)?;
        return Ok(Instruction::Shift {
            op,
            count: count as u8,
            indexed: o.indexed,
        });
    }

    if let Some(op) = MemOp::ALL.into_iter().find(|op| op.mnemonic() == name) {
        let o = required(name, operand)?;
        let disp = match &o.address {
            Address::Db(v) | Address::Plain(v) => number(v, DB_DISP_MAX as u64)?,
            Address::Relative { .. } => return Err(EncodeError::InvalidOperand(name.to_owned())),
        };
        return Ok(Instruction::MemRef {
            op,
            disp,
            indexed: o.indexed,
            indirect: o.indirect,
        });
    }

    if let Some(op) = CountOp::ALL.into_iter().find(|op| op.mnemonic() == name) {
        let o = required(name, operand)?;
        allow(name, o, true, false)?;
        return Ok(Instruction::CountBranch {
            op,
            disp: displacement(o, SHORT_DISP_MAX)?,
            indirect: o.indirect,
        });
    }

    if let Some(op) = FlagTest::ALL.into_iter().find(|op| op.mnemonic() == name) {
        let o = required(name, operand)?;
        allow(name, o, true, false)?;
        return Ok(Instruction::FlagBranch {
            op,
            disp: displacement(o, SHORT_DISP_MAX)?,
            indirect: o.indirect,
        });
    }

    if let Some(selector) = BRANCH_CONDITIONS.iter().position(|&c| c == name) {
        let o = required(name, operand)?;
        allow(name, o, true, false)?;
        return Ok(Instruction::Bcc {
            selector: selector as u8,
            disp: displacement(o, SHORT_DISP_MAX)?,
            indirect: o.indirect,
        });
    }

    Err(EncodeError::UnknownMnemonic(name.to_owned()))
}

// ==================== Operand checks ====================

fn required<'a>(name: &str, operand: Option<&'a Operand>) -> Result<&'a Operand, EncodeError> {
    operand.ok_or_else(|| EncodeError::MissingOperand(name.to_owned()))
}

fn none(name: &str, operand: Option<&Operand>) -> Result<(), EncodeError> {
    match operand {
        Some(_) => Err(EncodeError::UnexpectedOperand(name.to_owned())),
        None => Ok(()),
    }
}

fn allow(name: &str, o: &Operand, indirect: bool, indexed: bool) -> Result<(), EncodeError> {
    if o.indirect && !indirect {
        return Err(EncodeError::BadSuffix {
            mnemonic: name.to_owned(),
            suffix: 'I',
        });
    }
    if o.indexed && !indexed {
        return Err(EncodeError::BadSuffix {
            mnemonic: name.to_owned(),
            suffix: 'X',
        });
    }
    Ok(())
}

fn number(value: &Value, max: u64) -> Result<u16, EncodeError> {
    match value {
        Value::Number(n) if *n <= max => Ok(*n as u16),
        Value::Number(n) => Err(EncodeError::OutOfRange { value: *n, max }),
        Value::Symbol(s) => Err(EncodeError::UnresolvedSymbol(s.clone())),
    }
}

/// A bare number with no suffixes.
fn plain(name: &str, o: &Operand, max: u64) -> Result<u16, EncodeError> {
    allow(name, o, false, false)?;
    plain_value(o, max)
}

fn plain_value(o: &Operand, max: u64) -> Result<u16, EncodeError> {
    match &o.address {
        Address::Plain(v) => number(v, max),
        _ => Err(EncodeError::InvalidOperand(format!("{:?}", o.address))),
    }
}

fn displacement(o: &Operand, max: u16) -> Result<Displacement, EncodeError> {
    match o.address {
        Address::Relative { back, magnitude } if magnitude <= max as u64 => Ok(Displacement {
            back,
            magnitude: magnitude as u16,
        }),
        Address::Relative { magnitude, .. } => Err(EncodeError::OutOfRange {
            value: magnitude,
            max: max as u64,
        }),
        _ => Err(EncodeError::InvalidOperand(format!("{:?}", o.address))),
    }
}

/// Errors from assembling a single instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("unknown mnemonic: {0}")]
    UnknownMnemonic(String),

    #[error("{0} requires an operand")]
    MissingOperand(String),

    #[error("{0} takes no operand")]
    UnexpectedOperand(String),

    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    #[error("{mnemonic} does not accept ,{suffix}")]
    BadSuffix { mnemonic: String, suffix: char },

    #[error("value {value:o} exceeds {max:o}")]
    OutOfRange { value: u64, max: u64 },

    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),
}
