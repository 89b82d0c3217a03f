//! Source-file assembler for HP 3000 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//!         ORG 100         ; Set location counter (octal)
//! START:  LDI 5           ; Label and instruction
//!         DUP, INCA       ; Packed stack pair
//!         BNE START       ; Labels become .-n for relative branches
//!         STOR COUNT      ; ... and DB+n for memory references
//!         HALT
//! COUNT:  DW 0, #10, $FF  ; One word each
//!         DD #3000000000  ; Two words, high first
//!         DQ 1            ; Four words
//!         TXT "HI"        ; Two bytes per word
//! ```
//!
//! Assembly runs in two passes: the first assigns addresses and collects
//! labels, the second encodes every statement.

use crate::asm::codec::{self, EncodeError};
use crate::asm::operand::{is_symbol, parse_operand, parse_signed, Address, Value};
use crate::cpu::memory::{Memory, ADDR_MASK};
use crate::cpu::decode::BRANCH_CONDITIONS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Assembled words with their load addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Where execution starts.
    pub origin: u16,
    /// `(address, word)` pairs in emission order.
    pub words: Vec<(u16, u16)>,
}

impl Program {
    pub fn new(origin: u16) -> Self {
        Self {
            origin,
            words: Vec::new(),
        }
    }

    /// Store every word into memory.
    pub fn load_into(&self, mem: &mut Memory) {
        for &(addr, word) in &self.words {
            mem.write(addr, word);
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Assemble source text into a program.
pub fn assemble(source: &str) -> Result<Program, AssemblerError> {
    let mut asm = Assembler::new();
    for (index, line) in source.lines().enumerate() {
        asm.scan_line(line, index + 1)?;
    }
    asm.emit_all()
}

/// Mnemonics whose label operands are measured from the instruction.
fn is_relative(mnemonic: &str) -> bool {
    matches!(
        mnemonic,
        "BR" | "BRO" | "IABZ" | "IXBZ" | "DXBZ" | "BCY" | "BNCY" | "BOV" | "BNOV" | "LOAD"
    ) || BRANCH_CONDITIONS.contains(&mnemonic)
}

/// One statement placed at an address by the first pass.
struct Statement {
    line: usize,
    addr: u16,
    mnemonic: String,
    operand: String,
}

struct Assembler {
    /// Location counter.
    addr: u16,
    origin: Option<u16>,
    /// Label -> address, keys uppercased.
    symbols: HashMap<String, u16>,
    statements: Vec<Statement>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            addr: 0,
            origin: None,
            symbols: HashMap::new(),
            statements: Vec::new(),
        }
    }

    // ==================== Pass 1 ====================

    fn scan_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let mut text = strip_comment(line).trim();

        // Check for label definition
        if let Some((head, rest)) = text.split_once(':') {
            let label = head.trim();
            if is_symbol(label) {
                self.define(label, line_num)?;
                text = rest.trim();
            }
        }

        if text.is_empty() {
            return Ok(());
        }

        let (mnemonic, operand) = codec::split_mnemonic(text);
        let mnemonic = mnemonic.to_ascii_uppercase();

        if mnemonic == "ORG" {
            let value = self.value(operand, line_num)?;
            self.addr = narrow(value, 0, ADDR_MASK as i128, line_num)? as u16;
            self.origin.get_or_insert(self.addr);
            return Ok(());
        }

        let size = match mnemonic.as_str() {
            "DW" => split_values(operand).count(),
            "DD" => 2,
            "DQ" => 4,
            "TXT" => text_bytes(operand, line_num)?.len().div_ceil(2),
            _ => 1,
        };

        self.origin.get_or_insert(self.addr);
        self.statements.push(Statement {
            line: line_num,
            addr: self.addr,
            mnemonic,
            operand: operand.to_owned(),
        });
        self.addr = self.addr.wrapping_add(size as u16) & ADDR_MASK;
        Ok(())
    }

    fn define(&mut self, label: &str, line_num: usize) -> Result<(), AssemblerError> {
        let key = label.to_ascii_uppercase();
        if self.symbols.contains_key(&key) {
            return Err(AssemblerError::DuplicateLabel {
                line: line_num,
                label: label.to_owned(),
            });
        }
        self.symbols.insert(key, self.addr);
        Ok(())
    }

    /// ORG operands must be literals or labels already defined.
    fn value(&self, text: &str, line_num: usize) -> Result<i128, AssemblerError> {
        resolve_value(text, self.addr, &self.symbols, line_num)
    }

    // ==================== Pass 2 ====================

    fn emit_all(self) -> Result<Program, AssemblerError> {
        let mut program = Program::new(self.origin.unwrap_or(0));
        for stmt in &self.statements {
            let words = self.encode(stmt)?;
            for (offset, word) in words.into_iter().enumerate() {
                let addr = stmt.addr.wrapping_add(offset as u16) & ADDR_MASK;
                program.words.push((addr, word));
            }
        }
        Ok(program)
    }

    fn encode(&self, stmt: &Statement) -> Result<Vec<u16>, AssemblerError> {
        let line = stmt.line;
        match stmt.mnemonic.as_str() {
            "DW" => split_values(&stmt.operand)
                .enumerate()
                .map(|(i, v)| {
                    let here = stmt.addr.wrapping_add(i as u16) & ADDR_MASK;
                    let value = resolve_value(v, here, &self.symbols, line)?;
                    Ok(narrow(value, -0x8000, 0xFFFF, line)? as u16)
                })
                .collect(),
            "DD" => {
                let value = resolve_value(&stmt.operand, stmt.addr, &self.symbols, line)?;
                let bits = narrow(value, i32::MIN as i128, u32::MAX as i128, line)? as u32;
                Ok(vec![(bits >> 16) as u16, bits as u16])
            }
            "DQ" => {
                let value = resolve_value(&stmt.operand, stmt.addr, &self.symbols, line)?;
                let bits = narrow(value, i64::MIN as i128, u64::MAX as i128, line)? as u64;
                Ok((0..4).rev().map(|i| (bits >> (16 * i)) as u16).collect())
            }
            "TXT" => {
                let bytes = text_bytes(&stmt.operand, line)?;
                Ok(bytes
                    .chunks(2)
                    .map(|pair| {
                        let high = pair[0] as u16;
                        let low = pair.get(1).copied().unwrap_or(0) as u16;
                        (high << 8) | low
                    })
                    .collect())
            }
            _ => self.encode_instruction(stmt).map(|word| vec![word]),
        }
    }

    fn encode_instruction(&self, stmt: &Statement) -> Result<u16, AssemblerError> {
        let line = stmt.line;
        let text = format!("{} {}", stmt.mnemonic, stmt.operand);
        if let Some(word) = codec::assemble_pair(&text) {
            return Ok(word);
        }

        if stmt.operand.is_empty() {
            return codec::encode_operand(&stmt.mnemonic, None).map_err(|e| lift(e, line));
        }

        let mut operand = parse_operand(&stmt.operand).map_err(|e| lift(e, line))?;
        operand.address = match operand.address {
            Address::Plain(Value::Symbol(name)) => {
                let target = self.lookup(&name, line)?;
                if is_relative(&stmt.mnemonic) {
                    let offset = target as i32 - stmt.addr as i32;
                    Address::Relative {
                        back: offset < 0,
                        magnitude: offset.unsigned_abs() as u64,
                    }
                } else {
                    Address::Plain(Value::Number(target as u64))
                }
            }
            Address::Db(Value::Symbol(name)) => {
                Address::Db(Value::Number(self.lookup(&name, line)? as u64))
            }
            other => other,
        };
        codec::encode_operand(&stmt.mnemonic, Some(&operand)).map_err(|e| lift(e, line))
    }

    fn lookup(&self, name: &str, line: usize) -> Result<u16, AssemblerError> {
        self.symbols
            .get(&name.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| AssemblerError::UndefinedLabel {
                line,
                label: name.to_owned(),
            })
    }
}

/// Remove a `;` comment that is not inside a string.
fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => return &line[..i],
            _ => {}
        }
    }
    line
}

fn split_values(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|v| !v.is_empty())
}

/// Literal, label or `.` for the current address.
fn resolve_value(
    text: &str,
    here: u16,
    symbols: &HashMap<String, u16>,
    line: usize,
) -> Result<i128, AssemblerError> {
    let text = text.trim();
    if text == "." {
        return Ok(here as i128);
    }
    if let Some(value) = parse_signed(text) {
        return Ok(value);
    }
    if is_symbol(text) {
        return symbols
            .get(&text.to_ascii_uppercase())
            .map(|&addr| addr as i128)
            .ok_or_else(|| AssemblerError::UndefinedLabel {
                line,
                label: text.to_owned(),
            });
    }
    Err(AssemblerError::SyntaxError {
        line,
        message: format!("invalid value: {}", text),
    })
}

fn narrow(value: i128, min: i128, max: i128, line: usize) -> Result<i128, AssemblerError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(AssemblerError::ValueOutOfRange {
            line,
            value: value.to_string(),
        })
    }
}

fn text_bytes(operand: &str, line: usize) -> Result<Vec<u8>, AssemblerError> {
    operand
        .trim()
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(|s| s.bytes().collect())
        .ok_or_else(|| AssemblerError::SyntaxError {
            line,
            message: "TXT requires a quoted string".into(),
        })
}

/// Attach a line number to a codec error.
fn lift(err: EncodeError, line: usize) -> AssemblerError {
    match err {
        EncodeError::UnknownMnemonic(mnemonic) => AssemblerError::UnknownMnemonic { line, mnemonic },
        EncodeError::OutOfRange { value, .. } => AssemblerError::ValueOutOfRange {
            line,
            value: format!("{:o}", value),
        },
        EncodeError::UnresolvedSymbol(label) => AssemblerError::UndefinedLabel { line, label },
        other => AssemblerError::InvalidOperand {
            line,
            message: other.to_string(),
        },
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("invalid operand on line {line}: {message}")]
    InvalidOperand { line: usize, message: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(program: &Program) -> Vec<u16> {
        program.words.iter().map(|&(_, w)| w).collect()
    }

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            LDI 12
            LDI 22
            ADD
            HALT
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(program.origin, 0);
        assert_eq!(words(&program), vec![0x220A, 0x2212, 0x0010, 0x30F0]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
                ORG 100
        START:  LDI 3
        LOOP:   DECA
                BNE LOOP
                BR START
                HALT
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(program.origin, 0o100);
        assert_eq!(program.words[0], (0o100, 0x2203));
        // BNE .-1
        assert_eq!(program.words[2], (0o102, 0xC340 | 0x20 | 1));
        // BR .-3
        assert_eq!(program.words[3], (0o103, 0xC103));
    }

    #[test]
    fn test_forward_reference_and_db_labels() {
        let source = r#"
                LOAD COUNT
                STOR DB+COUNT,X
                BR DONE
        DONE:   HALT
        COUNT:  DW 7
        "#;

        let program = assemble(source).unwrap();
        // LOAD .+4
        assert_eq!(program.words[0], (0, 0x4004));
        assert_eq!(program.words[1], (1, 0x5A04));
        assert_eq!(program.words[2], (2, 0xC001));
        assert_eq!(program.words[4], (4, 7));
    }

    #[test]
    fn test_memory_reference_label_is_db_offset() {
        let program = assemble("INCM VAR\nVAR: DW 0").unwrap();
        assert_eq!(words(&program), vec![0xA201, 0]);
    }

    #[test]
    fn test_assemble_data() {
        let source = r#"
            DW 52, -#17, 0, .
            DD #3000000000
            DQ #1234567890123456789
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(
            words(&program),
            vec![
                0o52, 0xFFEF, 0, 3,
                0xB2D0, 0x5E00,
                0x1122, 0x10F4, 0x7DE9, 0x8115,
            ]
        );
    }

    #[test]
    fn test_txt_packs_bytes() {
        let program = assemble("TXT \"ABC; x\"").unwrap();
        assert_eq!(words(&program), vec![0x4142, 0x433B, 0x2078]);
        let program = assemble("TXT \"HI!\"\nHALT").unwrap();
        assert_eq!(program.words, vec![(0, 0x4849), (1, 0x2100), (2, 0x30F0)]);
    }

    #[test]
    fn test_pairs_and_data_words() {
        let program = assemble("DUP, INCA\nNOP, DATA 072\nDATA 050000").unwrap();
        assert_eq!(words(&program), vec![0x095B, 0x003A, 0o050000]);
    }

    #[test]
    fn test_labels_case_insensitive() {
        let program = assemble("Top: NOP\n BR top").unwrap();
        assert_eq!(program.words[1].1, 0xC101);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        assert_eq!(
            assemble("NOP\nFROB 1"),
            Err(AssemblerError::UnknownMnemonic {
                line: 2,
                mnemonic: "FROB".into()
            })
        );
        assert_eq!(
            assemble("A: NOP\na: NOP"),
            Err(AssemblerError::DuplicateLabel {
                line: 2,
                label: "a".into()
            })
        );
        assert_eq!(
            assemble("\n\nBR NOWHERE"),
            Err(AssemblerError::UndefinedLabel {
                line: 3,
                label: "NOWHERE".into()
            })
        );
        assert!(matches!(
            assemble("LDI 777"),
            Err(AssemblerError::ValueOutOfRange { line: 1, .. })
        ));
        assert!(matches!(
            assemble("DW 200000"),
            Err(AssemblerError::ValueOutOfRange { line: 1, .. })
        ));
        assert!(matches!(
            assemble("BRO .+2,X"),
            Err(AssemblerError::InvalidOperand { line: 1, .. })
        ));
        assert!(matches!(
            assemble("TXT HI"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
    }

    #[test]
    fn test_branch_too_far() {
        let mut source = String::from("BRO END\n");
        for _ in 0..40 {
            source.push_str("NOP\n");
        }
        source.push_str("END: HALT\n");
        assert!(matches!(
            assemble(&source),
            Err(AssemblerError::ValueOutOfRange { line: 1, .. })
        ));
    }

    #[test]
    fn test_load_into_memory() {
        let program = assemble("ORG 200\nLDI 1\nHALT").unwrap();
        let mut mem = Memory::new();
        program.load_into(&mut mem);
        assert_eq!(mem.read(0o200), 0x2201);
        assert_eq!(mem.read(0o201), 0x30F0);
        assert_eq!(program.len(), 2);
    }
}
