//! Octal program image files.
//!
//! A simple text format:
//! - One `AAAAAA: WWWWWW` address/word pair per line, both octal
//! - `;` starts a comment, on its own line or after a pair
//! - Blank lines are ignored
//!
//! The first address in the file is the program origin.

use crate::asm::assembler::Program;
use crate::cpu::memory::ADDR_MASK;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

/// Parse image text.
pub fn parse_image(text: &str) -> Result<Program, ImageError> {
    let mut program = Program::default();

    for (index, line) in text.lines().enumerate() {
        let line_num = index + 1;
        let body = line.split(';').next().unwrap_or("").trim();
        if body.is_empty() {
            continue;
        }

        let (addr, word) = body.split_once(':').ok_or_else(|| ImageError::ParseError {
            line: line_num,
            message: "expected ADDRESS: WORD".into(),
        })?;
        let addr = parse_octal(addr, line_num)?;
        if addr > ADDR_MASK {
            return Err(ImageError::ParseError {
                line: line_num,
                message: format!("address {:o} out of range", addr),
            });
        }
        let word = parse_octal(word, line_num)?;

        if program.is_empty() {
            program.origin = addr;
        }
        program.words.push((addr, word));
    }

    Ok(program)
}

fn parse_octal(text: &str, line: usize) -> Result<u16, ImageError> {
    let text = text.trim();
    u16::from_str_radix(text, 8).map_err(|_| ImageError::ParseError {
        line,
        message: format!("invalid octal value: {:?}", text),
    })
}

/// Render a program as image text.
pub fn format_image(program: &Program) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "; HP 3000 program image");
    let _ = writeln!(out, "; {} words, origin {:06o}", program.len(), program.origin);
    for &(addr, word) in &program.words {
        let _ = writeln!(out, "{:06o}: {:06o}", addr, word);
    }
    out
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Program, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_image(&text)
}

/// Save a program as an image file.
pub fn save_image<P: AsRef<Path>>(path: P, program: &Program) -> Result<(), ImageError> {
    std::fs::write(path.as_ref(), format_image(program))?;
    Ok(())
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },
}
