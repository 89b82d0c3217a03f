//! Assembler and disassembler for HP 3000 programs.
//!
//! This module provides:
//! - A single-instruction codec (text ⇄ word) that round-trips every word
//! - A two-pass source-file assembler with labels and data directives
//! - Memory and program listings
//! - Octal program image files

pub mod assembler;
pub mod codec;
pub mod disasm;
pub mod image;
pub mod operand;

pub use assembler::{assemble, AssemblerError, Program};
pub use codec::{
    assemble_instruction, disassemble, try_assemble, try_assemble_operand, EncodeError,
};
pub use image::{load_image, parse_image, save_image, ImageError};
