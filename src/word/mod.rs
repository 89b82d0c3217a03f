//! Machine word primitives.
//!
//! This module provides the arithmetic building blocks the execution
//! engine composes into instructions:
//! - [`arith`] - 16/32-bit add, subtract and shift with carry/overflow
//! - [`real`] - the HP 3000 32-bit floating point format

pub mod arith;
pub mod real;

pub use arith::{join, split, Flags};

/// Sign bit of a 16-bit word.
pub const SIGN16: u16 = 0x8000;

/// Sign bit of a 32-bit doubleword.
pub const SIGN32: u32 = 0x8000_0000;
