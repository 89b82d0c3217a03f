//! CPU emulation for the HP 3000.
//!
//! This module implements the instruction-level machine:
//! - 32K words of 16-bit memory
//! - a four-register top-of-stack window spilling to memory
//! - two instruction formats sharing the 16-bit word space
//! - condition code, carry and overflow in the status register

pub mod memory;
pub mod registers;
pub mod stack;
pub mod decode;
pub mod execute;

pub use memory::Memory;
pub use registers::{ConditionCode, Registers, Status};
pub use decode::{decode, encode, DecodeError, Instruction, StackOp};
pub use execute::{Cpu, CpuError, CpuState};
