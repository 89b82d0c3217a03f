//! # HP 3000 Emulator
//!
//! An instruction-level emulator of the 16-bit HP 3000 stack minicomputer.
//!
//! The machine keeps the top of its operand stack in four registers that
//! spill to memory, packs two stack operations into most instruction
//! words, and reports results through a condition code plus carry and
//! overflow bits. The crate pairs the CPU with an assembler whose output
//! matches exactly what the decoder accepts.

pub mod word;
pub mod cpu;
pub mod io;
pub mod asm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuError, CpuState, Instruction, Memory, Registers};
pub use io::{DeviceBus, IoBus, NullBus};
pub use asm::{assemble, disassemble, load_image, save_image, AssemblerError, Program};
