//! HP 3000 CPU registers.
//!
//! The register file holds:
//! - P: program counter
//! - RA..RD: the top four cells of the operand stack (RA on top)
//! - SR: how many of RA..RD are occupied, plus the logical stack depth
//! - SM: spill pointer for stack cells below the register window
//! - X: index register
//! - DB, PB, PL: data base, procedure base and procedure limit
//! - STA: the status word

use crate::cpu::memory::ADDR_MASK;
use serde::{Deserialize, Serialize};

/// Initial spill pointer after reset.
pub const SPILL_BASE: u16 = 0x1000;

/// Number of stack cells cached in registers.
pub const WINDOW_SIZE: u8 = 4;

/// Two-bit condition code held in status bits 8..9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionCode {
    /// CCG
    Greater,
    /// CCL
    Less,
    /// CCE
    Equal,
    /// CCI, never produced by arithmetic
    Indeterminate,
}

impl ConditionCode {
    /// Classify a 16-bit result.
    pub fn of_word(value: u16) -> Self {
        if value == 0 {
            ConditionCode::Equal
        } else if value & 0x8000 != 0 {
            ConditionCode::Less
        } else {
            ConditionCode::Greater
        }
    }

    /// Classify a 32-bit result.
    pub fn of_double(value: u32) -> Self {
        if value == 0 {
            ConditionCode::Equal
        } else if value & 0x8000_0000 != 0 {
            ConditionCode::Less
        } else {
            ConditionCode::Greater
        }
    }

    /// Classify an ordering of left against right.
    pub fn of_ordering(ordering: std::cmp::Ordering) -> Self {
        match ordering {
            std::cmp::Ordering::Less => ConditionCode::Less,
            std::cmp::Ordering::Equal => ConditionCode::Equal,
            std::cmp::Ordering::Greater => ConditionCode::Greater,
        }
    }

    /// Status bits for this code.
    pub const fn bits(self) -> u16 {
        match self {
            ConditionCode::Greater => 0x0000,
            ConditionCode::Less => 0x0100,
            ConditionCode::Equal => 0x0200,
            ConditionCode::Indeterminate => 0x0300,
        }
    }

    /// Decode from status bits.
    pub const fn from_bits(status: u16) -> Self {
        match status & Status::CC_MASK {
            0x0000 => ConditionCode::Greater,
            0x0100 => ConditionCode::Less,
            0x0200 => ConditionCode::Equal,
            _ => ConditionCode::Indeterminate,
        }
    }

    /// Assembler name: CCG, CCL, CCE or CCI.
    pub const fn name(self) -> &'static str {
        match self {
            ConditionCode::Greater => "CCG",
            ConditionCode::Less => "CCL",
            ConditionCode::Equal => "CCE",
            ConditionCode::Indeterminate => "CCI",
        }
    }
}

/// The status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub u16);

impl Status {
    pub const MODE: u16 = 0x8000;
    pub const INTERRUPTS: u16 = 0x4000;
    pub const TRAPS: u16 = 0x2000;
    pub const RIGHT: u16 = 0x1000;
    pub const OVERFLOW: u16 = 0x0800;
    pub const CARRY: u16 = 0x0400;
    pub const CC_MASK: u16 = 0x0300;

    #[inline]
    fn set_bit(&mut self, mask: u16, on: bool) {
        if on {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    pub fn cc(self) -> ConditionCode {
        ConditionCode::from_bits(self.0)
    }

    pub fn set_cc(&mut self, cc: ConditionCode) {
        self.0 = (self.0 & !Self::CC_MASK) | cc.bits();
    }

    pub fn overflow(self) -> bool {
        self.0 & Self::OVERFLOW != 0
    }

    pub fn set_overflow(&mut self, on: bool) {
        self.set_bit(Self::OVERFLOW, on);
    }

    pub fn carry(self) -> bool {
        self.0 & Self::CARRY != 0
    }

    pub fn set_carry(&mut self, on: bool) {
        self.set_bit(Self::CARRY, on);
    }

    /// Set CC from a word result.
    pub fn set_cc_word(&mut self, value: u16) {
        self.set_cc(ConditionCode::of_word(value));
    }

    /// Set CC from a doubleword result.
    pub fn set_cc_double(&mut self, value: u32) {
        self.set_cc(ConditionCode::of_double(value));
    }
}

impl std::fmt::Display for Status {
    /// Upper case for set flags, lower case for clear: `m i t r O c CCL`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = [
            (Self::MODE, 'M'),
            (Self::INTERRUPTS, 'I'),
            (Self::TRAPS, 'T'),
            (Self::RIGHT, 'R'),
            (Self::OVERFLOW, 'O'),
            (Self::CARRY, 'C'),
        ];
        for (mask, letter) in flags {
            let shown = if self.0 & mask != 0 {
                letter
            } else {
                letter.to_ascii_lowercase()
            };
            write!(f, "{} ", shown)?;
        }
        write!(f, "{}", self.cc().name())
    }
}

/// The HP 3000 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// P: address of the next word to fetch
    pub pc: u16,

    /// Top of stack
    pub ra: u16,
    pub rb: u16,
    pub rc: u16,
    /// Deepest register cell
    pub rd: u16,

    /// Occupied register cells, 0..=4
    pub sr: u8,

    /// Logical stack depth, never less than `sr`
    pub depth: u32,

    /// Spill pointer; spilled cells live at `sm..`
    pub sm: u16,

    /// Index register
    pub x: u16,

    /// Data base
    pub db: u16,

    /// Procedure base
    pub pb: u16,

    /// Procedure limit
    pub pl: u16,

    /// Status word
    pub sta: Status,
}

impl Registers {
    /// Create a register file in its reset state with P at zero.
    pub fn new() -> Self {
        Self {
            pc: 0,
            ra: 0,
            rb: 0,
            rc: 0,
            rd: 0,
            sr: 0,
            depth: 0,
            sm: SPILL_BASE,
            x: 0,
            db: 0,
            pb: 0,
            pl: 0,
            sta: Status::default(),
        }
    }

    /// Reset every register and start fetching at `addr`.
    pub fn reset(&mut self, addr: u16) {
        *self = Self::new();
        self.pc = addr & ADDR_MASK;
    }

    /// Advance P past the word just fetched and return the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1) & ADDR_MASK;
        old
    }

    /// Set P to an absolute address.
    pub fn jump(&mut self, addr: u16) {
        self.pc = addr & ADDR_MASK;
    }

    /// Register cells RA..RD, top first.
    pub fn window(&self) -> [u16; 4] {
        [self.ra, self.rb, self.rc, self.rd]
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_masks_pc() {
        let mut regs = Registers::new();
        regs.ra = 5;
        regs.x = 9;
        regs.sm = 0x200;
        regs.reset(0x8100);
        assert_eq!(regs.pc, 0x0100);
        assert_eq!(regs.ra, 0);
        assert_eq!(regs.x, 0);
        assert_eq!(regs.sm, SPILL_BASE);
    }

    #[test]
    fn test_advance_pc_wraps() {
        let mut regs = Registers::new();
        regs.pc = 0x7FFF;
        assert_eq!(regs.advance_pc(), 0x7FFF);
        assert_eq!(regs.pc, 0);
    }

    #[test]
    fn test_condition_code_classify() {
        assert_eq!(ConditionCode::of_word(0), ConditionCode::Equal);
        assert_eq!(ConditionCode::of_word(0x8000), ConditionCode::Less);
        assert_eq!(ConditionCode::of_word(1), ConditionCode::Greater);
        assert_eq!(ConditionCode::of_double(0x8000_0000), ConditionCode::Less);
        assert_eq!(ConditionCode::of_double(0x0001_0000), ConditionCode::Greater);
    }

    #[test]
    fn test_status_bits() {
        let mut sta = Status::default();
        sta.set_overflow(true);
        sta.set_cc(ConditionCode::Less);
        assert_eq!(sta.0, 0x0900);
        sta.set_carry(true);
        sta.set_overflow(false);
        sta.set_cc(ConditionCode::Equal);
        assert_eq!(sta.0, 0x0600);
        assert!(sta.carry());
        assert!(!sta.overflow());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status(0x0900).to_string(), "m i t r O c CCL");
        assert_eq!(Status(0x8600).to_string(), "M i t r o C CCE");
        assert_eq!(Status(0x0300).to_string(), "m i t r o c CCI");
    }
}
