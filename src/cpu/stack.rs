//! Operand stack with a four-register top-of-stack cache.
//!
//! RA..RD hold the top `sr` cells. When a push finds the window full, RD
//! is spilled to `memory[--sm]`; when a pop empties a slot and spilled
//! cells remain, RD is refilled from `memory[sm++]`. `depth` is the true
//! logical depth and only matches `sr` while nothing is spilled.
//!
//! Every operation refuses to touch a machine that has stopped. Running
//! out of cells is a machine fault: the CPU halts with "stack underflow".

use crate::cpu::execute::{Cpu, CpuError};
use crate::cpu::memory::ADDR_MASK;
use crate::cpu::registers::WINDOW_SIZE;
use crate::word::{join, split};

impl Cpu {
    fn ensure_running(&self) -> Result<(), CpuError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(CpuError::NotRunning(self.state))
        }
    }

    fn underflow<T>(&mut self) -> Result<T, CpuError> {
        self.fault(CpuError::StackUnderflow);
        Err(CpuError::StackUnderflow)
    }

    /// Cells that can be popped before underflow.
    pub fn available(&self) -> u32 {
        if self.regs.sr == WINDOW_SIZE {
            self.regs.depth.max(WINDOW_SIZE as u32)
        } else {
            self.regs.sr as u32
        }
    }

    /// Fault unless `n` cells can be popped, so multi-operand instructions
    /// never leave the stack half consumed.
    pub(crate) fn require(&mut self, n: u32) -> Result<(), CpuError> {
        self.ensure_running()?;
        if self.available() < n {
            return self.underflow();
        }
        Ok(())
    }

    fn require_window(&mut self, n: u8) -> Result<(), CpuError> {
        self.ensure_running()?;
        if self.regs.sr < n {
            return self.underflow();
        }
        Ok(())
    }

    /// Close the hole left in RD after RA or RB was removed.
    fn refill(&mut self) {
        let regs = &mut self.regs;
        if regs.sr == WINDOW_SIZE && regs.depth > WINDOW_SIZE as u32 {
            regs.rd = self.mem.read(regs.sm);
            regs.sm = regs.sm.wrapping_add(1) & ADDR_MASK;
        } else {
            regs.rd = 0;
            regs.sr -= 1;
        }
        regs.depth = regs.depth.saturating_sub(1);
    }

    pub fn push(&mut self, value: u16) -> Result<(), CpuError> {
        self.ensure_running()?;
        let regs = &mut self.regs;
        if regs.sr == WINDOW_SIZE {
            regs.sm = regs.sm.wrapping_sub(1) & ADDR_MASK;
            self.mem.write(regs.sm, regs.rd);
        }
        regs.rd = regs.rc;
        regs.rc = regs.rb;
        regs.rb = regs.ra;
        regs.ra = value;
        regs.sr = (regs.sr + 1).min(WINDOW_SIZE);
        regs.depth += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, CpuError> {
        self.require_window(1)?;
        let regs = &mut self.regs;
        let value = regs.ra;
        regs.ra = regs.rb;
        regs.rb = regs.rc;
        regs.rc = regs.rd;
        self.refill();
        Ok(value)
    }

    pub fn peek(&mut self) -> Result<u16, CpuError> {
        self.require_window(1)?;
        Ok(self.regs.ra)
    }

    pub fn peek_second(&mut self) -> Result<u16, CpuError> {
        self.require_window(2)?;
        Ok(self.regs.rb)
    }

    /// Remove RB, keeping RA on top.
    pub fn drop_second(&mut self) -> Result<(), CpuError> {
        self.require_window(2)?;
        let regs = &mut self.regs;
        regs.rb = regs.rc;
        regs.rc = regs.rd;
        self.refill();
        Ok(())
    }

    pub fn replace_top(&mut self, value: u16) -> Result<(), CpuError> {
        self.require_window(1)?;
        self.regs.ra = value;
        Ok(())
    }

    pub fn replace_second(&mut self, value: u16) -> Result<(), CpuError> {
        self.require_window(2)?;
        self.regs.rb = value;
        Ok(())
    }

    // ==================== Doublewords ====================

    /// Push a doubleword, high word first so it ends up deeper.
    pub fn push_double(&mut self, value: u32) -> Result<(), CpuError> {
        let (high, low) = split(value);
        self.push(high)?;
        self.push(low)
    }

    pub fn pop_double(&mut self) -> Result<u32, CpuError> {
        self.require(2)?;
        let low = self.pop()?;
        let high = self.pop()?;
        Ok(join(high, low))
    }

    /// RB:RA as a doubleword.
    pub fn peek_double(&mut self) -> Result<u32, CpuError> {
        self.require_window(2)?;
        Ok(join(self.regs.rb, self.regs.ra))
    }

    pub fn replace_double(&mut self, value: u32) -> Result<(), CpuError> {
        self.require_window(2)?;
        let (high, low) = split(value);
        self.regs.rb = high;
        self.regs.ra = low;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::cpu::execute::{Cpu, CpuError, CpuState};
    use crate::cpu::registers::SPILL_BASE;

    #[test]
    fn test_push_fills_window() {
        let mut cpu = Cpu::new();
        cpu.push(1).unwrap();
        cpu.push(2).unwrap();
        assert_eq!(cpu.regs.sr, 2);
        assert_eq!(cpu.regs.ra, 2);
        assert_eq!(cpu.regs.rb, 1);
    }

    #[test]
    fn test_spill_and_refill() {
        let mut cpu = Cpu::new();
        for v in 1..=5 {
            cpu.push(v).unwrap();
        }
        assert_eq!(cpu.regs.sr, 4);
        assert_eq!(cpu.regs.depth, 5);
        assert_eq!(cpu.regs.sm, SPILL_BASE - 1);
        assert_eq!(cpu.mem.read(SPILL_BASE - 1), 1);

        assert_eq!(cpu.pop().unwrap(), 5);
        assert_eq!(cpu.regs.sr, 4);
        assert_eq!(cpu.regs.depth, 4);
        assert_eq!(cpu.regs.ra, 4);
        assert_eq!(cpu.regs.rd, 1);
        assert_eq!(cpu.regs.sm, SPILL_BASE);

        assert_eq!(cpu.pop().unwrap(), 4);
        assert_eq!(cpu.regs.sr, 3);
        assert_eq!(cpu.regs.depth, 3);
    }

    #[test]
    fn test_deep_stack_round_trip() {
        let mut cpu = Cpu::new();
        for v in 0..20 {
            cpu.push(v).unwrap();
        }
        for v in (0..20).rev() {
            assert_eq!(cpu.pop().unwrap(), v);
        }
        assert_eq!(cpu.regs.depth, 0);
        assert_eq!(cpu.regs.sr, 0);
        assert_eq!(cpu.regs.sm, SPILL_BASE);
    }

    #[test]
    fn test_pop_empty_halts() {
        let mut cpu = Cpu::new();
        assert_eq!(cpu.pop(), Err(CpuError::StackUnderflow));
        assert_eq!(cpu.state, CpuState::Error);
        assert_eq!(cpu.halt_reason(), Some("stack underflow"));
    }

    #[test]
    fn test_halted_stack_is_inert() {
        let mut cpu = Cpu::new();
        cpu.push(7).unwrap();
        cpu.halt("stopped");
        assert!(matches!(cpu.push(1), Err(CpuError::NotRunning(_))));
        assert!(matches!(cpu.pop(), Err(CpuError::NotRunning(_))));
        assert_eq!(cpu.regs.sr, 1);
        assert_eq!(cpu.regs.ra, 7);
        assert_eq!(cpu.halt_reason(), Some("stopped"));
    }

    #[test]
    fn test_drop_second_refills() {
        let mut cpu = Cpu::new();
        for v in 1..=6 {
            cpu.push(v).unwrap();
        }
        cpu.drop_second().unwrap();
        assert_eq!(cpu.regs.window(), [6, 4, 3, 2]);
        assert_eq!(cpu.regs.depth, 5);
    }

    #[test]
    fn test_peek_second_needs_two() {
        let mut cpu = Cpu::new();
        cpu.push(1).unwrap();
        assert_eq!(cpu.peek_second(), Err(CpuError::StackUnderflow));
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_double_helpers() {
        let mut cpu = Cpu::new();
        cpu.push_double(0x1234_5678).unwrap();
        assert_eq!(cpu.regs.rb, 0x1234);
        assert_eq!(cpu.regs.ra, 0x5678);
        assert_eq!(cpu.peek_double().unwrap(), 0x1234_5678);
        cpu.replace_double(0xDEAD_BEEF).unwrap();
        assert_eq!(cpu.pop_double().unwrap(), 0xDEAD_BEEF);
        assert_eq!(cpu.regs.sr, 0);
    }

    #[test]
    fn test_require_counts_spilled_cells() {
        let mut cpu = Cpu::new();
        for v in 0..6 {
            cpu.push(v).unwrap();
        }
        assert_eq!(cpu.available(), 6);
        assert!(cpu.require(6).is_ok());
        assert_eq!(cpu.require(7), Err(CpuError::StackUnderflow));
    }
}
