//! CPU execution engine for the HP 3000.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::asm::codec;
use crate::cpu::decode::{
    self, CountOp, Displacement, FlagTest, Instruction, LoadTarget, MemOp, StackOp,
};
use crate::cpu::memory::{Memory, ADDR_MASK};
use crate::cpu::registers::{ConditionCode, Registers};
use crate::io::{IoBus, STATUS_READY};
use crate::word::arith::{self, Flags};
use crate::word::{join, real, split};
use log::{debug, log_enabled, trace, warn, Level};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU executed a HALT instruction or was stopped by its owner.
    Halted,
    /// CPU hit a machine fault.
    Error,
}

/// The HP 3000 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Why the CPU stopped.
    halt_reason: Option<String>,
    /// Fetch cycles performed since reset.
    pub cycles: u64,
    /// Last decoded instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with zeroed memory, ready to run from address 0.
    pub fn new() -> Self {
        Self::with_memory(Memory::new())
    }

    /// Create a CPU around existing memory.
    pub fn with_memory(mem: Memory) -> Self {
        Self {
            regs: Registers::new(),
            mem,
            state: CpuState::Running,
            halt_reason: None,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset every register and start at `addr`. Memory is left alone.
    pub fn reset(&mut self, addr: u16) {
        self.regs.reset(addr);
        self.state = CpuState::Running;
        self.halt_reason = None;
        self.cycles = 0;
        self.last_instr = None;
        debug!("reset, P={:05o}", self.regs.pc);
    }

    /// Stop the machine with a reason. Has no effect once stopped.
    pub fn halt(&mut self, reason: impl Into<String>) {
        if self.is_running() {
            self.state = CpuState::Halted;
            self.halt_reason = Some(reason.into());
            debug!("halted at P={:05o}: {:?}", self.regs.pc, self.halt_reason);
        }
    }

    /// Stop the machine on a fault. Has no effect once stopped.
    pub(crate) fn fault(&mut self, err: CpuError) {
        if self.is_running() {
            warn!("fault at P={:05o}: {}", self.regs.pc, err);
            self.state = CpuState::Error;
            self.halt_reason = Some(err.to_string());
        }
    }

    /// Execute one fetch cycle.
    ///
    /// Returns whether the machine may continue.
    pub fn step(&mut self, bus: &mut dyn IoBus) -> bool {
        if !self.is_running() {
            return false;
        }

        let addr = self.regs.advance_pc();
        let word = self.mem.read(addr);
        if log_enabled!(Level::Trace) {
            trace!("{:05o}: {:06o}  {}", addr, word, codec::disassemble(word));
        }
        self.cycles += 1;

        let result = match decode::decode(word) {
            Ok(instr) => {
                self.last_instr = Some(instr);
                self.execute(instr, bus)
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            self.fault(e);
        }

        self.is_running()
    }

    /// Step until the machine stops or `max_steps` cycles have run.
    ///
    /// Returns the number of steps that completed with the machine still
    /// running.
    pub fn run(&mut self, bus: &mut dyn IoBus, max_steps: u64) -> u64 {
        let mut steps = 0;
        while steps < max_steps && self.step(bus) {
            steps += 1;
        }
        steps
    }

    /// Execute a decoded instruction whose word was fetched from P - 1.
    pub fn execute(&mut self, instr: Instruction, bus: &mut dyn IoBus) -> Result<(), CpuError> {
        let here = self.regs.pc.wrapping_sub(1) & ADDR_MASK;

        match instr {
            // ==================== Control / I/O ====================

            Instruction::Halt { code } => {
                self.halt(format!("HALT {}", code));
            }

            Instruction::Rio { device } => match bus.read_status(device) {
                None => self.regs.sta.set_cc(ConditionCode::Less),
                Some(status) if status & STATUS_READY != 0 => {
                    let byte = bus.read_byte(device);
                    self.push(byte as u16)?;
                    self.regs.sta.set_cc(ConditionCode::Equal);
                }
                Some(status) => {
                    self.push(status)?;
                    self.regs.sta.set_cc(ConditionCode::Greater);
                }
            },

            Instruction::Wio { device } => match bus.read_status(device) {
                None => self.regs.sta.set_cc(ConditionCode::Less),
                Some(status) if status & STATUS_READY != 0 => {
                    let value = self.peek()?;
                    match bus.write_word(device, value) {
                        Ok(()) => {
                            self.pop()?;
                            self.regs.sta.set_cc(ConditionCode::Equal);
                        }
                        Err(e) => {
                            warn!("WIO {} at {:05o} failed: {}", device, here, e);
                            self.regs.sta.set_cc(ConditionCode::Less);
                        }
                    }
                }
                Some(status) => {
                    self.push(status)?;
                    self.regs.sta.set_cc(ConditionCode::Greater);
                }
            },

            Instruction::Scal { n } => {
                let label = if n == 0 {
                    self.pop()?
                } else {
                    self.mem.read(self.regs.pl.wrapping_sub(n as u16))
                };
                let ret = self.regs.pc;
                self.push(ret)?;
                self.regs.jump(self.regs.pb.wrapping_add(label & ADDR_MASK));
            }

            Instruction::Sxit { n } => {
                self.require(n as u32 + 1)?;
                let ret = self.pop()?;
                for _ in 0..n {
                    self.pop()?;
                }
                self.regs.jump(ret);
            }

            // ==================== Shifts ====================

            Instruction::Shift { op, count, indexed } => {
                let mut n = count as u32;
                if indexed {
                    n = (n + self.regs.x as u32) & 0x3F;
                }
                let carry = if op.is_double() {
                    let (value, carry) = arith::shift(self.peek_double()?, 32, n, op.kind());
                    self.replace_double(value)?;
                    self.regs.sta.set_cc_double(value);
                    carry
                } else {
                    let (value, carry) = arith::shift(self.peek()? as u32, 16, n, op.kind());
                    self.replace_top(value as u16)?;
                    self.regs.sta.set_cc_word(value as u16);
                    carry
                };
                self.regs.sta.set_carry(carry);
            }

            // ==================== Memory Reference ====================

            Instruction::MemRef {
                op,
                disp,
                indexed,
                indirect,
            } => {
                let ea = self.resolve(self.regs.db.wrapping_add(disp), indexed, indirect);
                self.memory_reference(op, ea)?;
            }

            Instruction::Load {
                target,
                indexed,
                indirect,
            } => {
                let base = match target {
                    LoadTarget::Db(disp) => self.regs.db.wrapping_add(disp),
                    LoadTarget::Relative(disp) => disp.apply(here),
                };
                let ea = self.resolve(base, indexed, indirect);
                let value = self.mem.read(ea);
                self.push(value)?;
                self.regs.sta.set_cc_word(value);
            }

            Instruction::Ldi { value } => {
                self.push(value as u16)?;
                self.regs.sta.set_cc_word(value as u16);
            }

            Instruction::Ldxi { value } => {
                self.regs.x = value as u16;
            }

            Instruction::Ddiv => {
                self.require(4)?;
                let divisor = self.pop_double()? as i32;
                let dividend = self.pop_double()? as i32;
                let (quotient, remainder, overflow) = if divisor == 0 {
                    (0, 0, true)
                } else {
                    let (q, overflow) = dividend.overflowing_div(divisor);
                    (q, dividend.wrapping_rem(divisor), overflow)
                };
                self.push_double(quotient as u32)?;
                self.push_double(remainder as u32)?;
                self.regs.sta.set_overflow(overflow);
                self.regs.sta.set_cc_double(quotient as u32);
            }

            // ==================== Branches ====================

            Instruction::Br {
                disp,
                indexed,
                indirect,
            } => {
                let target = self.resolve(disp.apply(here), indexed, indirect);
                self.regs.jump(target);
            }

            Instruction::Bcc {
                selector,
                disp,
                indirect,
            } => {
                let accepts = match self.regs.sta.cc() {
                    ConditionCode::Less => 1,
                    ConditionCode::Equal => 2,
                    ConditionCode::Greater => 4,
                    ConditionCode::Indeterminate => 0,
                };
                if selector == 7 || selector & accepts != 0 {
                    self.branch(here, disp, indirect);
                }
            }

            Instruction::CountBranch { op, disp, indirect } => {
                let result = match op {
                    CountOp::Iabz => {
                        let value = self.peek()?.wrapping_add(1);
                        self.replace_top(value)?;
                        value
                    }
                    CountOp::Ixbz => {
                        self.regs.x = self.regs.x.wrapping_add(1);
                        self.regs.x
                    }
                    CountOp::Dxbz => {
                        self.regs.x = self.regs.x.wrapping_sub(1);
                        self.regs.x
                    }
                };
                if result == 0 {
                    self.branch(here, disp, indirect);
                }
            }

            Instruction::FlagBranch { op, disp, indirect } => {
                let sta = &mut self.regs.sta;
                let taken = match op {
                    FlagTest::Bcy => sta.carry(),
                    FlagTest::Bncy => !sta.carry(),
                    FlagTest::Bov => sta.overflow(),
                    FlagTest::Bnov => !sta.overflow(),
                };
                match op {
                    FlagTest::Bcy | FlagTest::Bncy => sta.set_carry(false),
                    FlagTest::Bov | FlagTest::Bnov => sta.set_overflow(false),
                }
                if taken {
                    self.branch(here, disp, indirect);
                }
            }

            Instruction::Bro { disp } => {
                if self.pop()? & 1 != 0 {
                    self.branch(here, disp, false);
                }
            }

            // ==================== Format 2 ====================

            Instruction::Stack { first, second } => {
                self.execute_stack_op(first)?;
                if self.is_running() {
                    self.execute_stack_op(second)?;
                }
            }
        }

        Ok(())
    }

    /// Effective address: base, plus X when indexed, then through memory
    /// when indirect.
    fn resolve(&self, base: u16, indexed: bool, indirect: bool) -> u16 {
        let mut ea = base;
        if indexed {
            ea = ea.wrapping_add(self.regs.x);
        }
        ea &= ADDR_MASK;
        if indirect {
            ea = self.mem.read(ea) & ADDR_MASK;
        }
        ea
    }

    fn branch(&mut self, here: u16, disp: Displacement, indirect: bool) {
        let target = self.resolve(disp.apply(here), false, indirect);
        self.regs.jump(target);
    }

    fn memory_reference(&mut self, op: MemOp, ea: u16) -> Result<(), CpuError> {
        let next = ea.wrapping_add(1) & ADDR_MASK;
        match op {
            MemOp::Incm => {
                let (value, flags) = arith::add16(self.mem.read(ea), 1);
                self.mem.write(ea, value);
                self.set_arith(value, flags);
            }
            MemOp::Decm => {
                let (value, flags) = arith::sub16(self.mem.read(ea), 1);
                self.mem.write(ea, value);
                self.set_arith(value, flags);
            }
            MemOp::Stor => {
                let value = self.pop()?;
                self.mem.write(ea, value);
            }
            MemOp::Ldd => {
                let value = join(self.mem.read(ea), self.mem.read(next));
                self.push_double(value)?;
                self.regs.sta.set_cc_double(value);
            }
            MemOp::Std => {
                let (high, low) = split(self.pop_double()?);
                self.mem.write(ea, high);
                self.mem.write(next, low);
            }
        }
        Ok(())
    }

    fn set_arith(&mut self, value: u16, flags: Flags) {
        self.regs.sta.set_carry(flags.carry);
        self.regs.sta.set_overflow(flags.overflow);
        self.regs.sta.set_cc_word(value);
    }

    fn set_arith_double(&mut self, value: u32, flags: Flags) {
        self.regs.sta.set_carry(flags.carry);
        self.regs.sta.set_overflow(flags.overflow);
        self.regs.sta.set_cc_double(value);
    }

    /// Pop two words, returning (deeper, top).
    fn pop_pair(&mut self) -> Result<(u16, u16), CpuError> {
        self.require(2)?;
        let top = self.pop()?;
        let deeper = self.pop()?;
        Ok((deeper, top))
    }

    /// Pop two doublewords, returning (deeper, top).
    fn pop_double_pair(&mut self) -> Result<(u32, u32), CpuError> {
        self.require(4)?;
        let top = self.pop_double()?;
        let deeper = self.pop_double()?;
        Ok((deeper, top))
    }

    fn push_real(&mut self, value: f64) -> Result<(), CpuError> {
        let (bits, overflow) = match real::from_f64(value) {
            Ok(bits) => (bits, false),
            Err(e) => {
                debug!("{} at P={:05o}", e, self.regs.pc);
                (0, true)
            }
        };
        self.push_double(bits)?;
        self.regs.sta.set_overflow(overflow);
        self.regs.sta.set_cc_double(bits);
        Ok(())
    }

    fn fix(&mut self, round: bool) -> Result<(), CpuError> {
        let value = real::to_f64(self.pop_double()?);
        let fixed = if round { value.round() } else { value.trunc() };
        let (result, overflow) = if (i32::MIN as f64..=i32::MAX as f64).contains(&fixed) {
            (fixed as i32 as u32, false)
        } else {
            (0, true)
        };
        self.push_double(result)?;
        self.regs.sta.set_overflow(overflow);
        self.regs.sta.set_cc_double(result);
        Ok(())
    }

    /// Execute one format-2 stack opcode.
    pub fn execute_stack_op(&mut self, op: StackOp) -> Result<(), CpuError> {
        match op {
            StackOp::Nop => {}

            // ==================== Stack Manipulation ====================

            StackOp::Del => {
                self.pop()?;
            }
            StackOp::Delb => self.drop_second()?,
            StackOp::Ddel => {
                self.pop_double()?;
            }
            StackOp::Zero => self.push(0)?,
            StackOp::Dzro => self.push_double(0)?,
            StackOp::Dup => {
                let value = self.peek()?;
                self.push(value)?;
                self.regs.sta.set_cc_word(value);
            }
            StackOp::Ddup => {
                let value = self.peek_double()?;
                self.push_double(value)?;
                self.regs.sta.set_cc_double(value);
            }
            StackOp::Xch => {
                let (deeper, top) = (self.peek_second()?, self.peek()?);
                self.replace_top(deeper)?;
                self.replace_second(top)?;
            }
            StackOp::Dxch => {
                let (deeper, top) = self.pop_double_pair()?;
                self.push_double(top)?;
                self.push_double(deeper)?;
            }
            StackOp::Cab => {
                self.require(3)?;
                let regs = &mut self.regs;
                let (a, b, c) = (regs.ra, regs.rb, regs.rc);
                regs.ra = c;
                regs.rb = a;
                regs.rc = b;
            }
            StackOp::Zrob => {
                self.replace_second(0)?;
                self.regs.sta.set_cc(ConditionCode::Equal);
            }

            // ==================== Index Register ====================

            StackOp::Zrox => self.regs.x = 0,
            StackOp::Incx => {
                let (value, flags) = arith::add16(self.regs.x, 1);
                self.regs.x = value;
                self.set_arith(value, flags);
            }
            StackOp::Decx => {
                let (value, flags) = arith::sub16(self.regs.x, 1);
                self.regs.x = value;
                self.set_arith(value, flags);
            }
            StackOp::Stax => self.regs.x = self.pop()?,
            StackOp::Ldxa => {
                let x = self.regs.x;
                self.push(x)?;
            }
            StackOp::Ldxb => {
                let x = self.regs.x;
                self.replace_second(x)?;
            }
            StackOp::Stbx => self.regs.x = self.peek_second()?,
            StackOp::Xax => {
                let value = self.peek()?;
                let x = self.regs.x;
                self.replace_top(x)?;
                self.regs.x = value;
            }
            StackOp::Xbx => {
                let value = self.peek_second()?;
                let x = self.regs.x;
                self.replace_second(x)?;
                self.regs.x = value;
            }
            StackOp::Adax => {
                let value = self.pop()?;
                let (sum, flags) = arith::add16(self.regs.x, value);
                self.regs.x = sum;
                self.set_arith(sum, flags);
            }
            StackOp::Adbx => {
                let value = self.peek_second()?;
                let (sum, flags) = arith::add16(self.regs.x, value);
                self.regs.x = sum;
                self.set_arith(sum, flags);
            }
            StackOp::Adxa => {
                let (sum, flags) = arith::add16(self.peek()?, self.regs.x);
                self.replace_top(sum)?;
                self.set_arith(sum, flags);
            }
            StackOp::Adxb => {
                let (sum, flags) = arith::add16(self.peek_second()?, self.regs.x);
                self.replace_second(sum)?;
                self.set_arith(sum, flags);
            }

            // ==================== Integer Arithmetic ====================

            StackOp::Add => {
                let (a, b) = self.pop_pair()?;
                let (value, flags) = arith::add16(a, b);
                self.push(value)?;
                self.set_arith(value, flags);
            }
            StackOp::Sub => {
                let (a, b) = self.pop_pair()?;
                let (value, flags) = arith::sub16(a, b);
                self.push(value)?;
                self.set_arith(value, flags);
            }
            StackOp::Neg => {
                let (value, flags) = arith::sub16(0, self.peek()?);
                self.replace_top(value)?;
                self.set_arith(value, flags);
            }
            StackOp::Inca => {
                let (value, flags) = arith::add16(self.peek()?, 1);
                self.replace_top(value)?;
                self.set_arith(value, flags);
            }
            StackOp::Deca => {
                let (value, flags) = arith::sub16(self.peek()?, 1);
                self.replace_top(value)?;
                self.set_arith(value, flags);
            }
            StackOp::Incb => {
                let (value, flags) = arith::add16(self.peek_second()?, 1);
                self.replace_second(value)?;
                self.set_arith(value, flags);
            }
            StackOp::Decb => {
                let (value, flags) = arith::sub16(self.peek_second()?, 1);
                self.replace_second(value)?;
                self.set_arith(value, flags);
            }
            StackOp::Mpy => {
                let (a, b) = self.pop_pair()?;
                let product = a as i16 as i32 * b as i16 as i32;
                let value = product as u16;
                self.push(value)?;
                self.regs.sta.set_overflow(product != value as i16 as i32);
                self.regs.sta.set_cc_word(value);
            }
            StackOp::Mpyl => {
                let (a, b) = self.pop_pair()?;
                let product = (a as i16 as i32 * b as i16 as i32) as u32;
                self.push_double(product)?;
                self.regs.sta.set_overflow(false);
                self.regs.sta.set_cc_double(product);
            }
            StackOp::Div => {
                let (dividend, divisor) = self.pop_pair()?;
                let (quotient, remainder, overflow) = if divisor == 0 {
                    (0, 0, true)
                } else {
                    let (a, b) = (dividend as i16, divisor as i16);
                    let (q, overflow) = a.overflowing_div(b);
                    (q as u16, a.wrapping_rem(b) as u16, overflow)
                };
                self.push(quotient)?;
                self.push(remainder)?;
                self.regs.sta.set_overflow(overflow);
                self.regs.sta.set_cc_word(quotient);
            }
            StackOp::Divl => {
                self.require(3)?;
                let divisor = self.pop()? as i16 as i64;
                let dividend = self.pop_double()? as i32 as i64;
                let (quotient, remainder, overflow) = if divisor == 0 {
                    (0, 0, true)
                } else {
                    let q = dividend / divisor;
                    let r = dividend % divisor;
                    (q as u16, r as u16, !(-32768..=65535).contains(&q))
                };
                self.push(quotient)?;
                self.push(remainder)?;
                self.regs.sta.set_overflow(overflow);
                self.regs.sta.set_cc_word(quotient);
            }

            // ==================== Doubleword Arithmetic ====================

            StackOp::Dadd => {
                let (a, b) = self.pop_double_pair()?;
                let (value, flags) = arith::add32(a, b);
                self.push_double(value)?;
                self.set_arith_double(value, flags);
            }
            StackOp::Dsub => {
                let (a, b) = self.pop_double_pair()?;
                let (value, flags) = arith::sub32(a, b);
                self.push_double(value)?;
                self.set_arith_double(value, flags);
            }
            StackOp::Dneg => {
                let (value, flags) = arith::sub32(0, self.peek_double()?);
                self.replace_double(value)?;
                self.set_arith_double(value, flags);
            }

            // ==================== Logical / Unsigned ====================

            StackOp::Ladd => {
                let (a, b) = self.pop_pair()?;
                let (value, flags) = arith::add16(a, b);
                self.push(value)?;
                self.regs.sta.set_carry(flags.carry);
                self.regs.sta.set_cc_word(value);
            }
            StackOp::Lsub => {
                let (a, b) = self.pop_pair()?;
                let (value, flags) = arith::sub16(a, b);
                self.push(value)?;
                self.regs.sta.set_carry(flags.carry);
                self.regs.sta.set_cc_word(value);
            }
            StackOp::Lmpy => {
                let (a, b) = self.pop_pair()?;
                let product = a as u32 * b as u32;
                let (high, low) = split(product);
                self.push_double(product)?;
                self.regs.sta.set_carry(high != 0);
                self.regs.sta.set_cc_word(low);
            }
            StackOp::Ldiv => {
                self.require(3)?;
                let divisor = self.pop()? as u32;
                let dividend = self.pop_double()?;
                let (quotient, remainder, overflow) = if divisor == 0 {
                    (0, 0, true)
                } else {
                    let q = dividend / divisor;
                    (q as u16, (dividend % divisor) as u16, q > 0xFFFF)
                };
                self.push(quotient)?;
                self.push(remainder)?;
                self.regs.sta.set_overflow(overflow);
                self.regs.sta.set_cc_word(quotient);
            }
            StackOp::Not => {
                let value = !self.peek()?;
                self.replace_top(value)?;
                self.regs.sta.set_cc_word(value);
            }
            StackOp::Or | StackOp::Xor | StackOp::And => {
                let (a, b) = self.pop_pair()?;
                let value = match op {
                    StackOp::Or => a | b,
                    StackOp::Xor => a ^ b,
                    _ => a & b,
                };
                self.push(value)?;
                self.regs.sta.set_cc_word(value);
            }

            // ==================== Tests and Compares ====================

            StackOp::Test => {
                let value = self.peek()?;
                self.regs.sta.set_cc_word(value);
            }
            StackOp::Dtst => {
                let value = self.peek_double()?;
                self.regs.sta.set_cc_double(value);
            }
            StackOp::Btst => {
                let byte = self.peek()? as u8;
                let cc = if byte.is_ascii_digit() {
                    ConditionCode::Equal
                } else if byte.is_ascii_alphabetic() {
                    ConditionCode::Less
                } else {
                    ConditionCode::Greater
                };
                self.regs.sta.set_cc(cc);
            }
            StackOp::Cmp => {
                let (a, b) = self.pop_pair()?;
                let ordering = (a as i16).cmp(&(b as i16));
                self.regs.sta.set_cc(ConditionCode::of_ordering(ordering));
            }
            StackOp::Lcmp => {
                let (a, b) = self.pop_pair()?;
                self.regs.sta.set_cc(ConditionCode::of_ordering(a.cmp(&b)));
            }
            StackOp::Dcmp => {
                let (a, b) = self.pop_double_pair()?;
                let ordering = (a as i32).cmp(&(b as i32));
                self.regs.sta.set_cc(ConditionCode::of_ordering(ordering));
            }

            // ==================== Real Arithmetic ====================

            StackOp::Flt => {
                let value = self.pop()? as i16 as f64;
                self.push_real(value)?;
            }
            StackOp::Dflt => {
                let value = self.pop_double()? as i32 as f64;
                self.push_real(value)?;
            }
            StackOp::Fadd | StackOp::Fsub | StackOp::Fmpy | StackOp::Fdiv => {
                let (a, b) = self.pop_double_pair()?;
                let (a, b) = (real::to_f64(a), real::to_f64(b));
                let value = match op {
                    StackOp::Fadd => a + b,
                    StackOp::Fsub => a - b,
                    StackOp::Fmpy => a * b,
                    _ => a / b,
                };
                self.push_real(value)?;
            }
            StackOp::Fneg => {
                let value = real::negate(self.peek_double()?);
                self.replace_double(value)?;
                self.regs.sta.set_cc_double(value);
            }
            StackOp::Fcmp => {
                let (a, b) = self.pop_double_pair()?;
                let ordering = real::to_f64(a)
                    .partial_cmp(&real::to_f64(b))
                    .unwrap_or(Ordering::Equal);
                self.regs.sta.set_cc(ConditionCode::of_ordering(ordering));
            }
            StackOp::Fixr => self.fix(true)?,
            StackOp::Fixt => self.fix(false)?,

            StackOp::Unk => return Err(CpuError::UnknownOpcode(op.code())),
        }
        Ok(())
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Why the machine stopped, if it has.
    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    /// Check if the CPU has stopped, by HALT or by a fault.
    pub fn is_halted(&self) -> bool {
        self.state != CpuState::Running
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("halt_reason", &self.halt_reason)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("stack underflow")]
    StackUnderflow,

    #[error("unknown opcode {0:03o}")]
    UnknownOpcode(u8),

    #[error(transparent)]
    Decode(#[from] decode::DecodeError),
}
