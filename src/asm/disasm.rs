//! Listings of memory and assembled programs.

use crate::asm::assembler::Program;
use crate::asm::codec::disassemble;
use crate::cpu::memory::Memory;

/// Format one word as `AAAAA: WWWWWW  TEXT`.
pub fn format_line(addr: u16, word: u16) -> String {
    format!("{:05o}: {:06o}  {}", addr, word, disassemble(word))
}

/// Disassemble `count` words of memory starting at `start`.
pub fn disassemble_memory(mem: &Memory, start: u16, count: usize) -> String {
    let mut output = String::new();
    for (addr, word) in mem.dump(start, count) {
        output.push_str(&format_line(addr, word));
        output.push('\n');
    }
    output
}

/// Disassemble a program in emission order.
pub fn disassemble_program(program: &Program) -> String {
    let mut output = String::new();
    output.push_str("; HP 3000 Disassembly\n");
    output.push_str(&format!("; origin {:05o}, {} words\n\n", program.origin, program.len()));

    for &(addr, word) in &program.words {
        output.push_str(&format_line(addr, word));
        output.push('\n');
    }

    output
}
