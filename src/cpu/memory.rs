//! HP 3000 main memory.
//!
//! A flat store of 32K sixteen-bit words. Every address is reduced to 15
//! bits before use, so accesses wrap silently and never fault.

use serde::{Deserialize, Serialize};

/// Number of words of main memory.
pub const MEMORY_SIZE: usize = 0x8000;

/// Mask applied to every address.
pub const ADDR_MASK: u16 = 0x7FFF;

/// Word-addressed main memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    words: Vec<u16>,
}

impl Memory {
    /// Create a new memory with all words zeroed.
    pub fn new() -> Self {
        Self {
            words: vec![0; MEMORY_SIZE],
        }
    }

    #[inline]
    fn index(addr: u16) -> usize {
        (addr & ADDR_MASK) as usize
    }

    /// Read the word at `addr` (masked).
    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.words[Self::index(addr)]
    }

    /// Write `value` at `addr` (masked).
    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.words[Self::index(addr)] = value;
    }

    /// Fill `buf` from consecutive addresses starting at `addr`, wrapping
    /// past the top of memory.
    pub fn read_block(&self, addr: u16, buf: &mut [u16]) {
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = self.read(addr.wrapping_add(i as u16));
        }
    }

    /// Store `data` at consecutive addresses starting at `addr`, wrapping
    /// past the top of memory.
    pub fn write_block(&mut self, addr: u16, data: &[u16]) {
        for (i, &word) in data.iter().enumerate() {
            self.write(addr.wrapping_add(i as u16), word);
        }
    }

    /// Load a program image at `start`.
    pub fn load(&mut self, start: u16, program: &[u16]) {
        self.write_block(start, program);
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Dump `count` words starting at `start` as (address, word) pairs.
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u16)> {
        (0..count)
            .map(|i| {
                let addr = start.wrapping_add(i as u16) & ADDR_MASK;
                (addr, self.read(addr))
            })
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.words.iter().filter(|&&w| w != 0).count();
        f.debug_struct("Memory")
            .field("non_zero_words", &non_zero)
            .field("total_words", &MEMORY_SIZE)
            .finish()
    }
}
