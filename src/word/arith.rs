//! Two's complement arithmetic with hardware flags.
//!
//! Every operation returns its result together with the carry and
//! overflow bits the instruction will latch into the status word.

use crate::word::{SIGN16, SIGN32};

/// Carry and overflow produced by an arithmetic primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// Unsigned carry out of the top bit, or borrow on subtract.
    pub carry: bool,
    /// Signed overflow.
    pub overflow: bool,
}

/// Combine two stack words into a doubleword, high word first.
#[inline]
pub const fn join(high: u16, low: u16) -> u32 {
    ((high as u32) << 16) | low as u32
}

/// Split a doubleword into (high, low).
#[inline]
pub const fn split(value: u32) -> (u16, u16) {
    ((value >> 16) as u16, value as u16)
}

/// Add two words, returning (sum, flags).
pub fn add16(a: u16, b: u16) -> (u16, Flags) {
    let (sum, carry) = a.overflowing_add(b);
    let overflow = (a ^ b) & SIGN16 == 0 && (a ^ sum) & SIGN16 != 0;
    (sum, Flags { carry, overflow })
}

/// Subtract two words (a - b), returning (difference, flags).
///
/// Carry reports a borrow.
pub fn sub16(a: u16, b: u16) -> (u16, Flags) {
    let (diff, carry) = a.overflowing_sub(b);
    let overflow = (a ^ b) & SIGN16 != 0 && (a ^ diff) & SIGN16 != 0;
    (diff, Flags { carry, overflow })
}

/// Add two doublewords, returning (sum, flags).
pub fn add32(a: u32, b: u32) -> (u32, Flags) {
    let (sum, carry) = a.overflowing_add(b);
    let overflow = (a ^ b) & SIGN32 == 0 && (a ^ sum) & SIGN32 != 0;
    (sum, Flags { carry, overflow })
}

/// Subtract two doublewords (a - b), returning (difference, flags).
pub fn sub32(a: u32, b: u32) -> (u32, Flags) {
    let (diff, carry) = a.overflowing_sub(b);
    let overflow = (a ^ b) & SIGN32 != 0 && (a ^ diff) & SIGN32 != 0;
    (diff, Flags { carry, overflow })
}

/// Shift direction and fill rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    /// Left, sign bit held in place.
    ArithmeticLeft,
    /// Right, sign bit replicated.
    ArithmeticRight,
    /// Left, zero fill.
    LogicalLeft,
    /// Right, zero fill.
    LogicalRight,
}

/// Shift the low `width` bits of `value` by `count`.
///
/// Returns the shifted value and the last bit shifted out (false when
/// `count` is zero). Counts larger than the width shift everything out.
pub fn shift(value: u32, width: u32, count: u32, kind: ShiftKind) -> (u32, bool) {
    debug_assert!(width == 16 || width == 32);
    let mask = (1u128 << width) - 1;
    let sign = 1u128 << (width - 1);
    let v = value as u128 & mask;

    if count == 0 {
        return (v as u32, false);
    }

    match kind {
        ShiftKind::LogicalLeft => {
            let wide = v << count.min(96);
            let carry = (wide >> width) & 1 == 1;
            ((wide & mask) as u32, carry)
        }
        ShiftKind::ArithmeticLeft => {
            let magnitude = sign - 1;
            let wide = (v & magnitude) << count.min(96);
            let carry = (wide >> (width - 1)) & 1 == 1;
            (((v & sign) | (wide & magnitude)) as u32, carry)
        }
        ShiftKind::LogicalRight => {
            let carry = count <= width && (v >> (count - 1)) & 1 == 1;
            let result = if count >= width { 0 } else { v >> count };
            (result as u32, carry)
        }
        ShiftKind::ArithmeticRight => {
            let signed = if v & sign != 0 {
                v as i128 - (1i128 << width)
            } else {
                v as i128
            };
            let carry = (signed >> (count - 1).min(100)) & 1 == 1;
            let result = (signed >> count.min(100)) as u128 & mask;
            (result as u32, carry)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add16_flags() {
        assert_eq!(add16(10, 20), (30, Flags::default()));
        assert_eq!(add16(0x7FFF, 1), (0x8000, Flags { carry: false, overflow: true }));
        assert_eq!(add16(0xFFFF, 1), (0, Flags { carry: true, overflow: false }));
        assert_eq!(add16(0x8000, 0x8000), (0, Flags { carry: true, overflow: true }));
    }

    #[test]
    fn test_sub16_borrow() {
        assert_eq!(sub16(0, 1), (0xFFFF, Flags { carry: true, overflow: false }));
        assert_eq!(sub16(0x8000, 1), (0x7FFF, Flags { carry: false, overflow: true }));
        assert_eq!(sub16(30, 10), (20, Flags::default()));
    }

    #[test]
    fn test_add32_flags() {
        assert_eq!(add32(0x0002_0000, 0x0003_0000).0, 0x0005_0000);
        assert!(add32(0x7FFF_FFFF, 1).1.overflow);
        assert!(add32(0xFFFF_FFFF, 1).1.carry);
    }

    #[test]
    fn test_join_split() {
        assert_eq!(join(0x1234, 0xABCD), 0x1234_ABCD);
        assert_eq!(split(0x1234_ABCD), (0x1234, 0xABCD));
    }

    #[test]
    fn test_shift_logical() {
        assert_eq!(shift(0x4000_0001, 32, 1, ShiftKind::LogicalLeft), (0x8000_0002, false));
        assert_eq!(shift(0x0000_0001, 32, 1, ShiftKind::LogicalRight), (0, true));
        assert_eq!(shift(0x8001, 16, 1, ShiftKind::LogicalLeft), (0x0002, true));
        assert_eq!(shift(0xFFFF, 16, 40, ShiftKind::LogicalRight), (0, false));
    }

    #[test]
    fn test_shift_arithmetic_keeps_sign() {
        assert_eq!(shift(0x8000, 16, 3, ShiftKind::ArithmeticRight), (0xF000, false));
        assert_eq!(shift(0x8003, 16, 1, ShiftKind::ArithmeticLeft), (0x8006, false));
        assert_eq!(shift(0x4001, 16, 1, ShiftKind::ArithmeticLeft), (0x0002, true));
        assert_eq!(shift(0xFFFF, 16, 63, ShiftKind::ArithmeticRight), (0xFFFF, true));
    }

    #[test]
    fn test_shift_zero_count_clears_carry() {
        assert_eq!(shift(0x1234, 16, 0, ShiftKind::LogicalLeft), (0x1234, false));
    }

    proptest! {
        #[test]
        fn prop_add16_matches_wide_math(a: u16, b: u16) {
            let (sum, flags) = add16(a, b);
            prop_assert_eq!(sum, a.wrapping_add(b));
            prop_assert_eq!(flags.carry, a as u32 + b as u32 > 0xFFFF);
            let wide = a as i16 as i32 + b as i16 as i32;
            prop_assert_eq!(flags.overflow, wide != sum as i16 as i32);
        }

        #[test]
        fn prop_sub16_matches_wide_math(a: u16, b: u16) {
            let (diff, flags) = sub16(a, b);
            prop_assert_eq!(diff, a.wrapping_sub(b));
            prop_assert_eq!(flags.carry, a < b);
            let wide = a as i16 as i32 - b as i16 as i32;
            prop_assert_eq!(flags.overflow, wide != diff as i16 as i32);
        }

        #[test]
        fn prop_arithmetic_right_is_division_by_power_of_two(a: u16, n in 0u32..16) {
            let (value, _) = shift(a as u32, 16, n, ShiftKind::ArithmeticRight);
            prop_assert_eq!(value as u16 as i16, (a as i16) >> n);
        }
    }
}
