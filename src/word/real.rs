//! HP 3000 32-bit real format.
//!
//! Layout, high bit first:
//! - bit 31: sign
//! - bits 30..22: exponent, excess 256
//! - bits 21..0: fraction with an implied leading 1
//!
//! The value is `(1 + fraction / 2^22) * 2^(exponent - 256)`. The all-zero
//! word is zero; a set sign bit with nothing else also reads as zero.
//!
//! Arithmetic is done in `f64`, which holds every representable real
//! exactly, and rounded back on the way out.

use thiserror::Error;

const FRACTION_BITS: u32 = 22;
const FRACTION_MASK: u32 = (1 << FRACTION_BITS) - 1;
const EXPONENT_BIAS: i32 = 256;
const EXPONENT_MAX: i32 = 511;
const F64_BIAS: i32 = 1023;

/// A value that cannot be represented as an HP 3000 real.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RealError {
    #[error("real overflow")]
    Overflow,
    #[error("real underflow")]
    Underflow,
}

/// Decode a real held in two words.
pub fn to_f64(bits: u32) -> f64 {
    if bits & 0x7FFF_FFFF == 0 {
        return 0.0;
    }
    let sign = (bits >> 31) as u64;
    let exponent = ((bits >> FRACTION_BITS) & 0x1FF) as i32;
    let fraction = (bits & FRACTION_MASK) as u64;
    let biased = (exponent - EXPONENT_BIAS + F64_BIAS) as u64;
    f64::from_bits((sign << 63) | (biased << 52) | (fraction << (52 - FRACTION_BITS)))
}

/// Encode an `f64` as a real, rounding the fraction to nearest.
pub fn from_f64(value: f64) -> Result<u32, RealError> {
    if value == 0.0 {
        return Ok(0);
    }
    if !value.is_finite() {
        return Err(RealError::Overflow);
    }

    let bits = value.to_bits();
    let sign = (bits >> 63) as u32;
    let raw_exponent = ((bits >> 52) & 0x7FF) as i32;
    if raw_exponent == 0 {
        // f64 subnormals are far below the smallest real
        return Err(RealError::Underflow);
    }

    let mut exponent = raw_exponent - F64_BIAS + EXPONENT_BIAS;
    let shift = 52 - FRACTION_BITS;
    let mut fraction = ((bits & ((1u64 << 52) - 1)) + (1u64 << (shift - 1))) >> shift;
    if fraction > FRACTION_MASK as u64 {
        fraction = 0;
        exponent += 1;
    }

    if exponent > EXPONENT_MAX {
        return Err(RealError::Overflow);
    }
    if exponent < 0 {
        return Err(RealError::Underflow);
    }

    Ok((sign << 31) | ((exponent as u32) << FRACTION_BITS) | fraction as u32)
}

/// Negate a real without changing its magnitude.
pub fn negate(bits: u32) -> u32 {
    if bits & 0x7FFF_FFFF == 0 {
        0
    } else {
        bits ^ 0x8000_0000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_encodings() {
        assert_eq!(from_f64(1.0), Ok(0x4000_0000));
        assert_eq!(from_f64(2.0), Ok(0x4040_0000));
        assert_eq!(from_f64(-1.0), Ok(0xC000_0000));
        assert_eq!(from_f64(1.5), Ok(0x4020_0000));
        assert_eq!(from_f64(0.0), Ok(0));
    }

    #[test]
    fn test_decode() {
        assert_eq!(to_f64(0x4000_0000), 1.0);
        assert_eq!(to_f64(0xC040_0000), -2.0);
        assert_eq!(to_f64(0), 0.0);
        assert_eq!(to_f64(0x8000_0000), 0.0);
    }

    #[test]
    fn test_range_errors() {
        assert_eq!(from_f64(1e100), Err(RealError::Overflow));
        assert_eq!(from_f64(-1e100), Err(RealError::Overflow));
        assert_eq!(from_f64(1e-100), Err(RealError::Underflow));
        assert_eq!(from_f64(f64::NAN), Err(RealError::Overflow));
    }

    #[test]
    fn test_rounding_carries_into_exponent() {
        // 2 - 2^-30 rounds up to exactly 2
        let almost_two = 2.0 - 2f64.powi(-30);
        assert_eq!(from_f64(almost_two), Ok(0x4040_0000));
    }

    #[test]
    fn test_negate() {
        assert_eq!(negate(0x4000_0000), 0xC000_0000);
        assert_eq!(negate(0), 0);
    }

    proptest! {
        #[test]
        fn prop_small_integers_are_exact(n in -4_000_000i32..4_000_000) {
            let bits = from_f64(n as f64).unwrap();
            prop_assert_eq!(to_f64(bits), n as f64);
        }

        #[test]
        fn prop_decode_encode_is_identity(bits: u32) {
            prop_assume!(bits & 0x7FFF_FFFF != 0);
            prop_assert_eq!(from_f64(to_f64(bits)), Ok(bits));
        }
    }
}
