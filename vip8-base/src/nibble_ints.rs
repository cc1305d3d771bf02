use std::convert::TryFrom;

use derive_more::*;
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Error)]
#[error("value {value:#X} exceeds the maximum value {max_value:#X}")]
pub struct UpperBoundExceededError {
    value: usize,
    max_value: usize,
}

/// A 4-bit unsigned integer, e.g. a register index or a sprite height.
/// Stored in a full `u8`, the high nibble is always zero.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default, Into, Display, UpperHex)]
#[repr(transparent)]
pub struct U4(u8);

/// Which half of a byte to take a [`U4`] from.
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum U8Nibble {
    Lo = 0,
    Hi = 1,
}

impl U4 {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(0b1111);

    pub const fn into_u8(self) -> u8 {
        self.0
    }

    pub const fn from_u8(val: u8, nibble: U8Nibble) -> Self {
        Self((val >> (4 * (nibble as u8))) & 0b1111)
    }

    /// Keep only the low nibble of `val`.
    pub const fn from_u8_masked(val: u8) -> Self {
        Self::from_u8(val, U8Nibble::Lo)
    }
}

impl TryFrom<u8> for U4 {
    type Error = UpperBoundExceededError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::MAX.0 {
            Ok(Self(value))
        } else {
            Err(UpperBoundExceededError {
                value: value as usize,
                max_value: Self::MAX.0 as usize,
            })
        }
    }
}

/// A 12-bit unsigned integer, the width of a CHIP-8 address.
/// Stored in a full `u16`, the high nibble is always zero.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default, Into, Display, UpperHex)]
#[repr(transparent)]
pub struct U12(u16);

impl U12 {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(0xFFF);

    pub const fn into_u16(self) -> u16 {
        self.0
    }

    /// Keep only the low 12 bits of `val`.
    pub const fn from_u16_masked(val: u16) -> Self {
        Self(val & Self::MAX.0)
    }

    /// Add `rhs` and wrap around at 12 bits.
    pub const fn wrapping_add(self, rhs: u16) -> Self {
        Self::from_u16_masked(self.0.wrapping_add(rhs))
    }
}

impl TryFrom<u16> for U12 {
    type Error = UpperBoundExceededError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= Self::MAX.0 {
            Ok(Self(value))
        } else {
            Err(UpperBoundExceededError {
                value: value as usize,
                max_value: Self::MAX.0 as usize,
            })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn u4_from_u8_nibbles() {
        assert_eq!(U4::from_u8(0xA7, U8Nibble::Hi), U4(0xA));
        assert_eq!(U4::from_u8(0xA7, U8Nibble::Lo), U4(0x7));
    }

    #[test]
    fn u4_try_from_out_of_bounds() {
        assert_eq!(
            U4::try_from(0x10),
            Err(UpperBoundExceededError {
                value: 0x10,
                max_value: 0xF
            })
        );
    }

    #[test]
    fn u12_wrapping_add() {
        assert_eq!(U12(0xFFE).wrapping_add(1), U12(0xFFF));
        assert_eq!(U12(0xFFF).wrapping_add(1), U12(0x000));
        assert_eq!(U12(0xFF0).wrapping_add(0xFF), U12(0x0EF));
    }

    #[test]
    fn u12_try_from_out_of_bounds() {
        assert!(U12::try_from(0x1000).is_err());
        assert_eq!(U12::try_from(0xFFF), Ok(U12::MAX));
    }
}
