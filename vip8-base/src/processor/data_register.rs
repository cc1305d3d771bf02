use num_enum::{IntoPrimitive, TryFromPrimitive, UnsafeFromPrimitive};
use static_assertions::const_assert_eq;

use crate::nibble_ints::U4;

/// Data register of the CHIP-8 processor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    TryFromPrimitive,
    IntoPrimitive,
    UnsafeFromPrimitive,
)]
#[repr(u8)]
pub enum DataRegister {
    /// Used as the offset in [`Instruction::JumpOffset`](crate::instruction::Instruction::JumpOffset).
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    /// Flag register. Written as a side effect by the arithmetic instructions
    /// that produce a carry, borrow or shifted-out bit, and by sprite drawing
    /// for collisions. See the docs of the individual
    /// [`Instruction`](crate::instruction::Instruction) variants.
    VF,
}

impl DataRegister {
    /// Number of data registers.
    pub const COUNT: usize = 16;
}

const_assert_eq!(DataRegister::VF as usize + 1, DataRegister::COUNT);
const_assert_eq!(DataRegister::COUNT, U4::MAX.into_u8() as usize + 1);

impl From<DataRegister> for U4 {
    fn from(reg: DataRegister) -> Self {
        U4::from_u8_masked(reg as u8)
    }
}

impl From<U4> for DataRegister {
    fn from(val: U4) -> Self {
        // SAFETY: DataRegister has exactly U4::MAX + 1 variants.
        unsafe { DataRegister::from_unchecked(u8::from(val)) }
    }
}
