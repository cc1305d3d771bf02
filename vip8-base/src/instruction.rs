use std::convert::TryFrom;

use derive_more::{From, Into, UpperHex};
use thiserror::Error;

use crate::{
    nibble_ints::{U8Nibble, U12, U4},
    processor::DataRegister,
};

/// An undecoded instruction, as fetched from memory in big-endian order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, From, Into, UpperHex)]
pub struct RawInstruction(u16);

impl RawInstruction {
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Bits 15–12, selecting the broad category of the instruction.
    pub const fn family(self) -> U4 {
        U4::from_u8((self.0 >> 8) as u8, U8Nibble::Hi)
    }

    /// Bits 11–8, usually the first register operand.
    pub const fn x(self) -> U4 {
        U4::from_u8((self.0 >> 8) as u8, U8Nibble::Lo)
    }

    /// Bits 7–4, usually the second register operand.
    pub const fn y(self) -> U4 {
        U4::from_u8(self.0 as u8, U8Nibble::Hi)
    }

    /// Bits 3–0, a 4-bit immediate.
    pub const fn n(self) -> U4 {
        U4::from_u8(self.0 as u8, U8Nibble::Lo)
    }

    /// Bits 7–0, an 8-bit immediate.
    pub const fn kk(self) -> u8 {
        self.0 as u8
    }

    /// Bits 11–0, a 12-bit address.
    pub const fn nnn(self) -> U12 {
        U12::from_u16_masked(self.0)
    }

    const fn from_nibbles(family: u8, x: U4, y: U4, n: U4) -> Self {
        Self(
            (family as u16) << 12
                | (x.into_u8() as u16) << 8
                | (y.into_u8() as u16) << 4
                | n.into_u8() as u16,
        )
    }

    const fn from_x_kk(family: u8, x: U4, kk: u8) -> Self {
        Self((family as u16) << 12 | (x.into_u8() as u16) << 8 | kk as u16)
    }

    const fn from_nnn(family: u8, nnn: U12) -> Self {
        Self((family as u16) << 12 | nnn.into_u16())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown instruction `{0:04X}`")]
pub struct UnknownInstructionError(pub RawInstruction);

/// A CHIP-8 instruction
///
/// References used are
/// <https://github.com/mattmikolay/chip-8/wiki/CHIP%E2%80%908-Instruction-Set> (CC-BY-SA 4.0, Matthew Mikolay)
/// and <https://en.wikipedia.org/wiki/CHIP-8#Opcode_table> (CC-BY-SA 3.0, Wikipedia Authors).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    /// `00E0`: Clear the display.
    ClearDisplay,
    /// `00EE`: Return from a subroutine.
    Return,
    /// `1NNN`: Jump to the `target_address`.
    Jump { target_address: U12 },
    /// `2NNN`: Call the subroutine at the `target_address`.
    CallSubroutine { target_address: U12 },
    /// `3XKK`: Skip the next instruction if the value in `register`
    /// is equal to `constant`.
    SkipIfEqConst { register: DataRegister, constant: u8 },
    /// `4XKK`: Skip the next instruction if the value in `register`
    /// is not equal to `constant`.
    SkipIfNeqConst { register: DataRegister, constant: u8 },
    /// `5XY0`: Skip the next instruction if the value in `register1`
    /// is equal to the value in `register2`.
    SkipIfEq {
        register1: DataRegister,
        register2: DataRegister,
    },
    /// `6XKK`: Assign `constant` to `target_register`.
    AssignConst {
        target_register: DataRegister,
        constant: u8,
    },
    /// `7XKK`: Add `constant` to the value in `target_register`, wrapping around at 8 bits.
    ///
    /// [`DataRegister::VF`] is not altered.
    AddAssignConst {
        target_register: DataRegister,
        constant: u8,
    },
    /// `8XY0`: Assign the value in `source_register` to `target_register`.
    Assign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// `8XY1`: Bitwise-OR the value in `source_register` into `target_register`.
    OrAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// `8XY2`: Bitwise-AND the value in `source_register` into `target_register`.
    AndAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// `8XY3`: Bitwise-XOR the value in `source_register` into `target_register`.
    XorAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// `8XY4`: Add the value in `source_register` to the value in `target_register`.
    ///
    /// If a carry occurs [`DataRegister::VF`] is set to `1`,
    /// if not it is set to `0`.
    AddAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// `8XY5`: Subtract the value in `source_register`
    /// from the value in `target_register`.
    ///
    /// If a borrow occurs [`DataRegister::VF`] is set to `0`,
    /// if not it is set to `1`.
    SubAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// `8XY6`: Shift the value in `target_register` one bit to the right.
    ///
    /// [`DataRegister::VF`] is set to the bit that is shifted out.
    /// `ignored_register` is only kept to re-encode the instruction.
    ShrAssign {
        target_register: DataRegister,
        ignored_register: DataRegister,
    },
    /// `8XY7`: Subtract the value in `target_register`
    /// from the value in `source_register`
    /// and assign the result to `target_register`.
    ///
    /// If a borrow occurs [`DataRegister::VF`] is set to `0`,
    /// if not it is set to `1`.
    RevSubAssign {
        target_register: DataRegister,
        source_register: DataRegister,
    },
    /// `8XYE`: Shift the value in `target_register` one bit to the left.
    ///
    /// [`DataRegister::VF`] is set to the bit that is shifted out.
    /// `ignored_register` is only kept to re-encode the instruction.
    ShlAssign {
        target_register: DataRegister,
        ignored_register: DataRegister,
    },
    /// `9XY0`: Skip the next instruction if the value in `register1`
    /// is not equal to the value in `register2`.
    SkipIfNeq {
        register1: DataRegister,
        register2: DataRegister,
    },
    /// `ANNN`: Assign `address` to the special address register `I`.
    AssignAddrToI { address: U12 },
    /// `BNNN`: Jump to the sum of `address` and the value in [`DataRegister::V0`].
    JumpOffset { address: U12 },
    /// `CXKK`: Assign a random byte, bitwise-ANDed with `mask`, to `target_register`.
    AssignRandomMasked {
        target_register: DataRegister,
        mask: u8,
    },
    /// `DXYN`: Draw a sprite at the position given by the values
    /// in `position_x_register` and `position_y_register`.
    /// For this `height` bytes of sprite data are read from the address
    /// stored in the special address register `I`.
    ///
    /// [`DataRegister::VF`] is set to `1` if any set pixel was unset, `0` otherwise.
    DrawSprite {
        position_x_register: DataRegister,
        position_y_register: DataRegister,
        height: U4,
    },
    /// `EX9E`: Skip the next instruction if the key corresponding
    /// to the value set in `key_register` is pressed.
    SkipIfKeyPressed { key_register: DataRegister },
    /// `EXA1`: Skip the next instruction if the key corresponding
    /// to the value set in `key_register` is not pressed.
    SkipIfKeyNotPressed { key_register: DataRegister },
    /// `FX07`: Assign the current value of the delay timer to `target_register`.
    AssignDelayTimerVal { target_register: DataRegister },
    /// `FX0A`: Wait until a key is pressed and store the value
    /// corresponding the key in `target_register`.
    WaitForKeyPress { target_register: DataRegister },
    /// `FX15`: Set the value of the delay timer to the value in `source_register`.
    SetDelayTimer { source_register: DataRegister },
    /// `FX18`: Set the value of the sound timer to the value in `source_register`.
    SetSoundTimer { source_register: DataRegister },
    /// `FX1E`: Add the value in `source_register` to the value
    /// in the special address register `I`, wrapping around at 12 bits.
    ///
    /// [`DataRegister::VF`] is not altered.
    AddAssignI { source_register: DataRegister },
    /// `FX29`: Assign the address of the built-in hex char sprite
    /// for the low nibble of the value in `hex_char_register`
    /// to the special address register `I`.
    /// See [`Font`](crate::font::Font).
    AssignHexCharSpriteAddrToI { hex_char_register: DataRegister },
    /// `FX33`: Store the three digit binary-coded decimal equivalent
    /// to the value in `source_register`
    /// in the three consecutive bytes of memory
    /// beginning at the address in the special address register `I`.
    /// The digits are stored in order of significance,
    /// e.g. the digit for hundreds is stored at the address in `I`.
    StoreBCD { source_register: DataRegister },
    /// `FX55`: Store the values from registers [`DataRegister::V0`] to `last_register`
    /// in consecutive bytes of memory
    /// beginning at the address in the special address register `I`.
    ///
    /// `I` itself is left unchanged.
    StoreRegisterValues { last_register: DataRegister },
    /// `FX65`: Load the values of consecutive bytes of memory
    /// beginning at the address in the special address register `I`
    /// into the registers from [`DataRegister::V0`] to `last_register`.
    ///
    /// `I` itself is left unchanged.
    LoadRegisterValues { last_register: DataRegister },
}

impl TryFrom<RawInstruction> for Instruction {
    type Error = UnknownInstructionError;

    fn try_from(raw: RawInstruction) -> Result<Self, Self::Error> {
        use Instruction::*;

        let x = DataRegister::from(raw.x());
        let y = DataRegister::from(raw.y());

        let instruction = match (
            raw.family().into_u8(),
            raw.x().into_u8(),
            raw.y().into_u8(),
            raw.n().into_u8(),
        ) {
            (0x0, 0x0, 0xE, 0x0) => ClearDisplay,
            (0x0, 0x0, 0xE, 0xE) => Return,
            (0x1, _, _, _) => Jump {
                target_address: raw.nnn(),
            },
            (0x2, _, _, _) => CallSubroutine {
                target_address: raw.nnn(),
            },
            (0x3, _, _, _) => SkipIfEqConst {
                register: x,
                constant: raw.kk(),
            },
            (0x4, _, _, _) => SkipIfNeqConst {
                register: x,
                constant: raw.kk(),
            },
            (0x5, _, _, 0x0) => SkipIfEq {
                register1: x,
                register2: y,
            },
            (0x6, _, _, _) => AssignConst {
                target_register: x,
                constant: raw.kk(),
            },
            (0x7, _, _, _) => AddAssignConst {
                target_register: x,
                constant: raw.kk(),
            },
            (0x8, _, _, n) => {
                let (target_register, source_register) = (x, y);
                match n {
                    0x0 => Assign {
                        target_register,
                        source_register,
                    },
                    0x1 => OrAssign {
                        target_register,
                        source_register,
                    },
                    0x2 => AndAssign {
                        target_register,
                        source_register,
                    },
                    0x3 => XorAssign {
                        target_register,
                        source_register,
                    },
                    0x4 => AddAssign {
                        target_register,
                        source_register,
                    },
                    0x5 => SubAssign {
                        target_register,
                        source_register,
                    },
                    0x6 => ShrAssign {
                        target_register,
                        ignored_register: source_register,
                    },
                    0x7 => RevSubAssign {
                        target_register,
                        source_register,
                    },
                    0xE => ShlAssign {
                        target_register,
                        ignored_register: source_register,
                    },
                    _ => return Err(UnknownInstructionError(raw)),
                }
            }
            (0x9, _, _, 0x0) => SkipIfNeq {
                register1: x,
                register2: y,
            },
            (0xA, _, _, _) => AssignAddrToI { address: raw.nnn() },
            (0xB, _, _, _) => JumpOffset { address: raw.nnn() },
            (0xC, _, _, _) => AssignRandomMasked {
                target_register: x,
                mask: raw.kk(),
            },
            (0xD, _, _, _) => DrawSprite {
                position_x_register: x,
                position_y_register: y,
                height: raw.n(),
            },
            (0xE, _, 0x9, 0xE) => SkipIfKeyPressed { key_register: x },
            (0xE, _, 0xA, 0x1) => SkipIfKeyNotPressed { key_register: x },
            (0xF, _, 0x0, 0x7) => AssignDelayTimerVal { target_register: x },
            (0xF, _, 0x0, 0xA) => WaitForKeyPress { target_register: x },
            (0xF, _, 0x1, 0x5) => SetDelayTimer { source_register: x },
            (0xF, _, 0x1, 0x8) => SetSoundTimer { source_register: x },
            (0xF, _, 0x1, 0xE) => AddAssignI { source_register: x },
            (0xF, _, 0x2, 0x9) => AssignHexCharSpriteAddrToI {
                hex_char_register: x,
            },
            (0xF, _, 0x3, 0x3) => StoreBCD { source_register: x },
            (0xF, _, 0x5, 0x5) => StoreRegisterValues { last_register: x },
            (0xF, _, 0x6, 0x5) => LoadRegisterValues { last_register: x },
            _ => return Err(UnknownInstructionError(raw)),
        };

        Ok(instruction)
    }
}

impl TryFrom<[u8; 2]> for Instruction {
    type Error = UnknownInstructionError;

    fn try_from(bytes: [u8; 2]) -> Result<Self, Self::Error> {
        Self::try_from(RawInstruction::from_bytes(bytes))
    }
}

impl From<Instruction> for RawInstruction {
    fn from(instruction: Instruction) -> Self {
        use Instruction::*;

        let xy = |family, x: DataRegister, y: DataRegister, n| {
            RawInstruction::from_nibbles(family, x.into(), y.into(), U4::from_u8_masked(n))
        };
        let fx = |x: DataRegister, kk| RawInstruction::from_x_kk(0xF, x.into(), kk);

        match instruction {
            ClearDisplay => RawInstruction(0x00E0),
            Return => RawInstruction(0x00EE),
            Jump { target_address } => RawInstruction::from_nnn(0x1, target_address),
            CallSubroutine { target_address } => RawInstruction::from_nnn(0x2, target_address),
            SkipIfEqConst { register, constant } => {
                RawInstruction::from_x_kk(0x3, register.into(), constant)
            }
            SkipIfNeqConst { register, constant } => {
                RawInstruction::from_x_kk(0x4, register.into(), constant)
            }
            SkipIfEq {
                register1,
                register2,
            } => xy(0x5, register1, register2, 0x0),
            AssignConst {
                target_register,
                constant,
            } => RawInstruction::from_x_kk(0x6, target_register.into(), constant),
            AddAssignConst {
                target_register,
                constant,
            } => RawInstruction::from_x_kk(0x7, target_register.into(), constant),
            Assign {
                target_register,
                source_register,
            } => xy(0x8, target_register, source_register, 0x0),
            OrAssign {
                target_register,
                source_register,
            } => xy(0x8, target_register, source_register, 0x1),
            AndAssign {
                target_register,
                source_register,
            } => xy(0x8, target_register, source_register, 0x2),
            XorAssign {
                target_register,
                source_register,
            } => xy(0x8, target_register, source_register, 0x3),
            AddAssign {
                target_register,
                source_register,
            } => xy(0x8, target_register, source_register, 0x4),
            SubAssign {
                target_register,
                source_register,
            } => xy(0x8, target_register, source_register, 0x5),
            ShrAssign {
                target_register,
                ignored_register,
            } => xy(0x8, target_register, ignored_register, 0x6),
            RevSubAssign {
                target_register,
                source_register,
            } => xy(0x8, target_register, source_register, 0x7),
            ShlAssign {
                target_register,
                ignored_register,
            } => xy(0x8, target_register, ignored_register, 0xE),
            SkipIfNeq {
                register1,
                register2,
            } => xy(0x9, register1, register2, 0x0),
            AssignAddrToI { address } => RawInstruction::from_nnn(0xA, address),
            JumpOffset { address } => RawInstruction::from_nnn(0xB, address),
            AssignRandomMasked {
                target_register,
                mask,
            } => RawInstruction::from_x_kk(0xC, target_register.into(), mask),
            DrawSprite {
                position_x_register,
                position_y_register,
                height,
            } => RawInstruction::from_nibbles(
                0xD,
                position_x_register.into(),
                position_y_register.into(),
                height,
            ),
            SkipIfKeyPressed { key_register } => {
                RawInstruction::from_x_kk(0xE, key_register.into(), 0x9E)
            }
            SkipIfKeyNotPressed { key_register } => {
                RawInstruction::from_x_kk(0xE, key_register.into(), 0xA1)
            }
            AssignDelayTimerVal { target_register } => fx(target_register, 0x07),
            WaitForKeyPress { target_register } => fx(target_register, 0x0A),
            SetDelayTimer { source_register } => fx(source_register, 0x15),
            SetSoundTimer { source_register } => fx(source_register, 0x18),
            AddAssignI { source_register } => fx(source_register, 0x1E),
            AssignHexCharSpriteAddrToI { hex_char_register } => fx(hex_char_register, 0x29),
            StoreBCD { source_register } => fx(source_register, 0x33),
            StoreRegisterValues { last_register } => fx(last_register, 0x55),
            LoadRegisterValues { last_register } => fx(last_register, 0x65),
        }
    }
}

impl From<Instruction> for [u8; 2] {
    fn from(instruction: Instruction) -> Self {
        RawInstruction::from(instruction).to_bytes()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn raw_instruction_fields() {
        let raw = RawInstruction::from_bytes([0xD1, 0x2F]);

        assert_eq!(raw.family(), U4::try_from(0xD).unwrap());
        assert_eq!(raw.x(), U4::try_from(0x1).unwrap());
        assert_eq!(raw.y(), U4::try_from(0x2).unwrap());
        assert_eq!(raw.n(), U4::try_from(0xF).unwrap());
        assert_eq!(raw.kk(), 0x2F);
        assert_eq!(raw.nnn(), U12::try_from(0x12F).unwrap());
    }

    mod instruction_try_from_u8x2 {
        use super::*;

        #[test]
        fn case_ok() {
            let instr = Instruction::AssignConst {
                target_register: DataRegister::V4,
                constant: 7,
            };

            let instr_bytes = [0x64_u8, 0x07];

            assert_eq!(Instruction::try_from(instr_bytes), Ok(instr));
        }

        #[test]
        fn case_ok_shift_keeps_y() {
            assert_eq!(
                Instruction::try_from([0x8A_u8, 0xB6]),
                Ok(Instruction::ShrAssign {
                    target_register: DataRegister::VA,
                    ignored_register: DataRegister::VB,
                })
            );
        }

        macro_rules! generate_err_test {
            ($($name:ident: $bytes:expr),* $(,)?) => {
                $(
                    #[test]
                    fn $name() {
                        let instr_bytes: [u8; 2] = $bytes;

                        assert_eq!(
                            Instruction::try_from(instr_bytes),
                            Err(UnknownInstructionError(RawInstruction::from_bytes(instr_bytes)))
                        );
                    }
                )*
            };
        }

        generate_err_test! {
            case_err_machine_subroutine: [0x00, 0x00],
            case_err_clear_with_register: [0x01, 0xE0],
            case_err_skip_eq_nonzero_n: [0x51, 0x21],
            case_err_skip_neq_nonzero_n: [0x91, 0x2F],
            case_err_undefined_arithmetic: [0x81, 0x28],
            case_err_undefined_key_skip: [0xE3, 0x9F],
            case_err_undefined_misc: [0xF0, 0xFF],
        }
    }

    #[test]
    fn u8x2_from_instruction() {
        let instr = Instruction::DrawSprite {
            position_x_register: DataRegister::V9,
            position_y_register: DataRegister::V3,
            height: U4::try_from(5).unwrap(),
        };

        let instr_bytes = [0xD9_u8, 0x35];

        assert_eq!(<[u8; 2]>::from(instr), instr_bytes);
    }

    #[test]
    fn every_family_reencodes_to_the_same_bytes() {
        let all_families: [u16; 34] = [
            0x00E0, 0x00EE, 0x1ABC, 0x2ABC, 0x3A12, 0x4A12, 0x5AB0, 0x6A12, 0x7A12, 0x8AB0,
            0x8AB1, 0x8AB2, 0x8AB3, 0x8AB4, 0x8AB5, 0x8AB6, 0x8AB7, 0x8ABE, 0x9AB0, 0xAABC,
            0xBABC, 0xCA12, 0xDAB7, 0xEA9E, 0xEAA1, 0xFA07, 0xFA0A, 0xFA15, 0xFA18, 0xFA1E,
            0xFA29, 0xFA33, 0xFA55, 0xFA65,
        ];

        for &word in all_families.iter() {
            let raw = RawInstruction::from(word);
            let instruction = Instruction::try_from(raw).unwrap();
            assert_eq!(RawInstruction::from(instruction), raw, "{:?}", instruction);
        }
    }
}
