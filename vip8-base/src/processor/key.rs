use num_enum::{IntoPrimitive, TryFromPrimitive, UnsafeFromPrimitive};
use static_assertions::const_assert_eq;

use crate::nibble_ints::U4;

/// A key of the hexadecimal keypad as recognized by the CHIP-8 processor.
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
pub enum Key {
    K0,
    K1,
    K2,
    K3,
    K4,
    K5,
    K6,
    K7,
    K8,
    K9,
    KA,
    KB,
    KC,
    KD,
    KE,
    KF,
}

impl Key {
    /// Number of keys on the keypad.
    pub const COUNT: usize = 16;

    /// All keys in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT as u8).map(|i| Self::from(U4::from_u8_masked(i)))
    }
}

const_assert_eq!(Key::KF as usize + 1, Key::COUNT);
const_assert_eq!(Key::COUNT, U4::MAX.into_u8() as usize + 1);

impl From<Key> for U4 {
    fn from(key: Key) -> Self {
        U4::from_u8_masked(key as u8)
    }
}

impl From<U4> for Key {
    fn from(val: U4) -> Self {
        // SAFETY: Key has exactly U4::MAX + 1 variants.
        unsafe { Key::from_unchecked(u8::from(val)) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    NotPressed,
}

impl Default for KeyState {
    fn default() -> Self {
        Self::NotPressed
    }
}

/// The state of all 16 keys, as last reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Keypad([KeyState; Key::COUNT]);

impl Keypad {
    pub fn get(&self, key: Key) -> KeyState {
        self.0[key as usize]
    }

    pub fn set(&mut self, key: Key, state: KeyState) {
        self.0[key as usize] = state;
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.get(key) == KeyState::Pressed
    }

    /// The lowest key that is pressed now but was not pressed in `earlier`.
    pub fn first_pressed_since(&self, earlier: &Self) -> Option<Key> {
        Key::all().find(|&key| self.is_pressed(key) && !earlier.is_pressed(key))
    }
}
