macro_rules! pixel_to_bit {
    (#) => {
        1
    };
    (,) => {
        0
    };
}

macro_rules! sprite_4x5_font {
    (
        $(
            $(
                ($pixel0:tt $pixel1:tt $pixel2:tt $pixel3:tt)
            )*
            ------
        )*
    ) => {
        [
            $(
                $(
                    // Shift pixels into high nibble / left half of the sprite.
                    (pixel_to_bit!($pixel0) << 7
                        | pixel_to_bit!($pixel1) << 6
                        | pixel_to_bit!($pixel2) << 5
                        | pixel_to_bit!($pixel3) << 4),
                )*
            )*
        ]
    };
}

/// A sprite font of all hexadecimal digits, loaded at address `0x000`.
///
/// Every glyph is [`Font::GLYPH_LEN`] bytes long and the glyphs are stored
/// in order, so the glyph for digit `d` starts at `d * Font::GLYPH_LEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    /// The font of the COSMAC VIP interpreter.
    Cosmac,
    /// A rounder font.
    Round,
}

impl Font {
    /// Height of a single glyph in bytes.
    pub const GLYPH_LEN: usize = 5;
    /// Length of the font sprite data in bytes.
    pub const LEN: usize = Self::GLYPH_LEN * (0xF + 1);

    /// Get a reference to the font's sprite data bytes.
    ///
    /// Since a CHIP-8 sprite is always one byte wide,
    /// the low nibble is 0 for all of these character sprites.
    /// The actual symbols are in the high nibble only.
    pub const fn bytes(&self) -> &'static [u8; Self::LEN] {
        match self {
            Self::Cosmac => &SPRITE_4X5_FONT_COSMAC,
            Self::Round => &SPRITE_4X5_FONT_ROUND,
        }
    }
}

impl Default for Font {
    fn default() -> Self {
        Self::Cosmac
    }
}

const SPRITE_4X5_FONT_COSMAC: [u8; Font::LEN] = sprite_4x5_font![
    (####)
    (#,,#)
    (#,,#)
    (#,,#)
    (####)
    ------
    (,,#,)
    (,##,)
    (,,#,)
    (,,#,)
    (,###)
    ------
    (####)
    (,,,#)
    (####)
    (#,,,)
    (####)
    ------
    (####)
    (,,,#)
    (####)
    (,,,#)
    (####)
    ------
    (#,,#)
    (#,,#)
    (####)
    (,,,#)
    (,,,#)
    ------
    (####)
    (#,,,)
    (####)
    (,,,#)
    (####)
    ------
    (####)
    (#,,,)
    (####)
    (#,,#)
    (####)
    ------
    (####)
    (,,,#)
    (,,#,)
    (,#,,)
    (,#,,)
    ------
    (####)
    (#,,#)
    (####)
    (#,,#)
    (####)
    ------
    (####)
    (#,,#)
    (####)
    (,,,#)
    (####)
    ------
    (####)
    (#,,#)
    (####)
    (#,,#)
    (#,,#)
    ------
    (###,)
    (#,,#)
    (###,)
    (#,,#)
    (###,)
    ------
    (####)
    (#,,,)
    (#,,,)
    (#,,,)
    (####)
    ------
    (###,)
    (#,,#)
    (#,,#)
    (#,,#)
    (###,)
    ------
    (####)
    (#,,,)
    (####)
    (#,,,)
    (####)
    ------
    (####)
    (#,,,)
    (####)
    (#,,,)
    (#,,,)
    ------
];

const SPRITE_4X5_FONT_ROUND: [u8; Font::LEN] = sprite_4x5_font![
    (,##,)
    (#,,#)
    (#,,#)
    (#,,#)
    (,##,)
    ------
    (,,#,)
    (,##,)
    (,,#,)
    (,,#,)
    (,###)
    ------
    (###,)
    (,,,#)
    (,,##)
    (,##,)
    (####)
    ------
    (###,)
    (,,,#)
    (,###)
    (,,,#)
    (###,)
    ------
    (#,,#)
    (#,,#)
    (,###)
    (,,,#)
    (,,,#)
    ------
    (####)
    (#,,,)
    (###,)
    (,,,#)
    (###,)
    ------
    (,###)
    (#,,,)
    (###,)
    (#,,#)
    (,##,)
    ------
    (####)
    (,,,#)
    (,,#,)
    (,#,,)
    (,#,,)
    ------
    (,##,)
    (#,,#)
    (,##,)
    (#,,#)
    (,##,)
    ------
    (,##,)
    (#,,#)
    (,###)
    (,,,#)
    (###,)
    ------
    (,##,)
    (#,,#)
    (####)
    (#,,#)
    (#,,#)
    ------
    (###,)
    (#,,#)
    (###,)
    (#,,#)
    (###,)
    ------
    (,##,)
    (#,,#)
    (#,,,)
    (#,,#)
    (,##,)
    ------
    (###,)
    (#,,#)
    (#,,#)
    (#,,#)
    (###,)
    ------
    (,###)
    (#,,,)
    (####)
    (#,,,)
    (,###)
    ------
    (,###)
    (#,,,)
    (####)
    (#,,,)
    (#,,,)
    ------
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cosmac_font_bytes() {
        #[rustfmt::skip]
        let expected: [u8; Font::LEN] = [
            0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
            0x20, 0x60, 0x20, 0x20, 0x70, // 1
            0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
            0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
            0x90, 0x90, 0xF0, 0x10, 0x10, // 4
            0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
            0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
            0xF0, 0x10, 0x20, 0x40, 0x40, // 7
            0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
            0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
            0xF0, 0x90, 0xF0, 0x90, 0x90, // A
            0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
            0xF0, 0x80, 0x80, 0x80, 0xF0, // C
            0xE0, 0x90, 0x90, 0x90, 0xE0, // D
            0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
            0xF0, 0x80, 0xF0, 0x80, 0x80, // F
        ];

        assert_eq!(Font::Cosmac.bytes(), &expected);
    }

    #[test]
    fn glyphs_only_use_high_nibble() {
        for font in [Font::Cosmac, Font::Round].iter() {
            assert!(font.bytes().iter().all(|byte| byte & 0x0F == 0));
        }
    }
}
