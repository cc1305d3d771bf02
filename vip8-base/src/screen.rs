use std::fmt::{Debug, Write};

/// The monochrome 64×32 framebuffer.
///
/// Each row is stored as a `u64`, the most significant bit being column 0.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Screen {
    rows: [u64; Self::HEIGHT],
}

impl Screen {
    /// Screen width in pixels.
    pub const WIDTH: usize = u64::BITS as usize;
    /// Screen height in pixels.
    pub const HEIGHT: usize = 32;

    /// Whether the pixel at column `x`, row `y` is set.
    ///
    /// # Panics
    ///
    /// If `x` or `y` is outside of the screen.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        assert!(x < Self::WIDTH, "column {} is offscreen", x);
        self.rows[y] >> (Self::WIDTH - 1 - x) & 1 == 1
    }

    /// The pixels of row `y`, column 0 in the most significant bit.
    pub fn row(&self, y: usize) -> u64 {
        self.rows[y]
    }

    /// All pixels in row-major order, starting at the top left.
    pub fn pixels(&self) -> impl Iterator<Item = bool> + '_ {
        self.rows
            .iter()
            .flat_map(|&row| (0..Self::WIDTH).rev().map(move |i| row >> i & 1 == 1))
    }

    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|&row| row == 0)
    }

    pub fn clear(&mut self) {
        self.rows = [0; Self::HEIGHT];
    }

    /// XOR `sprite` onto the screen, one byte per row, with its top left corner at `x`, `y`.
    ///
    /// The origin is always reduced modulo the screen size,
    /// `partial_offscreen_drawing` decides what happens to the parts
    /// of the sprite crossing the right or bottom edge.
    ///
    /// Returns `true` if a set pixel has been unset, `false` otherwise.
    pub fn draw_sprite(
        &mut self,
        x: u8,
        y: u8,
        sprite: &[u8],
        partial_offscreen_drawing: PartialOffscreenDrawing,
    ) -> bool {
        let x = u32::from(x) % Self::WIDTH as u32;
        let y = usize::from(y) % Self::HEIGHT;
        let mut set_pixel_unset = false;

        for (i, &sprite_byte) in sprite.iter().enumerate() {
            if y + i >= Self::HEIGHT && !partial_offscreen_drawing.should_wrap_y() {
                break;
            }
            let row = &mut self.rows[(y + i) % Self::HEIGHT];

            let at_column_0 = u64::from(sprite_byte) << (Self::WIDTH - 8);
            let sprite_row = if partial_offscreen_drawing.should_wrap_x() {
                at_column_0.rotate_right(x)
            } else {
                at_column_0 >> x
            };

            set_pixel_unset |= *row & sprite_row != 0;
            *row ^= sprite_row;
        }

        set_pixel_unset
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            rows: [0; Self::HEIGHT],
        }
    }
}

impl Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            writeln!(f, "Screen(")?;
            for &row in self.rows.iter() {
                for i in (0..Self::WIDTH).rev() {
                    f.write_char(if row >> i & 1 == 1 { '#' } else { '_' })?;
                }
                f.write_char('\n')?;
            }
            write!(f, ")")
        } else {
            f.debug_tuple("Screen").field(&self.rows).finish()
        }
    }
}

/// Drawing behavior for sprites that are partially offscreen.
///
/// Sprites that are drawn at coordinates fully offscreen will *always*
/// have the modulo of the screen size applied to their coordinates.
/// The partial offscreen drawing behavior will be applied after this.
/// See also [`Instruction::DrawSprite`](crate::instruction::Instruction::DrawSprite).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialOffscreenDrawing {
    /// Clip offscreen parts of sprites in both X and Y.
    ClipXY,
    /// Clip offscreen parts of sprites in X, wrap in Y.
    ClipXWrapY,
    /// Wrap offscreen parts of sprites in X, clip in Y.
    WrapXClipY,
    /// Wrap offscreen parts of sprites in both X and Y.
    WrapXY,
}

impl Default for PartialOffscreenDrawing {
    fn default() -> Self {
        Self::WrapXY
    }
}

impl PartialOffscreenDrawing {
    pub fn should_wrap_x(self) -> bool {
        matches!(self, Self::WrapXY | Self::WrapXClipY)
    }

    pub fn should_wrap_y(self) -> bool {
        matches!(self, Self::WrapXY | Self::ClipXWrapY)
    }
}
