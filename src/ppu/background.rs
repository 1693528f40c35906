//! Background tile pipeline for the PPU
//!
//! The background renderer works two tiles ahead: while pixels stream out
//! of a 16-pixel window (the current tile and the next one), the fetch
//! sequence assembles the tile after that. Every 8 dots the window shifts
//! and the freshly assembled tile becomes the new tail. Pattern data comes
//! from the decoded tile cache, so a fetch is a row copy rather than a
//! bitplane walk.

/// One tile's worth of pipeline output: decoded pixels plus the palette
/// selector from the attribute table
#[derive(Clone, Copy, Default)]
pub struct TileSlice {
    pub pixels: [u8; 8],
    pub palette: u8,
}

/// Background fetch and shift state
#[derive(Default)]
pub struct Background {
    /// Nametable byte latched at the start of the fetch sequence
    pub nt_byte: u8,

    /// Attribute bits latched for the in-flight fetch
    at_bits: u8,

    /// Pattern row being assembled for the in-flight fetch
    row_pixels: [u8; 8],

    /// Pixel window: `current` feeds dots 0-7 past fine-X, `next` the rest
    current: TileSlice,
    next: TileSlice,
}

impl Background {
    pub fn new() -> Self {
        Background::default()
    }

    pub fn reset(&mut self) {
        *self = Background::default();
    }

    /// Latch the attribute bits for the tile being fetched
    pub fn set_attribute(&mut self, bits: u8) {
        self.at_bits = bits;
    }

    /// Latch the decoded pattern row for the tile being fetched
    pub fn set_pattern_row(&mut self, row: &[u8; 8]) {
        self.row_pixels = *row;
    }

    /// Advance the pixel window by one tile, taking in the assembled fetch
    pub fn shift(&mut self) {
        self.current = self.next;
        self.next = TileSlice {
            pixels: self.row_pixels,
            palette: self.at_bits,
        };
    }

    /// Background pixel for dot-in-tile `phase` (0-7) under fine-X scroll.
    /// Returns the 2-bit pixel and its palette selector.
    #[inline]
    pub fn pixel(&self, phase: u16, fine_x: u8) -> (u8, u8) {
        let index = phase as usize + fine_x as usize;
        let slice = if index < 8 { &self.current } else { &self.next };
        (slice.pixels[index % 8], slice.palette)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_shifts_through_fetched_tiles() {
        let mut bg = Background::new();

        bg.set_attribute(1);
        bg.set_pattern_row(&[1; 8]);
        bg.shift(); // next = tile of 1s

        bg.set_attribute(2);
        bg.set_pattern_row(&[2; 8]);
        bg.shift(); // current = 1s, next = 2s

        assert_eq!(bg.pixel(0, 0), (1, 1));
        assert_eq!(bg.pixel(7, 0), (1, 1));

        bg.set_attribute(3);
        bg.set_pattern_row(&[3; 8]);
        bg.shift(); // current = 2s, next = 3s
        assert_eq!(bg.pixel(0, 0), (2, 2));
    }

    #[test]
    fn fine_x_reads_into_the_next_tile() {
        let mut bg = Background::new();
        bg.set_attribute(0);
        bg.set_pattern_row(&[5; 8]);
        bg.shift();
        bg.set_attribute(1);
        bg.set_pattern_row(&[6; 8]);
        bg.shift(); // current = 5s, next = 6s

        // With fine-X 3, phases 5..7 spill into the next tile.
        assert_eq!(bg.pixel(4, 3), (5, 0));
        assert_eq!(bg.pixel(5, 3), (6, 1));
    }
}
