//! Pre-decoded CHR pattern tiles
//!
//! CHR data stores each 8x8 tile as two 8-byte bitplanes. Decoding those
//! planes per pixel on the render path is wasteful, so every 16-byte tile is
//! decoded once into an 8x8 grid of 2-bit color indices plus a per-row
//! opacity mask. The renderer only ever touches decoded tiles; raw bitplanes
//! are walked when a tile is (re)built.

/// Size of one pattern tile in CHR bytes (two 8-byte bitplanes)
pub const TILE_BYTES: usize = 16;

/// A decoded 8x8 pattern tile
#[derive(Clone, Copy)]
pub struct Tile {
    /// 2-bit color index per pixel, `rows[y][x]`
    rows: [[u8; 8]; 8],

    /// Per-row opacity: true when all 8 pixels of the row are non-zero
    opaque: [bool; 8],
}

impl Tile {
    /// A fully transparent tile
    pub const EMPTY: Tile = Tile {
        rows: [[0; 8]; 8],
        opaque: [false; 8],
    };

    /// Decode a tile from its two bitplanes.
    ///
    /// For row `r`, pixel `c` is bit `7 - c` of `plane0[r]` in the low
    /// position and bit `7 - c` of `plane1[r]` in the high position.
    pub fn decode(plane0: &[u8], plane1: &[u8]) -> Self {
        let mut tile = Tile::EMPTY;

        for r in 0..8 {
            let lo = plane0[r];
            let hi = plane1[r];
            let mut all_opaque = true;

            for c in 0..8 {
                let bit = 7 - c;
                let pixel = ((lo >> bit) & 0x01) | (((hi >> bit) & 0x01) << 1);
                tile.rows[r][c] = pixel;
                all_opaque &= pixel != 0;
            }

            tile.opaque[r] = all_opaque;
        }

        tile
    }

    /// Get one decoded pixel row
    #[inline]
    pub fn row(&self, r: usize) -> &[u8; 8] {
        &self.rows[r]
    }

    /// Whether every pixel of row `r` is non-zero
    #[inline]
    pub fn row_opaque(&self, r: usize) -> bool {
        self.opaque[r]
    }
}

/// CHR storage (ROM or RAM) with its decoded tile cache.
///
/// Mappers resolve banking down to a flat byte offset into this store; the
/// store keeps the raw bytes (CHR RAM stays writable through the PPU bus)
/// and one decoded [`Tile`] per 16-byte pattern. Writing to CHR RAM rebuilds
/// the decoded tile containing the written byte.
pub struct ChrStore {
    data: Vec<u8>,
    tiles: Vec<Tile>,
    writable: bool,
}

impl ChrStore {
    /// Build a read-only store from CHR ROM, decoding every tile up front
    pub fn rom(data: Vec<u8>) -> Self {
        let mut store = ChrStore {
            tiles: vec![Tile::EMPTY; data.len() / TILE_BYTES],
            data,
            writable: false,
        };
        store.decode_all();
        store
    }

    /// Build a zero-filled writable store of `size` bytes (CHR RAM)
    pub fn ram(size: usize) -> Self {
        ChrStore {
            data: vec![0; size],
            tiles: vec![Tile::EMPTY; size / TILE_BYTES],
            writable: true,
        }
    }

    fn decode_all(&mut self) {
        for index in 0..self.tiles.len() {
            self.decode_tile(index);
        }
    }

    fn decode_tile(&mut self, index: usize) {
        let base = index * TILE_BYTES;
        self.tiles[index] = Tile::decode(&self.data[base..base + 8], &self.data[base + 8..base + 16]);
    }

    /// Total CHR size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this store is CHR RAM
    pub fn is_ram(&self) -> bool {
        self.writable
    }

    /// Read one CHR byte at a flat offset
    #[inline]
    pub fn read(&self, offset: usize) -> u8 {
        self.data[offset % self.data.len()]
    }

    /// Write one CHR byte at a flat offset, rebuilding the affected tile.
    /// Writes to CHR ROM are ignored.
    pub fn write(&mut self, offset: usize, value: u8) {
        if !self.writable || self.data.is_empty() {
            return;
        }
        let offset = offset % self.data.len();
        self.data[offset] = value;
        self.decode_tile(offset / TILE_BYTES);
    }

    /// Decoded tile at a flat byte offset (the offset's containing tile)
    #[inline]
    pub fn tile(&self, offset: usize) -> &Tile {
        &self.tiles[(offset % self.data.len()) / TILE_BYTES]
    }

    /// Raw CHR bytes (save-state capture of CHR RAM)
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Replace the CHR contents and rebuild the tile cache
    pub fn load_bytes(&mut self, bytes: &[u8]) {
        let len = self.data.len().min(bytes.len());
        self.data[..len].copy_from_slice(&bytes[..len]);
        self.decode_all();
    }
}
