//! NES cartridge implementation
//!
//! This module parses the iNES container format and fronts the cartridge
//! hardware: PRG ROM banks, CHR ROM/RAM, the battery flag and the mapper
//! that remaps everything at run time. The parsed [`RomImage`] is immutable;
//! the [`Cartridge`] owns the mapper built from it.

use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mappers::{create_mapper, Mapper, MapperState};
use crate::tile::Tile;
use crate::util::fnv1a_32;

/// Size of the iNES header
const INES_HEADER_SIZE: usize = 16;

/// iNES magic: "NES" followed by an MS-DOS EOF
const INES_MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

/// Size of a PRG ROM bank as counted by the header (16KB)
pub const PRG_BANK_SIZE: usize = 16 * 1024;

/// Size of a CHR bank as counted by the header (8KB)
pub const CHR_HEADER_BANK_SIZE: usize = 8 * 1024;

/// Size of a CHR bank as exposed to mappers (4KB)
pub const CHR_BANK_SIZE: usize = 4 * 1024;

/// Errors that can occur when parsing ROM files
#[derive(Error, Debug)]
pub enum RomError {
    #[error("Invalid iNES magic number")]
    InvalidMagic,

    #[error("ROM file is shorter than its header declares")]
    Truncated,

    #[error("Unsupported mapper: {0}")]
    UnsupportedMapper(u8),
}

/// Mirroring modes for the NES nametables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirroring {
    /// Horizontal mirroring (vertical arrangement of nametables)
    Horizontal,

    /// Vertical mirroring (horizontal arrangement of nametables)
    Vertical,

    /// Four-screen mirroring (no mirroring)
    FourScreen,

    /// Single-screen mirroring, lower bank
    SingleScreenLower,

    /// Single-screen mirroring, upper bank
    SingleScreenUpper,
}

/// A parsed iNES ROM image, immutable after load
pub struct RomImage {
    /// PRG ROM, a whole number of 16KB banks
    prg: Vec<u8>,

    /// CHR ROM, a whole number of 4KB banks; empty means the board carries
    /// CHR RAM instead
    chr: Vec<u8>,

    /// Nametable layout hint from the header
    mirror_hint: Mirroring,

    /// iNES mapper number
    mapper_number: u8,

    /// Whether battery-backed PRG RAM is present
    battery: bool,
}

impl RomImage {
    /// Parse an iNES image from raw bytes.
    ///
    /// A 512-byte trainer, when flagged, is skipped. If header bytes 8..16
    /// are not all zero the high mapper nibble is discarded; dumps touched
    /// by old tools fill that area with garbage that would otherwise select
    /// a bogus mapper.
    pub fn parse(data: &[u8]) -> Result<Self, RomError> {
        if data.len() < INES_HEADER_SIZE {
            return Err(RomError::Truncated);
        }
        if data[0..4] != INES_MAGIC {
            return Err(RomError::InvalidMagic);
        }

        let prg_size = data[4] as usize * PRG_BANK_SIZE;
        let chr_size = data[5] as usize * CHR_HEADER_BANK_SIZE;

        // A header declaring no PRG at all contradicts itself; there is
        // nothing for the CPU to execute.
        if prg_size == 0 {
            return Err(RomError::Truncated);
        }

        let flags6 = data[6];
        let flags7 = data[7];

        let mirror_hint = if (flags6 & 0x08) != 0 {
            Mirroring::FourScreen
        } else if (flags6 & 0x01) != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let battery = (flags6 & 0x02) != 0;
        let has_trainer = (flags6 & 0x04) != 0;

        let mapper_low = flags6 >> 4;
        let mapper_number = if data[8..16].iter().any(|&b| b != 0) {
            mapper_low
        } else {
            (flags7 & 0xF0) | mapper_low
        };

        let trainer_size = if has_trainer { 512 } else { 0 };
        let prg_start = INES_HEADER_SIZE + trainer_size;
        let chr_start = prg_start + prg_size;

        if data.len() < chr_start + chr_size {
            return Err(RomError::Truncated);
        }

        Ok(RomImage {
            prg: data[prg_start..prg_start + prg_size].to_vec(),
            chr: data[chr_start..chr_start + chr_size].to_vec(),
            mirror_hint,
            mapper_number,
            battery,
        })
    }

    /// Number of 16KB PRG banks
    pub fn prg_banks(&self) -> usize {
        self.prg.len() / PRG_BANK_SIZE
    }

    /// Number of 4KB CHR banks (double the header's 8KB count)
    pub fn chr_banks(&self) -> usize {
        self.chr.len() / CHR_BANK_SIZE
    }

    /// PRG ROM bytes
    pub fn prg(&self) -> &[u8] {
        &self.prg
    }

    /// CHR ROM bytes (empty when the board uses CHR RAM)
    pub fn chr(&self) -> &[u8] {
        &self.chr
    }

    pub fn mirror_hint(&self) -> Mirroring {
        self.mirror_hint
    }

    pub fn mapper_number(&self) -> u8 {
        self.mapper_number
    }

    pub fn battery(&self) -> bool {
        self.battery
    }

    /// Rebuild an iNES byte stream from the parsed image (trainer excluded)
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(INES_HEADER_SIZE + self.prg.len() + self.chr.len());
        out.extend_from_slice(&INES_MAGIC);
        out.push((self.prg.len() / PRG_BANK_SIZE) as u8);
        out.push((self.chr.len() / CHR_HEADER_BANK_SIZE) as u8);

        let mut flags6 = (self.mapper_number & 0x0F) << 4;
        match self.mirror_hint {
            Mirroring::Vertical => flags6 |= 0x01,
            Mirroring::FourScreen => flags6 |= 0x08,
            _ => {}
        }
        if self.battery {
            flags6 |= 0x02;
        }
        out.push(flags6);
        out.push(self.mapper_number & 0xF0);
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&self.prg);
        out.extend_from_slice(&self.chr);
        out
    }

    /// 32-bit fingerprint of the first 1KB of PRG ROM, stored in save
    /// states to catch restoring against the wrong game
    pub fn fingerprint(&self) -> u32 {
        let end = self.prg.len().min(1024);
        fnv1a_32(&self.prg[..end])
    }
}

/// An inserted cartridge: the mapper plus the identity bits the rest of the
/// console needs (mapper number, battery flag, ROM fingerprint)
pub struct Cartridge {
    mapper: Box<dyn Mapper>,
    mapper_number: u8,
    battery: bool,
    fingerprint: u32,
}

impl Cartridge {
    /// Build a cartridge from iNES bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, RomError> {
        let rom = RomImage::parse(data)?;
        let fingerprint = rom.fingerprint();
        let mapper_number = rom.mapper_number();
        let battery = rom.battery();

        info!(
            "Loaded cartridge - Mapper: {}, PRG ROM: {}KB, CHR {}: {}KB, Mirroring: {:?}, Battery: {}",
            mapper_number,
            rom.prg().len() / 1024,
            if rom.chr().is_empty() { "RAM" } else { "ROM" },
            if rom.chr().is_empty() { 8 } else { rom.chr().len() / 1024 },
            rom.mirror_hint(),
            battery,
        );

        let mapper = create_mapper(rom)?;

        Ok(Cartridge {
            mapper,
            mapper_number,
            battery,
            fingerprint,
        })
    }

    /// Read a byte from the cartridge (CPU space, 0x4020-0xFFFF)
    pub fn read(&mut self, addr: u16) -> u8 {
        self.mapper.cpu_read(addr)
    }

    /// Write a byte to the cartridge (CPU space, 0x4020-0xFFFF). The CPU
    /// cycle stamp lets serial-port mappers reject back-to-back writes.
    pub fn write(&mut self, addr: u16, value: u8, cycle: u64) {
        self.mapper.cpu_write(addr, value, cycle);
    }

    /// Read a byte from pattern-table space (PPU 0x0000-0x1FFF)
    pub fn read_chr(&self, addr: u16) -> u8 {
        self.mapper.ppu_read(addr)
    }

    /// Write a byte to pattern-table space; only CHR RAM boards accept it
    pub fn write_chr(&mut self, addr: u16, value: u8) {
        self.mapper.ppu_write(addr, value);
    }

    /// Decoded tile containing `addr` under the current CHR banking
    pub fn tile(&self, addr: u16) -> &Tile {
        self.mapper.tile(addr)
    }

    /// Current nametable layout (mappers may override the header hint)
    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    pub fn irq_triggered(&self) -> bool {
        self.mapper.irq_triggered()
    }

    pub fn acknowledge_irq(&mut self) {
        self.mapper.acknowledge_irq();
    }

    pub fn has_chr_latch(&self) -> bool {
        self.mapper.has_chr_latch()
    }

    pub fn latch_access(&mut self, addr: u16) {
        self.mapper.latch_access(addr);
    }

    pub fn has_scanline_irq(&self) -> bool {
        self.mapper.has_scanline_irq()
    }

    pub fn notify_a12(&mut self, bit: bool) {
        self.mapper.notify_a12(bit);
    }

    pub fn has_ppu_a13_chr_switch(&self) -> bool {
        self.mapper.has_ppu_a13_chr_switch()
    }

    pub fn notify_ppu_a13(&mut self, bit: bool) {
        self.mapper.notify_ppu_a13(bit);
    }

    pub fn has_nametable_override(&self) -> bool {
        self.mapper.has_nametable_override()
    }

    pub fn read_nametable(&mut self, addr: u16) -> u8 {
        self.mapper.read_nametable(addr)
    }

    pub fn write_nametable(&mut self, addr: u16, value: u8) {
        self.mapper.write_nametable(addr, value);
    }

    pub fn has_ppu_address_hook(&self) -> bool {
        self.mapper.has_ppu_address_hook()
    }

    pub fn ppu_address_update(&mut self, addr: u16) {
        self.mapper.ppu_address_update(addr);
    }

    pub fn has_ppu_scanline_hook(&self) -> bool {
        self.mapper.has_ppu_scanline_hook()
    }

    pub fn on_scanline(&mut self, scanline: u16, rendering: bool) {
        self.mapper.on_scanline(scanline, rendering);
    }

    /// Reset the mapper to its power-on register state
    pub fn reset(&mut self) {
        self.mapper.reset();
    }

    pub fn mapper_number(&self) -> u8 {
        self.mapper_number
    }

    /// Fingerprint of the loaded ROM (first 1KB of PRG)
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    /// Capture mapper-specific state for a save state
    pub fn save_state(&self) -> MapperState {
        self.mapper.save_state()
    }

    /// Restore mapper-specific state from a save state
    pub fn load_state(&mut self, state: &MapperState) {
        self.mapper.load_state(state);
    }

    /// PRG RAM contents, if the board has any
    pub fn prg_ram(&self) -> Option<&[u8]> {
        self.mapper.prg_ram()
    }

    pub fn load_prg_ram(&mut self, data: &[u8]) {
        self.mapper.load_prg_ram(data);
    }

    /// CHR RAM contents, if the board uses CHR RAM
    pub fn chr_ram(&self) -> Option<&[u8]> {
        self.mapper.chr_ram()
    }

    pub fn load_chr_ram(&mut self, data: &[u8]) {
        self.mapper.load_chr_ram(data);
    }

    /// Battery-backed PRG RAM contents, for persisting between sessions
    pub fn save_ram(&self) -> Option<Vec<u8>> {
        if self.battery {
            self.mapper.prg_ram().map(|ram| ram.to_vec())
        } else {
            None
        }
    }

    /// Load battery-backed PRG RAM saved by a previous session
    pub fn load_ram(&mut self, data: &[u8]) {
        if self.battery {
            self.mapper.load_prg_ram(data);
        }
    }
}

impl fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cartridge")
            .field("mapper", &self.mapper_number)
            .field("mirroring", &self.mirroring())
            .field("battery", &self.battery)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ines(prg_banks: u8, chr_banks: u8, flags6: u8, flags7: u8) -> Vec<u8> {
        let mut data = vec![0x4E, 0x45, 0x53, 0x1A, prg_banks, chr_banks, flags6, flags7];
        data.extend_from_slice(&[0; 8]);
        data.extend(std::iter::repeat(0xEA).take(prg_banks as usize * PRG_BANK_SIZE));
        data.extend(std::iter::repeat(0x55).take(chr_banks as usize * CHR_HEADER_BANK_SIZE));
        data
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = ines(1, 1, 0, 0);
        data[0] = b'X';
        assert!(matches!(RomImage::parse(&data), Err(RomError::InvalidMagic)));
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut data = ines(2, 1, 0, 0);
        data.truncate(data.len() - 1);
        assert!(matches!(RomImage::parse(&data), Err(RomError::Truncated)));
    }

    #[test]
    fn parses_header_fields() {
        let data = ines(2, 1, 0x03, 0x40);
        let rom = RomImage::parse(&data).unwrap();
        assert_eq!(rom.prg_banks(), 2);
        assert_eq!(rom.chr_banks(), 2); // one 8KB bank exposed as two 4KB banks
        assert_eq!(rom.mirror_hint(), Mirroring::Vertical);
        assert!(rom.battery());
        assert_eq!(rom.mapper_number(), 0x40);
    }

    #[test]
    fn dirty_header_discards_high_mapper_nibble() {
        let mut data = ines(1, 1, 0x10, 0xF0);
        data[12] = b'D'; // leftover tool signature in bytes 8..16
        let rom = RomImage::parse(&data).unwrap();
        assert_eq!(rom.mapper_number(), 1);
    }

    #[test]
    fn serialize_round_trips_header_and_payload() {
        let data = ines(2, 1, 0x01, 0x00);
        let rom = RomImage::parse(&data).unwrap();
        assert_eq!(rom.serialize(), data);
    }

    #[test]
    fn fingerprint_covers_first_kilobyte() {
        let data = ines(1, 0, 0, 0);
        let rom = RomImage::parse(&data).unwrap();
        assert_eq!(rom.fingerprint(), fnv1a_32(&rom.prg()[..1024]));

        let mut altered = data.clone();
        altered[16] ^= 0xFF;
        let other = RomImage::parse(&altered).unwrap();
        assert_ne!(rom.fingerprint(), other.fingerprint());
    }
}
