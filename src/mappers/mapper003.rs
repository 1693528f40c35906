//! Mapper 003 (CNROM) implementation
//!
//! One-register CHR banking with fixed PRG ROM.
//! Used by games like Adventure Island, Paperboy, Gradius, etc.
//!
//! Memory map:
//! - PRG ROM: 16KB or 32KB (fixed)
//! - CHR ROM: switchable 8KB bank

use log::debug;

use crate::cartridge::{Mirroring, RomImage, CHR_HEADER_BANK_SIZE};
use crate::mappers::{Mapper, MapperState, CHR_RAM_SIZE};
use crate::tile::{ChrStore, Tile};

pub struct Mapper003 {
    /// PRG ROM data
    prg_rom: Vec<u8>,

    /// CHR ROM/RAM with decoded tiles
    chr: ChrStore,

    /// Currently selected 8KB CHR bank
    chr_bank: u8,

    /// Mirroring mode (fixed by the board)
    mirroring: Mirroring,
}

impl Mapper003 {
    /// Create a new Mapper003 instance
    pub fn new(rom: RomImage) -> Self {
        let chr = if rom.chr().is_empty() {
            ChrStore::ram(CHR_RAM_SIZE)
        } else {
            ChrStore::rom(rom.chr().to_vec())
        };

        Mapper003 {
            prg_rom: rom.prg().to_vec(),
            chr,
            chr_bank: 0,
            mirroring: rom.mirror_hint(),
        }
    }

    fn chr_offset(&self, addr: u16) -> usize {
        self.chr_bank as usize * CHR_HEADER_BANK_SIZE + (addr & 0x1FFF) as usize
    }
}

impl Mapper for Mapper003 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xFFFF => self.prg_rom[(addr as usize - 0x8000) % self.prg_rom.len()],
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8, _cycle: u64) {
        if let 0x8000..=0xFFFF = addr {
            self.chr_bank = value;
            debug!("CNROM CHR bank select: {}", value);
        }
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        self.chr.read(self.chr_offset(addr))
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.chr.write(self.chr_offset(addr), value);
    }

    fn tile(&self, addr: u16) -> &Tile {
        self.chr.tile(self.chr_offset(addr))
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.chr_bank = 0;
    }

    fn save_state(&self) -> MapperState {
        MapperState::Cnrom {
            chr_bank: self.chr_bank,
        }
    }

    fn load_state(&mut self, state: &MapperState) {
        if let MapperState::Cnrom { chr_bank } = state {
            self.chr_bank = *chr_bank;
        }
    }
}
