//! Mapper 066 (GxROM) implementation
//!
//! One-register board switching 32KB PRG and 8KB CHR together.
//! Used by games like Dragon Power and Gumshoe.
//!
//! Memory map:
//! - PRG ROM: switchable 32KB bank, register bits 4-5
//! - CHR ROM: switchable 8KB bank, register bits 0-1

use crate::cartridge::{Mirroring, RomImage, CHR_HEADER_BANK_SIZE};
use crate::mappers::{Mapper, MapperState, CHR_RAM_SIZE};
use crate::tile::{ChrStore, Tile};

/// GxROM switches PRG in 32KB pages
const PRG_PAGE_SIZE: usize = 32 * 1024;

pub struct Mapper066 {
    /// PRG ROM data
    prg_rom: Vec<u8>,

    /// CHR ROM/RAM with decoded tiles
    chr: ChrStore,

    /// Combined bank register
    bank: u8,

    /// Mirroring mode (fixed by the board)
    mirroring: Mirroring,
}

impl Mapper066 {
    /// Create a new Mapper066 instance
    pub fn new(rom: RomImage) -> Self {
        let chr = if rom.chr().is_empty() {
            ChrStore::ram(CHR_RAM_SIZE)
        } else {
            ChrStore::rom(rom.chr().to_vec())
        };

        Mapper066 {
            prg_rom: rom.prg().to_vec(),
            chr,
            bank: 0,
            mirroring: rom.mirror_hint(),
        }
    }

    fn prg_offset(&self, addr: u16) -> usize {
        let pages = (self.prg_rom.len() / PRG_PAGE_SIZE).max(1);
        let page = ((self.bank >> 4) & 0x03) as usize % pages;
        page * PRG_PAGE_SIZE + (addr & 0x7FFF) as usize
    }

    fn chr_offset(&self, addr: u16) -> usize {
        (self.bank & 0x03) as usize * CHR_HEADER_BANK_SIZE + (addr & 0x1FFF) as usize
    }
}

impl Mapper for Mapper066 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xFFFF => self.prg_rom[self.prg_offset(addr)],
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8, _cycle: u64) {
        if let 0x8000..=0xFFFF = addr {
            self.bank = value;
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
        self.bank = 0;
    }

    fn save_state(&self) -> MapperState {
        MapperState::Gxrom { bank: self.bank }
    }

    fn load_state(&mut self, state: &MapperState) {
        if let MapperState::Gxrom { bank } = state {
            self.bank = *bank;
        }
    }
}
