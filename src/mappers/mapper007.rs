//! Mapper 007 (AxROM) implementation
//!
//! One-register 32KB PRG banking with single-screen mirroring selection.
//! Used by games like Battletoads, Marble Madness, Wizards & Warriors, etc.
//!
//! Memory map:
//! - PRG ROM: switchable 32KB bank (0x8000-0xFFFF)
//! - CHR RAM: 8KB
//! - Mirroring: single-screen, page picked by bit 4 of the bank register

use log::debug;

use crate::cartridge::{Mirroring, RomImage};
use crate::mappers::{Mapper, MapperState, CHR_RAM_SIZE};
use crate::tile::{ChrStore, Tile};

/// AxROM switches PRG in 32KB pages
const PRG_PAGE_SIZE: usize = 32 * 1024;

pub struct Mapper007 {
    /// PRG ROM data
    prg_rom: Vec<u8>,

    /// CHR ROM/RAM with decoded tiles
    chr: ChrStore,

    /// Currently selected 32KB PRG page (bits 0-2 of the register)
    prg_bank: u8,

    /// Single-screen page selected by bit 4 of the register
    mirroring: Mirroring,
}

impl Mapper007 {
    /// Create a new Mapper007 instance
    pub fn new(rom: RomImage) -> Self {
        let chr = if rom.chr().is_empty() {
            ChrStore::ram(CHR_RAM_SIZE)
        } else {
            ChrStore::rom(rom.chr().to_vec())
        };

        Mapper007 {
            prg_rom: rom.prg().to_vec(),
            chr,
            prg_bank: 0,
            mirroring: Mirroring::SingleScreenLower,
        }
    }

    fn prg_offset(&self, addr: u16) -> usize {
        let pages = (self.prg_rom.len() / PRG_PAGE_SIZE).max(1);
        let page = self.prg_bank as usize % pages;
        page * PRG_PAGE_SIZE + (addr & 0x7FFF) as usize
    }
}

impl Mapper for Mapper007 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xFFFF => self.prg_rom[self.prg_offset(addr)],
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8, _cycle: u64) {
        if let 0x8000..=0xFFFF = addr {
            self.prg_bank = value & 0x07;
            self.mirroring = if value & 0x10 != 0 {
                Mirroring::SingleScreenUpper
            } else {
                Mirroring::SingleScreenLower
            };
            debug!("AxROM bank select: page {} ({:?})", self.prg_bank, self.mirroring);
        }
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        self.chr.read(addr as usize)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.chr.write(addr as usize, value);
    }

    fn tile(&self, addr: u16) -> &Tile {
        self.chr.tile(addr as usize)
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.mirroring = Mirroring::SingleScreenLower;
    }

    fn save_state(&self) -> MapperState {
        MapperState::Axrom {
            bank: self.prg_bank,
            mirroring: self.mirroring,
        }
    }

    fn load_state(&mut self, state: &MapperState) {
        if let MapperState::Axrom { bank, mirroring } = state {
            self.prg_bank = *bank;
            self.mirroring = *mirroring;
        }
    }

    fn chr_ram(&self) -> Option<&[u8]> {
        if self.chr.is_ram() {
            Some(self.chr.bytes())
        } else {
            None
        }
    }

    fn load_chr_ram(&mut self, data: &[u8]) {
        if self.chr.is_ram() {
            self.chr.load_bytes(data);
        }
    }
}
