//! Mapper 002 (UxROM) implementation
//!
//! One-register PRG banking with a fixed last bank.
//! Used by games like Mega Man, DuckTales, Castlevania, etc.
//!
//! Memory map:
//! - PRG ROM: switchable 16KB bank (0x8000-0xBFFF) + fixed last 16KB bank
//! - CHR RAM: 8KB (most UxROM boards carry RAM, not ROM)

use log::debug;

use crate::cartridge::{Mirroring, RomImage, PRG_BANK_SIZE};
use crate::mappers::{Mapper, MapperState, CHR_RAM_SIZE};
use crate::tile::{ChrStore, Tile};

pub struct Mapper002 {
    /// PRG ROM data
    prg_rom: Vec<u8>,

    /// CHR ROM/RAM with decoded tiles
    chr: ChrStore,

    /// Currently selected 16KB bank for 0x8000-0xBFFF
    prg_bank: u8,

    /// Mirroring mode (fixed by the board)
    mirroring: Mirroring,
}

impl Mapper002 {
    /// Create a new Mapper002 instance
    pub fn new(rom: RomImage) -> Self {
        let chr = if rom.chr().is_empty() {
            ChrStore::ram(CHR_RAM_SIZE)
        } else {
            ChrStore::rom(rom.chr().to_vec())
        };

        Mapper002 {
            prg_rom: rom.prg().to_vec(),
            chr,
            prg_bank: 0,
            mirroring: rom.mirror_hint(),
        }
    }

    fn prg_bank_count(&self) -> usize {
        self.prg_rom.len() / PRG_BANK_SIZE
    }

    fn prg_offset(&self, addr: u16) -> usize {
        let bank = match addr {
            0x8000..=0xBFFF => self.prg_bank as usize % self.prg_bank_count(),
            _ => self.prg_bank_count() - 1,
        };
        bank * PRG_BANK_SIZE + (addr & 0x3FFF) as usize
    }
}

impl Mapper for Mapper002 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xFFFF => self.prg_rom[self.prg_offset(addr)],
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8, _cycle: u64) {
        if let 0x8000..=0xFFFF = addr {
            self.prg_bank = value;
            debug!("UxROM PRG bank select: {}", value);
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
    }

    fn save_state(&self) -> MapperState {
        MapperState::Uxrom {
            prg_bank: self.prg_bank,
        }
    }

    fn load_state(&mut self, state: &MapperState) {
        if let MapperState::Uxrom { prg_bank } = state {
            self.prg_bank = *prg_bank;
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
