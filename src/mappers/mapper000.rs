//! Mapper 000 (NROM) implementation
//!
//! The simplest NES board: no banking at all.
//! Used by games like Super Mario Bros., Donkey Kong, etc.
//!
//! Memory map:
//! - PRG ROM: 16KB mirrored into both halves, or 32KB (0x8000-0xFFFF)
//! - PRG RAM: 8KB (0x6000-0x7FFF, Family Basic boards)
//! - CHR ROM/RAM: 8KB (0x0000-0x1FFF)

use crate::cartridge::{Mirroring, RomImage};
use crate::mappers::{Mapper, MapperState, CHR_RAM_SIZE, PRG_RAM_SIZE};
use crate::tile::{ChrStore, Tile};

pub struct Mapper000 {
    /// PRG ROM data
    prg_rom: Vec<u8>,

    /// PRG RAM data
    prg_ram: Vec<u8>,

    /// CHR ROM/RAM with decoded tiles
    chr: ChrStore,

    /// Mirroring mode (fixed by the board)
    mirroring: Mirroring,
}

impl Mapper000 {
    /// Create a new Mapper000 instance
    pub fn new(rom: RomImage) -> Self {
        let chr = if rom.chr().is_empty() {
            ChrStore::ram(CHR_RAM_SIZE)
        } else {
            ChrStore::rom(rom.chr().to_vec())
        };

        Mapper000 {
            prg_rom: rom.prg().to_vec(),
            prg_ram: vec![0; PRG_RAM_SIZE],
            chr,
            mirroring: rom.mirror_hint(),
        }
    }

    /// Map a CPU address into PRG ROM; a 16KB image appears in both halves
    fn prg_offset(&self, addr: u16) -> usize {
        (addr as usize - 0x8000) % self.prg_rom.len()
    }
}

impl Mapper for Mapper000 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.prg_ram[(addr & 0x1FFF) as usize],
            0x8000..=0xFFFF => self.prg_rom[self.prg_offset(addr)],
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8, _cycle: u64) {
        if let 0x6000..=0x7FFF = addr {
            self.prg_ram[(addr & 0x1FFF) as usize] = value;
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
        // No registers to reset
    }

    fn save_state(&self) -> MapperState {
        MapperState::Nrom
    }

    fn load_state(&mut self, _state: &MapperState) {}

    fn prg_ram(&self) -> Option<&[u8]> {
        Some(&self.prg_ram)
    }

    fn load_prg_ram(&mut self, data: &[u8]) {
        let len = self.prg_ram.len().min(data.len());
        self.prg_ram[..len].copy_from_slice(&data[..len]);
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
