//! Mapper 034 (BNROM) implementation
//!
//! One-register 32KB PRG banking with CHR RAM.
//! Used by Deadly Towers and a handful of other titles.
//!
//! Memory map:
//! - PRG ROM: switchable 32KB bank (0x8000-0xFFFF)
//! - CHR RAM: 8KB

use crate::cartridge::{Mirroring, RomImage};
use crate::mappers::{Mapper, MapperState, CHR_RAM_SIZE};
use crate::tile::{ChrStore, Tile};

/// BNROM switches PRG in 32KB pages
const PRG_PAGE_SIZE: usize = 32 * 1024;

pub struct Mapper034 {
    /// PRG ROM data
    prg_rom: Vec<u8>,

    /// CHR ROM/RAM with decoded tiles
    chr: ChrStore,

    /// Currently selected 32KB PRG page
    bank: u8,

    /// Mirroring mode (fixed by the board)
    mirroring: Mirroring,
}

impl Mapper034 {
    /// Create a new Mapper034 instance
    pub fn new(rom: RomImage) -> Self {
        let chr = if rom.chr().is_empty() {
            ChrStore::ram(CHR_RAM_SIZE)
        } else {
            ChrStore::rom(rom.chr().to_vec())
        };

        Mapper034 {
            prg_rom: rom.prg().to_vec(),
            chr,
            bank: 0,
            mirroring: rom.mirror_hint(),
        }
    }

    fn prg_offset(&self, addr: u16) -> usize {
        let pages = (self.prg_rom.len() / PRG_PAGE_SIZE).max(1);
        let page = self.bank as usize % pages;
        page * PRG_PAGE_SIZE + (addr & 0x7FFF) as usize
    }
}

impl Mapper for Mapper034 {
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
        self.bank = 0;
    }

    fn save_state(&self) -> MapperState {
        MapperState::Bnrom { bank: self.bank }
    }

    fn load_state(&mut self, state: &MapperState) {
        if let MapperState::Bnrom { bank } = state {
            self.bank = *bank;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::RomImage;

    fn bnrom() -> Mapper034 {
        let mut data = vec![0x4E, 0x45, 0x53, 0x1A, 4, 0, 0x20, 0x20];
        data.extend_from_slice(&[0; 8]);
        for page in 0u8..2 {
            data.extend(std::iter::repeat(page).take(PRG_PAGE_SIZE));
        }
        Mapper034::new(RomImage::parse(&data).unwrap())
    }

    #[test]
    fn register_write_switches_the_prg_page() {
        let mut mapper = bnrom();
        assert_eq!(mapper.cpu_read(0x8000), 0);
        assert_eq!(mapper.cpu_read(0xFFFF), 0);

        mapper.cpu_write(0x8000, 1, 0);
        assert_eq!(mapper.cpu_read(0x8000), 1);
        assert_eq!(mapper.cpu_read(0xFFFF), 1);
    }

    #[test]
    fn page_select_wraps_to_the_rom_size() {
        let mut mapper = bnrom();
        mapper.cpu_write(0x8000, 3, 0); // 2 pages: 3 lands on page 1
        assert_eq!(mapper.cpu_read(0x8000), 1);
    }

    #[test]
    fn chr_ram_tiles_rebuild_on_writes() {
        let mut mapper = bnrom();
        mapper.ppu_write(0x0000, 0x80);
        assert_eq!(mapper.ppu_read(0x0000), 0x80);
        assert_eq!(mapper.tile(0x0000).row(0)[0], 1);
    }
}
