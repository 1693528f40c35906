//! Mapper 009 (MMC2) implementation
//!
//! PRG banking plus the MMC2's signature CHR latches. Used by Mike Tyson's
//! Punch-Out!!.
//!
//! Each 4KB half of the pattern space has two bank registers and a latch
//! remembering whether tile 0xFD or 0xFE was fetched there last. The PPU
//! reports every pattern fetch address; fetching one of the magic tiles
//! flips the latch *after* the tile's own data has been read, so the
//! switching tile itself still renders from the old bank. Games draw tile
//! 0xFD or 0xFE somewhere on screen to swap graphics mid-frame without CPU
//! involvement.
//!
//! Memory map:
//! - PRG ROM: switchable 8KB bank (0x8000-0x9FFF) + last three banks fixed
//! - CHR ROM: two 4KB windows, each latched between two banks
//! - Mirroring: H/V via 0xF000

use crate::cartridge::{Mirroring, RomImage};
use crate::mappers::{Mapper, MapperState, CHR_RAM_SIZE};
use crate::tile::{ChrStore, Tile};

/// MMC2 switches PRG in 8KB banks
const PRG_BANK_SIZE_8K: usize = 8 * 1024;

/// CHR banks are 4KB
const CHR_BANK_SIZE_4K: usize = 4 * 1024;

pub struct Mapper009 {
    /// PRG ROM data
    prg_rom: Vec<u8>,

    /// CHR ROM with decoded tiles
    chr: ChrStore,

    /// Switchable 8KB PRG bank for 0x8000-0x9FFF
    prg_bank: u8,

    /// 4KB CHR banks used while the latch holds 0xFD, per pattern half
    chr_fd: [u8; 2],

    /// 4KB CHR banks used while the latch holds 0xFE, per pattern half
    chr_fe: [u8; 2],

    /// Latch state per pattern half: true once tile 0xFE was fetched there
    latch_fe: [bool; 2],

    /// Mirroring mode, set by 0xF000
    mirroring: Mirroring,
}

impl Mapper009 {
    /// Create a new Mapper009 instance
    pub fn new(rom: RomImage) -> Self {
        let chr = if rom.chr().is_empty() {
            ChrStore::ram(CHR_RAM_SIZE)
        } else {
            ChrStore::rom(rom.chr().to_vec())
        };

        Mapper009 {
            prg_rom: rom.prg().to_vec(),
            chr,
            prg_bank: 0,
            chr_fd: [0; 2],
            chr_fe: [0; 2],
            // Power-on: left half on the 0xFD bank, right half on 0xFE
            latch_fe: [false, true],
            mirroring: rom.mirror_hint(),
        }
    }

    fn prg_bank_count(&self) -> usize {
        self.prg_rom.len() / PRG_BANK_SIZE_8K
    }

    fn prg_offset(&self, addr: u16) -> usize {
        let banks = self.prg_bank_count();
        let bank = match addr {
            0x8000..=0x9FFF => self.prg_bank as usize % banks,
            0xA000..=0xBFFF => banks - 3,
            0xC000..=0xDFFF => banks - 2,
            _ => banks - 1,
        };
        bank * PRG_BANK_SIZE_8K + (addr & 0x1FFF) as usize
    }

    fn chr_offset(&self, addr: u16) -> usize {
        let half = ((addr >> 12) & 0x01) as usize;
        let bank = if self.latch_fe[half] {
            self.chr_fe[half]
        } else {
            self.chr_fd[half]
        };
        bank as usize * CHR_BANK_SIZE_4K + (addr & 0x0FFF) as usize
    }
}

impl Mapper for Mapper009 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xFFFF => self.prg_rom[self.prg_offset(addr)],
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8, _cycle: u64) {
        match addr {
            0xA000..=0xAFFF => self.prg_bank = value & 0x0F,
            0xB000..=0xBFFF => self.chr_fd[0] = value & 0x1F,
            0xC000..=0xCFFF => self.chr_fe[0] = value & 0x1F,
            0xD000..=0xDFFF => self.chr_fd[1] = value & 0x1F,
            0xE000..=0xEFFF => self.chr_fe[1] = value & 0x1F,
            0xF000..=0xFFFF => {
                self.mirroring = if value & 0x01 == 0 {
                    Mirroring::Vertical
                } else {
                    Mirroring::Horizontal
                };
            }
            _ => {}
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
        self.prg_bank = 0;
        self.chr_fd = [0; 2];
        self.chr_fe = [0; 2];
        self.latch_fe = [false, true];
    }

    fn has_chr_latch(&self) -> bool {
        true
    }

    fn latch_access(&mut self, addr: u16) {
        // The magic tiles sit at pattern offsets 0xFD0 and 0xFE0 in either
        // half; both bitplane fetches of a row land inside the same 16-byte
        // window.
        match addr & 0x1FF0 {
            0x0FD0 => self.latch_fe[0] = false,
            0x0FE0 => self.latch_fe[0] = true,
            0x1FD0 => self.latch_fe[1] = false,
            0x1FE0 => self.latch_fe[1] = true,
            _ => {}
        }
    }

    fn save_state(&self) -> MapperState {
        MapperState::Mmc2 {
            prg_bank: self.prg_bank,
            chr_fd: self.chr_fd,
            chr_fe: self.chr_fe,
            latch_fe: self.latch_fe,
            mirroring: self.mirroring,
        }
    }

    fn load_state(&mut self, state: &MapperState) {
        if let MapperState::Mmc2 {
            prg_bank,
            chr_fd,
            chr_fe,
            latch_fe,
            mirroring,
        } = state
        {
            self.prg_bank = *prg_bank;
            self.chr_fd = *chr_fd;
            self.chr_fe = *chr_fe;
            self.latch_fe = *latch_fe;
            self.mirroring = *mirroring;
        }
    }
}
