//! Mapper 004 (MMC3) implementation
//!
//! PRG/CHR banking, configurable mirroring and a scanline IRQ counter.
//! Used by games like Super Mario Bros. 2/3, Mega Man 3-6, Kirby's
//! Adventure, etc.
//!
//! The IRQ counter is clocked by rising edges of PPU address line A12,
//! which the PPU reports for every pattern fetch. A12 stays low across a
//! run of background fetches and goes high during sprite fetches (or vice
//! versa depending on the pattern-table split), so a filtered edge comes
//! around exactly once per rendered scanline.
//!
//! Memory map:
//! - PRG ROM: two switchable 8KB banks + one fixed + one switchable,
//!   arrangement controlled by the PRG mode bit
//! - PRG RAM: 8KB (0x6000-0x7FFF) with enable/write-protect bits
//! - CHR: 2x 2KB + 4x 1KB switchable banks, halves swappable

use log::debug;

use crate::cartridge::{Mirroring, RomImage};
use crate::mappers::{Mapper, MapperState, CHR_RAM_SIZE, PRG_RAM_SIZE};
use crate::tile::{ChrStore, Tile};

/// MMC3 switches PRG in 8KB banks
const PRG_BANK_SIZE_8K: usize = 8 * 1024;

/// MMC3 switches CHR in 1KB banks
const CHR_BANK_SIZE_1K: usize = 1024;

/// Number of consecutive low A12 observations required before a rising
/// edge counts as a new scanline clock
const A12_FILTER_STREAK: u8 = 3;

pub struct Mapper004 {
    /// PRG ROM data
    prg_rom: Vec<u8>,

    /// PRG RAM data
    prg_ram: Vec<u8>,

    /// CHR ROM/RAM with decoded tiles
    chr: ChrStore,

    /// Bank register selected by the next 0x8001 write (0-7)
    bank_select: u8,

    /// PRG bank arrangement (bit 6 of 0x8000)
    prg_mode: u8,

    /// CHR bank arrangement (bit 7 of 0x8000)
    chr_mode: u8,

    /// Bank registers R0-R7
    bank_registers: [u8; 8],

    /// Mirroring mode, set by 0xA000
    mirroring: Mirroring,

    /// Whether the header forced four-screen VRAM (0xA000 is then ignored)
    four_screen: bool,

    /// IRQ counter
    irq_counter: u8,

    /// IRQ counter reload value (0xC000)
    irq_latch: u8,

    /// IRQ enabled flag (0xE001 / 0xE000)
    irq_enabled: bool,

    /// IRQ line state
    irq_pending: bool,

    /// Reload requested by 0xC001
    irq_reload: bool,

    /// PRG RAM enable (bit 0) and write-protect (bit 1), from 0xA001
    prg_ram_protect: [bool; 2],

    /// Consecutive pattern fetches with A12 low
    a12_low_streak: u8,
}

impl Mapper004 {
    /// Create a new Mapper004 instance
    pub fn new(rom: RomImage) -> Self {
        let chr = if rom.chr().is_empty() {
            ChrStore::ram(CHR_RAM_SIZE)
        } else {
            ChrStore::rom(rom.chr().to_vec())
        };

        Mapper004 {
            prg_rom: rom.prg().to_vec(),
            prg_ram: vec![0; PRG_RAM_SIZE],
            chr,
            bank_select: 0,
            prg_mode: 0,
            chr_mode: 0,
            bank_registers: [0; 8],
            mirroring: rom.mirror_hint(),
            four_screen: rom.mirror_hint() == Mirroring::FourScreen,
            irq_counter: 0,
            irq_latch: 0,
            irq_enabled: false,
            irq_pending: false,
            irq_reload: false,
            prg_ram_protect: [true, false],
            a12_low_streak: 0,
        }
    }

    fn prg_bank_count(&self) -> usize {
        self.prg_rom.len() / PRG_BANK_SIZE_8K
    }

    /// Map a CPU address into PRG ROM under the current PRG mode
    fn prg_offset(&self, addr: u16) -> usize {
        let banks = self.prg_bank_count();
        let last = banks - 1;

        let bank = match (addr, self.prg_mode) {
            (0x8000..=0x9FFF, 0) => self.bank_registers[6] as usize % banks,
            (0x8000..=0x9FFF, _) => last - 1,
            (0xA000..=0xBFFF, _) => self.bank_registers[7] as usize % banks,
            (0xC000..=0xDFFF, 0) => last - 1,
            (0xC000..=0xDFFF, _) => self.bank_registers[6] as usize % banks,
            _ => last,
        };

        bank * PRG_BANK_SIZE_8K + (addr & 0x1FFF) as usize
    }

    /// Map a PPU address into CHR under the current CHR mode.
    ///
    /// R0/R1 cover 2KB each (bit 0 ignored), R2-R5 cover 1KB each; bit 7 of
    /// the mode register swaps which half of the pattern space gets which.
    fn chr_offset(&self, addr: u16) -> usize {
        // With the swap bit set, pattern-space halves trade places.
        let addr = if self.chr_mode != 0 { addr ^ 0x1000 } else { addr } & 0x1FFF;

        let bank = match addr {
            0x0000..=0x07FF => (self.bank_registers[0] & 0xFE) as usize + ((addr >> 10) & 1) as usize,
            0x0800..=0x0FFF => (self.bank_registers[1] & 0xFE) as usize + ((addr >> 10) & 1) as usize,
            0x1000..=0x13FF => self.bank_registers[2] as usize,
            0x1400..=0x17FF => self.bank_registers[3] as usize,
            0x1800..=0x1BFF => self.bank_registers[4] as usize,
            _ => self.bank_registers[5] as usize,
        };

        bank * CHR_BANK_SIZE_1K + (addr & 0x03FF) as usize
    }

    /// Clock the IRQ counter on a filtered A12 rising edge
    fn clock_irq_counter(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }

        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
            debug!("MMC3 scanline IRQ fired");
        }
    }
}

impl Mapper for Mapper004 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_protect[0] {
                    self.prg_ram[(addr & 0x1FFF) as usize]
                } else {
                    0
                }
            }
            0x8000..=0xFFFF => self.prg_rom[self.prg_offset(addr) % self.prg_rom.len()],
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8, _cycle: u64) {
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_protect[0] && !self.prg_ram_protect[1] {
                    self.prg_ram[(addr & 0x1FFF) as usize] = value;
                }
            }
            0x8000..=0x9FFF => {
                if addr & 0x01 == 0 {
                    self.bank_select = value & 0x07;
                    self.prg_mode = (value >> 6) & 0x01;
                    self.chr_mode = (value >> 7) & 0x01;
                } else {
                    self.bank_registers[self.bank_select as usize] = value;
                }
            }
            0xA000..=0xBFFF => {
                if addr & 0x01 == 0 {
                    if !self.four_screen {
                        self.mirroring = if value & 0x01 == 0 {
                            Mirroring::Vertical
                        } else {
                            Mirroring::Horizontal
                        };
                    }
                } else {
                    self.prg_ram_protect[0] = value & 0x80 != 0;
                    self.prg_ram_protect[1] = value & 0x40 != 0;
                }
            }
            0xC000..=0xDFFF => {
                if addr & 0x01 == 0 {
                    self.irq_latch = value;
                } else {
                    self.irq_reload = true;
                }
            }
            0xE000..=0xFFFF => {
                if addr & 0x01 == 0 {
                    self.irq_enabled = false;
                    self.irq_pending = false;
                } else {
                    self.irq_enabled = true;
                }
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
        self.bank_select = 0;
        self.prg_mode = 0;
        self.chr_mode = 0;
        self.bank_registers = [0; 8];
        self.irq_counter = 0;
        self.irq_latch = 0;
        self.irq_enabled = false;
        self.irq_pending = false;
        self.irq_reload = false;
        self.prg_ram_protect = [true, false];
        self.a12_low_streak = 0;
    }

    fn irq_triggered(&self) -> bool {
        self.irq_pending
    }

    fn acknowledge_irq(&mut self) {
        self.irq_pending = false;
    }

    fn has_scanline_irq(&self) -> bool {
        true
    }

    fn notify_a12(&mut self, bit: bool) {
        if bit {
            if self.a12_low_streak >= A12_FILTER_STREAK {
                self.clock_irq_counter();
            }
            self.a12_low_streak = 0;
        } else {
            self.a12_low_streak = self.a12_low_streak.saturating_add(1);
        }
    }

    fn save_state(&self) -> MapperState {
        MapperState::Mmc3 {
            bank_select: self.bank_select,
            bank_registers: self.bank_registers,
            prg_mode: self.prg_mode,
            chr_mode: self.chr_mode,
            mirroring: self.mirroring,
            irq_counter: self.irq_counter,
            irq_latch: self.irq_latch,
            irq_enabled: self.irq_enabled,
            irq_pending: self.irq_pending,
            irq_reload: self.irq_reload,
            prg_ram_protect: self.prg_ram_protect,
            a12_low_streak: self.a12_low_streak,
        }
    }

    fn load_state(&mut self, state: &MapperState) {
        if let MapperState::Mmc3 {
            bank_select,
            bank_registers,
            prg_mode,
            chr_mode,
            mirroring,
            irq_counter,
            irq_latch,
            irq_enabled,
            irq_pending,
            irq_reload,
            prg_ram_protect,
            a12_low_streak,
        } = state
        {
            self.bank_select = *bank_select;
            self.bank_registers = *bank_registers;
            self.prg_mode = *prg_mode;
            self.chr_mode = *chr_mode;
            self.mirroring = *mirroring;
            self.irq_counter = *irq_counter;
            self.irq_latch = *irq_latch;
            self.irq_enabled = *irq_enabled;
            self.irq_pending = *irq_pending;
            self.irq_reload = *irq_reload;
            self.prg_ram_protect = *prg_ram_protect;
            self.a12_low_streak = *a12_low_streak;
        }
    }

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
