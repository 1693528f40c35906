//! Mapper 005 (MMC5) implementation
//!
//! The most capable licensed board: flexible PRG/CHR banking, 1KB of
//! on-cartridge ExRAM with four operating modes, per-nametable mapping with
//! a fill mode, separate CHR bank sets for sprites and background, a
//! scanline IRQ and an 8x8 hardware multiplier. Used by Castlevania III,
//! Just Breed, Uchuu Keibitai SDF, etc.
//!
//! Register map (CPU):
//! - 0x5100/0x5101: PRG mode 0-3 / CHR mode 0-3
//! - 0x5102/0x5103: PRG RAM write-protect keys (write needs 2 then 1)
//! - 0x5104: ExRAM mode; 0x5105: nametable mapping; 0x5106/0x5107: fill
//!   tile and fill attribute
//! - 0x5113-0x5117: PRG bank registers (bit 7 picks ROM over RAM)
//! - 0x5120-0x5127: CHR sprite set; 0x5128-0x512B: CHR background set;
//!   0x5130: CHR upper bank bits
//! - 0x5200-0x5202: vertical split (latched only)
//! - 0x5203/0x5204: IRQ target scanline / IRQ status+enable
//! - 0x5205/0x5206: multiplier factors, product reads back low/high
//! - 0x5C00-0x5FFF: ExRAM window

use log::debug;

use crate::cartridge::{Mirroring, RomImage};
use crate::mappers::{Mapper, MapperState};
use crate::tile::{ChrStore, Tile};

/// MMC5 PRG banking granularity (8KB)
const PRG_BANK_SIZE_8K: usize = 8 * 1024;

/// MMC5 boards carry large work RAM; 64KB covers every PRG RAM page the
/// bank registers can address
const MMC5_PRG_RAM_SIZE: usize = 64 * 1024;

/// On-die extended RAM
const EXRAM_SIZE: usize = 1024;

/// Console-internal nametable RAM, owned here because the nametable
/// override capability routes every nametable access through the mapper
const CIRAM_SIZE: usize = 2048;

pub struct Mapper005 {
    /// PRG ROM data
    prg_rom: Vec<u8>,

    /// PRG RAM data, addressed in 8KB pages
    prg_ram: Vec<u8>,

    /// CHR ROM/RAM with decoded tiles
    chr: ChrStore,

    /// 1KB ExRAM (0x5C00-0x5FFF, also mappable as a nametable)
    exram: Vec<u8>,

    /// Console nametable RAM, routed through the mapper by 0x5105
    ciram: Vec<u8>,

    /// PRG mode 0-3 (0x5100): 32K / 16+16 / 16+8+8 / 8x4
    prg_mode: u8,

    /// CHR mode 0-3 (0x5101): 8K / 4Kx2 / 2Kx4 / 1Kx8
    chr_mode: u8,

    /// PRG RAM protect keys (0x5102/0x5103)
    ram_protect: [u8; 2],

    /// ExRAM mode 0-3 (0x5104)
    exram_mode: u8,

    /// Nametable mapping, two bits per nametable (0x5105)
    nt_mapping: u8,

    /// Fill-mode tile (0x5106) and attribute (0x5107)
    fill_tile: u8,
    fill_attr: u8,

    /// PRG bank registers 0x5113-0x5117
    prg_banks: [u8; 5],

    /// CHR sprite bank set 0x5120-0x5127
    chr_sprite_banks: [u8; 8],

    /// CHR background bank set 0x5128-0x512B
    chr_bg_banks: [u8; 4],

    /// Upper CHR bank bits (0x5130)
    chr_upper_bits: u8,

    /// Vertical split registers 0x5200-0x5202, latched but not rendered
    split_regs: [u8; 3],

    /// IRQ target scanline (0x5203)
    irq_target: u8,

    /// IRQ enable (bit 7 of 0x5204 writes)
    irq_enabled: bool,

    /// IRQ pending latch, cleared by reading 0x5204
    irq_pending: bool,

    /// Whether the PPU is inside a rendered frame
    in_frame: bool,

    /// Whether the current fetches belong to sprites (drives CHR set choice)
    sprite_fetch_phase: bool,

    /// ExRAM byte of the last background nametable fetch (extended
    /// attribute mode)
    exattr_byte: u8,

    /// Multiplier factors (0x5205/0x5206)
    multiplier: [u8; 2],
}

impl Mapper005 {
    /// Create a new Mapper005 instance
    pub fn new(rom: RomImage) -> Self {
        let chr = if rom.chr().is_empty() {
            ChrStore::ram(8 * 1024)
        } else {
            ChrStore::rom(rom.chr().to_vec())
        };

        let prg_8k_banks = (rom.prg().len() / PRG_BANK_SIZE_8K).max(1);

        Mapper005 {
            prg_rom: rom.prg().to_vec(),
            prg_ram: vec![0; MMC5_PRG_RAM_SIZE],
            chr,
            exram: vec![0; EXRAM_SIZE],
            ciram: vec![0; CIRAM_SIZE],
            prg_mode: 3,
            chr_mode: 3,
            ram_protect: [0; 2],
            exram_mode: 0,
            nt_mapping: 0,
            fill_tile: 0,
            fill_attr: 0,
            prg_banks: [0, 0, 1, 2, (prg_8k_banks - 1) as u8 | 0x80],
            chr_sprite_banks: [0; 8],
            chr_bg_banks: [0; 4],
            chr_upper_bits: 0,
            split_regs: [0; 3],
            irq_target: 0,
            irq_enabled: false,
            irq_pending: false,
            in_frame: false,
            sprite_fetch_phase: true,
            exattr_byte: 0,
            multiplier: [0xFF, 0xFF],
        }
    }

    fn prg_bank_count(&self) -> usize {
        (self.prg_rom.len() / PRG_BANK_SIZE_8K).max(1)
    }

    fn prg_ram_writable(&self) -> bool {
        self.ram_protect[0] & 0x03 == 0x02 && self.ram_protect[1] & 0x03 == 0x01
    }

    /// Read PRG ROM through a register-selected window. `window_8k` is the
    /// window size in 8KB units (1, 2 or 4); the low window bits come from
    /// the CPU address.
    fn read_prg_rom(&self, addr: u16, reg: u8, window_8k: usize) -> u8 {
        let reg = (reg & 0x7F) as usize;
        let within = ((addr as usize) >> 13) & (window_8k - 1);
        let bank = ((reg & !(window_8k - 1)) | within) % self.prg_bank_count();
        self.prg_rom[bank * PRG_BANK_SIZE_8K + (addr & 0x1FFF) as usize]
    }

    /// PRG RAM access through an 8KB page register
    fn prg_ram_index(&self, addr: u16, reg: u8) -> usize {
        let page = (reg & 0x07) as usize;
        (page * PRG_BANK_SIZE_8K + (addr & 0x1FFF) as usize) % self.prg_ram.len()
    }

    /// Resolve the register and window size serving a 0x8000-0xFFFF read
    fn prg_window(&self, addr: u16) -> (u8, usize) {
        match self.prg_mode & 0x03 {
            0 => (self.prg_banks[4], 4),
            1 => {
                if addr < 0xC000 {
                    (self.prg_banks[2], 2)
                } else {
                    (self.prg_banks[4], 2)
                }
            }
            2 => {
                if addr < 0xC000 {
                    (self.prg_banks[2], 2)
                } else if addr < 0xE000 {
                    (self.prg_banks[3], 1)
                } else {
                    (self.prg_banks[4], 1)
                }
            }
            _ => {
                let reg = match addr {
                    0x8000..=0x9FFF => self.prg_banks[1],
                    0xA000..=0xBFFF => self.prg_banks[2],
                    0xC000..=0xDFFF => self.prg_banks[3],
                    _ => self.prg_banks[4],
                };
                (reg, 1)
            }
        }
    }

    /// The 0xE000 window and mode-0 space are always ROM; everything else
    /// honors bit 7 of its bank register (set = ROM, clear = RAM)
    fn window_is_rom(&self, addr: u16, reg: u8) -> bool {
        addr >= 0xE000 || self.prg_mode & 0x03 == 0 || reg & 0x80 != 0
    }

    /// Map a pattern-space address to a flat CHR offset for the given bank
    /// set. The background set only has four registers; it repeats across
    /// both pattern-space halves.
    fn chr_offset_in_set(&self, addr: u16, sprite_set: bool) -> usize {
        let addr = (addr & 0x1FFF) as usize;
        let upper = (self.chr_upper_bits & 0x03) as usize;

        let (bank, size) = match self.chr_mode & 0x03 {
            0 => {
                let reg = if sprite_set { self.chr_sprite_banks[7] } else { self.chr_bg_banks[3] };
                (reg as usize, 0x2000)
            }
            1 => {
                let reg = if sprite_set {
                    self.chr_sprite_banks[(addr >> 12) * 4 + 3]
                } else {
                    self.chr_bg_banks[3]
                };
                (reg as usize, 0x1000)
            }
            2 => {
                let reg = if sprite_set {
                    self.chr_sprite_banks[(addr >> 11) * 2 + 1]
                } else {
                    self.chr_bg_banks[((addr >> 11) & 0x01) * 2 + 1]
                };
                (reg as usize, 0x0800)
            }
            _ => {
                let reg = if sprite_set {
                    self.chr_sprite_banks[addr >> 10]
                } else {
                    self.chr_bg_banks[(addr >> 10) & 0x03]
                };
                (reg as usize, 0x0400)
            }
        };

        ((upper << 8) | bank) * size + (addr & (size - 1))
    }

    /// Flat CHR offset for the current fetch phase, honoring extended
    /// attribute mode for background fetches
    fn chr_offset(&self, addr: u16) -> usize {
        if self.exram_mode == 1 && !self.sprite_fetch_phase {
            // Extended attributes: the ExRAM byte of the current tile
            // supplies a 4KB CHR bank directly.
            let bank = ((self.chr_upper_bits as usize & 0x03) << 6) | (self.exattr_byte & 0x3F) as usize;
            return bank * 0x1000 + (addr & 0x0FFF) as usize;
        }
        self.chr_offset_in_set(addr, self.sprite_fetch_phase)
    }
}

impl Mapper for Mapper005 {
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x5204 => {
                let mut value = 0;
                if self.irq_pending {
                    value |= 0x80;
                }
                if self.in_frame {
                    value |= 0x40;
                }
                // Reading the status register acknowledges the IRQ.
                self.irq_pending = false;
                value
            }
            0x5205 => {
                let product = self.multiplier[0] as u16 * self.multiplier[1] as u16;
                product as u8
            }
            0x5206 => {
                let product = self.multiplier[0] as u16 * self.multiplier[1] as u16;
                (product >> 8) as u8
            }
            0x5C00..=0x5FFF => {
                // ExRAM is CPU-readable only in modes 2 and 3.
                if self.exram_mode >= 2 {
                    self.exram[(addr & 0x03FF) as usize]
                } else {
                    0
                }
            }
            0x6000..=0x7FFF => {
                let index = self.prg_ram_index(addr, self.prg_banks[0]);
                self.prg_ram[index]
            }
            0x8000..=0xFFFF => {
                let (reg, window) = self.prg_window(addr);
                if self.window_is_rom(addr, reg) {
                    self.read_prg_rom(addr, reg, window)
                } else {
                    let index = self.prg_ram_index(addr, reg);
                    self.prg_ram[index]
                }
            }
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8, _cycle: u64) {
        match addr {
            0x5100 => self.prg_mode = value & 0x03,
            0x5101 => self.chr_mode = value & 0x03,
            0x5102 => self.ram_protect[0] = value & 0x03,
            0x5103 => self.ram_protect[1] = value & 0x03,
            0x5104 => self.exram_mode = value & 0x03,
            0x5105 => self.nt_mapping = value,
            0x5106 => self.fill_tile = value,
            0x5107 => self.fill_attr = value & 0x03,
            0x5113..=0x5117 => self.prg_banks[(addr - 0x5113) as usize] = value,
            0x5120..=0x5127 => self.chr_sprite_banks[(addr - 0x5120) as usize] = value,
            0x5128..=0x512B => self.chr_bg_banks[(addr - 0x5128) as usize] = value,
            0x5130 => self.chr_upper_bits = value & 0x03,
            0x5200..=0x5202 => {
                // Vertical split: recognized and stored, not rendered.
                self.split_regs[(addr - 0x5200) as usize] = value;
                debug!("MMC5 split register ${:04X} = ${:02X}", addr, value);
            }
            0x5203 => self.irq_target = value,
            0x5204 => {
                self.irq_enabled = value & 0x80 != 0;
                if !self.irq_enabled {
                    self.irq_pending = false;
                }
            }
            0x5205 => self.multiplier[0] = value,
            0x5206 => self.multiplier[1] = value,
            0x5C00..=0x5FFF => {
                // Mode 3 ExRAM is read-only from the CPU side.
                if self.exram_mode != 3 {
                    self.exram[(addr & 0x03FF) as usize] = value;
                }
            }
            0x6000..=0x7FFF => {
                if self.prg_ram_writable() {
                    let index = self.prg_ram_index(addr, self.prg_banks[0]);
                    self.prg_ram[index] = value;
                }
            }
            0x8000..=0xFFFF => {
                let (reg, _) = self.prg_window(addr);
                if !self.window_is_rom(addr, reg) && self.prg_ram_writable() {
                    let index = self.prg_ram_index(addr, reg);
                    self.prg_ram[index] = value;
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
        // Nametable layout is fully described by 0x5105; the override
        // capability keeps the PPU from ever consulting this.
        Mirroring::FourScreen
    }

    fn reset(&mut self) {
        let last = (self.prg_bank_count() - 1) as u8;
        self.prg_mode = 3;
        self.chr_mode = 3;
        self.ram_protect = [0; 2];
        self.exram_mode = 0;
        self.nt_mapping = 0;
        self.fill_tile = 0;
        self.fill_attr = 0;
        self.prg_banks = [0, 0, 1, 2, last | 0x80];
        self.chr_sprite_banks = [0; 8];
        self.chr_bg_banks = [0; 4];
        self.chr_upper_bits = 0;
        self.split_regs = [0; 3];
        self.irq_target = 0;
        self.irq_enabled = false;
        self.irq_pending = false;
        self.in_frame = false;
        self.sprite_fetch_phase = true;
        self.exattr_byte = 0;
        self.multiplier = [0xFF, 0xFF];
        self.exram.fill(0);
    }

    fn irq_triggered(&self) -> bool {
        self.irq_pending && self.irq_enabled
    }

    fn acknowledge_irq(&mut self) {
        self.irq_pending = false;
    }

    fn has_ppu_a13_chr_switch(&self) -> bool {
        true
    }

    fn notify_ppu_a13(&mut self, sprite_fetch: bool) {
        self.sprite_fetch_phase = sprite_fetch;
    }

    fn has_nametable_override(&self) -> bool {
        true
    }

    fn read_nametable(&mut self, addr: u16) -> u8 {
        let nt = ((addr as usize) >> 10) & 0x03;
        let offset = (addr & 0x03FF) as usize;
        let select = (self.nt_mapping >> (nt * 2)) & 0x03;

        if offset < 0x03C0 {
            // Tile fetch: remember the tile's ExRAM byte for extended
            // attributes and the CHR bank it encodes.
            if self.exram_mode == 1 && !self.sprite_fetch_phase {
                self.exattr_byte = self.exram[offset];
            }
        } else if self.exram_mode == 1 && !self.sprite_fetch_phase {
            // Attribute fetch under extended attributes: the ExRAM byte's
            // top bits apply to this single tile, replicated so any
            // quadrant extraction picks them.
            return (self.exattr_byte >> 6) * 0x55;
        }

        match select {
            0 => self.ciram[offset],
            1 => self.ciram[0x0400 + offset],
            2 => {
                if self.exram_mode < 2 {
                    self.exram[offset]
                } else {
                    0
                }
            }
            _ => {
                if offset < 0x03C0 {
                    self.fill_tile
                } else {
                    (self.fill_attr & 0x03) * 0x55
                }
            }
        }
    }

    fn write_nametable(&mut self, addr: u16, value: u8) {
        let nt = ((addr as usize) >> 10) & 0x03;
        let offset = (addr & 0x03FF) as usize;
        match (self.nt_mapping >> (nt * 2)) & 0x03 {
            0 => self.ciram[offset] = value,
            1 => self.ciram[0x0400 + offset] = value,
            2 => self.exram[offset] = value,
            _ => {} // fill mode ignores writes
        }
    }

    fn has_ppu_scanline_hook(&self) -> bool {
        true
    }

    fn on_scanline(&mut self, scanline: u16, rendering: bool) {
        if rendering && scanline < 240 {
            self.in_frame = true;
            if self.irq_target != 0 && scanline == self.irq_target as u16 {
                self.irq_pending = true;
            }
        } else {
            self.in_frame = false;
        }
    }

    fn save_state(&self) -> MapperState {
        MapperState::Mmc5 {
            prg_mode: self.prg_mode,
            chr_mode: self.chr_mode,
            ram_protect: self.ram_protect,
            exram_mode: self.exram_mode,
            nt_mapping: self.nt_mapping,
            fill_tile: self.fill_tile,
            fill_attr: self.fill_attr,
            prg_banks: self.prg_banks,
            chr_sprite_banks: self.chr_sprite_banks,
            chr_bg_banks: self.chr_bg_banks,
            chr_upper_bits: self.chr_upper_bits,
            split_regs: self.split_regs,
            irq_target: self.irq_target,
            irq_enabled: self.irq_enabled,
            irq_pending: self.irq_pending,
            in_frame: self.in_frame,
            sprite_fetch_phase: self.sprite_fetch_phase,
            exattr_byte: self.exattr_byte,
            multiplier: self.multiplier,
            ciram: self.ciram.clone(),
            exram: self.exram.clone(),
        }
    }

    fn load_state(&mut self, state: &MapperState) {
        if let MapperState::Mmc5 {
            prg_mode,
            chr_mode,
            ram_protect,
            exram_mode,
            nt_mapping,
            fill_tile,
            fill_attr,
            prg_banks,
            chr_sprite_banks,
            chr_bg_banks,
            chr_upper_bits,
            split_regs,
            irq_target,
            irq_enabled,
            irq_pending,
            in_frame,
            sprite_fetch_phase,
            exattr_byte,
            multiplier,
            ciram,
            exram,
        } = state
        {
            self.prg_mode = *prg_mode;
            self.chr_mode = *chr_mode;
            self.ram_protect = *ram_protect;
            self.exram_mode = *exram_mode;
            self.nt_mapping = *nt_mapping;
            self.fill_tile = *fill_tile;
            self.fill_attr = *fill_attr;
            self.prg_banks = *prg_banks;
            self.chr_sprite_banks = *chr_sprite_banks;
            self.chr_bg_banks = *chr_bg_banks;
            self.chr_upper_bits = *chr_upper_bits;
            self.split_regs = *split_regs;
            self.irq_target = *irq_target;
            self.irq_enabled = *irq_enabled;
            self.irq_pending = *irq_pending;
            self.in_frame = *in_frame;
            self.sprite_fetch_phase = *sprite_fetch_phase;
            self.exattr_byte = *exattr_byte;
            self.multiplier = *multiplier;
            self.ciram.copy_from_slice(ciram);
            self.exram.copy_from_slice(exram);
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
