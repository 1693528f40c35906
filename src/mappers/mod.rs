//! Mapper implementations for NES cartridges
//!
//! Cartridge boards remap PRG and CHR banks, choose the nametable layout and
//! sometimes add an IRQ source or CHR latches. Every board implements the
//! [`Mapper`] trait: a mandatory bank-mapping interface plus *capability*
//! methods. A capability query returning `true` is a promise that the paired
//! callback is implemented; the PPU only ever branches on capabilities,
//! never on mapper identity.

mod mapper000; // NROM
mod mapper001; // MMC1
mod mapper002; // UxROM
mod mapper003; // CNROM
mod mapper004; // MMC3
mod mapper005; // MMC5
mod mapper007; // AxROM
mod mapper009; // MMC2
mod mapper010; // MMC4
mod mapper011; // Color Dreams
mod mapper034; // BNROM
mod mapper066; // GxROM

pub use mapper000::Mapper000;
pub use mapper001::Mapper001;
pub use mapper002::Mapper002;
pub use mapper003::Mapper003;
pub use mapper004::Mapper004;
pub use mapper005::Mapper005;
pub use mapper007::Mapper007;
pub use mapper009::Mapper009;
pub use mapper010::Mapper010;
pub use mapper011::Mapper011;
pub use mapper034::Mapper034;
pub use mapper066::Mapper066;

use serde::{Deserialize, Serialize};

use crate::cartridge::{Mirroring, RomError, RomImage};
use crate::tile::Tile;

/// Default PRG RAM size for boards that carry work RAM (8KB)
pub const PRG_RAM_SIZE: usize = 8 * 1024;

/// Default CHR RAM size for boards without CHR ROM (8KB)
pub const CHR_RAM_SIZE: usize = 8 * 1024;

/// Trait for NES cartridge mappers
pub trait Mapper {
    /// Read from CPU space (0x4020-0xFFFF) under the current PRG mapping
    fn cpu_read(&mut self, addr: u16) -> u8;

    /// Write to CPU space: bank-switch registers and PRG RAM. `cycle` is
    /// the CPU cycle stamp of the write.
    fn cpu_write(&mut self, addr: u16, value: u8, cycle: u64);

    /// Read from pattern-table space (0x0000-0x1FFF) under the current CHR
    /// mapping
    fn ppu_read(&self, addr: u16) -> u8;

    /// Write to pattern-table space; only meaningful when CHR is RAM
    fn ppu_write(&mut self, addr: u16, value: u8);

    /// Decoded tile containing `addr` under the current CHR mapping
    fn tile(&self, addr: u16) -> &Tile;

    /// The currently configured nametable layout
    fn mirroring(&self) -> Mirroring;

    /// Reset the mapper to its power-on register state
    fn reset(&mut self);

    /// Whether the mapper's IRQ line is asserted
    fn irq_triggered(&self) -> bool {
        false
    }

    /// Deassert the IRQ line
    fn acknowledge_irq(&mut self) {}

    /// CHR latch capability (MMC2/MMC4). When true, [`Mapper::latch_access`]
    /// receives the address of every pattern fetch.
    fn has_chr_latch(&self) -> bool {
        false
    }

    fn latch_access(&mut self, _addr: u16) {}

    /// Scanline IRQ capability (MMC3). When true, [`Mapper::notify_a12`]
    /// receives bit 12 of every pattern-fetch address.
    fn has_scanline_irq(&self) -> bool {
        false
    }

    fn notify_a12(&mut self, _bit: bool) {}

    /// BG/sprite CHR set switching capability (MMC5). When true,
    /// [`Mapper::notify_ppu_a13`] is called at fetch-phase transitions.
    /// The argument is true when the coming pattern fetches belong to the
    /// sprite bank set: sprite fetches always, and every fetch while
    /// sprites are 8x8 (only 8x16 mode gives the background its own set).
    fn has_ppu_a13_chr_switch(&self) -> bool {
        false
    }

    fn notify_ppu_a13(&mut self, _sprite_fetch: bool) {}

    /// Nametable override capability (MMC5 ExRAM / fill mode). When true,
    /// all PPU nametable accesses in 0x2000-0x2FFF go through
    /// [`Mapper::read_nametable`] / [`Mapper::write_nametable`].
    fn has_nametable_override(&self) -> bool {
        false
    }

    fn read_nametable(&mut self, _addr: u16) -> u8 {
        0
    }

    fn write_nametable(&mut self, _addr: u16, _value: u8) {}

    /// PPU address hook capability. When true,
    /// [`Mapper::ppu_address_update`] sees every PPU memory access.
    fn has_ppu_address_hook(&self) -> bool {
        false
    }

    fn ppu_address_update(&mut self, _addr: u16) {}

    /// Scanline hook capability (MMC5 in-frame IRQ). When true,
    /// [`Mapper::on_scanline`] is called at the end of every scanline.
    fn has_ppu_scanline_hook(&self) -> bool {
        false
    }

    fn on_scanline(&mut self, _scanline: u16, _rendering: bool) {}

    /// Capture mapper registers for a save state
    fn save_state(&self) -> MapperState;

    /// Restore mapper registers from a save state
    fn load_state(&mut self, state: &MapperState);

    /// PRG RAM contents, if the board has work RAM
    fn prg_ram(&self) -> Option<&[u8]> {
        None
    }

    fn load_prg_ram(&mut self, _data: &[u8]) {}

    /// CHR RAM contents, if the board uses CHR RAM
    fn chr_ram(&self) -> Option<&[u8]> {
        None
    }

    fn load_chr_ram(&mut self, _data: &[u8]) {}
}

/// Mapper-specific register state captured in save states
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MapperState {
    /// NROM carries no registers
    Nrom,

    Mmc1 {
        shift_register: u8,
        shift_count: u8,
        control: u8,
        chr_bank_0: u8,
        chr_bank_1: u8,
        prg_bank: u8,
        last_write_cycle: u64,
    },

    Uxrom {
        prg_bank: u8,
    },

    Cnrom {
        chr_bank: u8,
    },

    Mmc3 {
        bank_select: u8,
        bank_registers: [u8; 8],
        prg_mode: u8,
        chr_mode: u8,
        mirroring: Mirroring,
        irq_counter: u8,
        irq_latch: u8,
        irq_enabled: bool,
        irq_pending: bool,
        irq_reload: bool,
        prg_ram_protect: [bool; 2],
        a12_low_streak: u8,
    },

    Mmc5 {
        prg_mode: u8,
        chr_mode: u8,
        ram_protect: [u8; 2],
        exram_mode: u8,
        nt_mapping: u8,
        fill_tile: u8,
        fill_attr: u8,
        prg_banks: [u8; 5],
        chr_sprite_banks: [u8; 8],
        chr_bg_banks: [u8; 4],
        chr_upper_bits: u8,
        split_regs: [u8; 3],
        irq_target: u8,
        irq_enabled: bool,
        irq_pending: bool,
        in_frame: bool,
        sprite_fetch_phase: bool,
        exattr_byte: u8,
        multiplier: [u8; 2],
        ciram: Vec<u8>,
        exram: Vec<u8>,
    },

    Axrom {
        bank: u8,
        mirroring: Mirroring,
    },

    Mmc2 {
        prg_bank: u8,
        chr_fd: [u8; 2],
        chr_fe: [u8; 2],
        latch_fe: [bool; 2],
        mirroring: Mirroring,
    },

    Mmc4 {
        prg_bank: u8,
        chr_fd: [u8; 2],
        chr_fe: [u8; 2],
        latch_fe: [bool; 2],
        mirroring: Mirroring,
    },

    ColorDreams {
        bank: u8,
    },

    Bnrom {
        bank: u8,
    },

    Gxrom {
        bank: u8,
    },
}

/// Create a mapper instance for a parsed ROM image
pub fn create_mapper(rom: RomImage) -> Result<Box<dyn Mapper>, RomError> {
    match rom.mapper_number() {
        0 => Ok(Box::new(Mapper000::new(rom))),
        1 => Ok(Box::new(Mapper001::new(rom))),
        2 => Ok(Box::new(Mapper002::new(rom))),
        3 => Ok(Box::new(Mapper003::new(rom))),
        4 => Ok(Box::new(Mapper004::new(rom))),
        5 => Ok(Box::new(Mapper005::new(rom))),
        7 => Ok(Box::new(Mapper007::new(rom))),
        9 => Ok(Box::new(Mapper009::new(rom))),
        10 => Ok(Box::new(Mapper010::new(rom))),
        11 => Ok(Box::new(Mapper011::new(rom))),
        34 => Ok(Box::new(Mapper034::new(rom))),
        66 => Ok(Box::new(Mapper066::new(rom))),
        number => Err(RomError::UnsupportedMapper(number)),
    }
}
