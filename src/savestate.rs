//! Save state implementation
//!
//! Save states capture the complete machine: CPU registers and RAM, PPU
//! memories and loopy registers, all APU channel state, the mapper's
//! registers plus any cartridge RAM, and the controller latches. States
//! are versioned, carry a fingerprint of the loaded ROM, and serialize to
//! bincode. Restoring against a different ROM is allowed but reported as a
//! warning; restoring a different format version is an error.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::apu::ApuState;
use crate::controller::ControllerState;
use crate::mappers::MapperState;
use crate::nes::Nes;

/// Current save state format version
const CURRENT_SAVE_STATE_VERSION: u32 = 1;

/// File magic prefixed to serialized states
const SAVE_STATE_MAGIC: [u8; 4] = *b"FCSS";

/// Errors that can occur during save state operations
#[derive(Error, Debug)]
pub enum SaveStateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Encode(String),

    #[error("Deserialization error: {0}")]
    Decode(String),

    #[error("Not a save state file")]
    BadMagic,

    #[error("Incompatible save state version: found {found}, expected {expected}")]
    IncompatibleVersion { found: u32, expected: u32 },

    #[error("No cartridge loaded")]
    NoCartridge,
}

/// Outcome of a successful restore
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreReport {
    /// The state was taken from a ROM with a different fingerprint
    pub rom_mismatch: bool,
}

/// CPU state data
#[derive(Serialize, Deserialize)]
struct CpuState {
    a: u8,
    x: u8,
    y: u8,
    p: u8,
    sp: u8,
    pc: u16,
    cycles: u64,
}

/// PPU state data
#[derive(Serialize, Deserialize)]
struct PpuState {
    ctrl: u8,
    mask: u8,
    oam_addr: u8,
    vblank: bool,
    sprite_zero_hit: bool,
    sprite_overflow: bool,
    io_latch: u8,
    oam: Vec<u8>,
    vram: Vec<u8>,
    palette_ram: Vec<u8>,
    v: u16,
    t: u16,
    x: u8,
    w: bool,
    data_buffer: u8,
    scanline: u16,
    dot: u16,
    frame: u64,
    odd_frame: bool,
}

/// Bus-level state: RAM, controllers, pending DMA
#[derive(Serialize, Deserialize)]
struct BusState {
    ram: Vec<u8>,
    controller1: ControllerState,
    controller2: ControllerState,
    oam_dma_page: Option<u8>,
}

/// Cartridge-side state: the mapper registers plus whatever RAM the board
/// carries
#[derive(Serialize, Deserialize)]
struct CartridgeState {
    mapper: MapperState,
    prg_ram: Vec<u8>,
    chr_ram: Vec<u8>,
}

/// A complete serializable machine state
#[derive(Serialize, Deserialize)]
pub struct SaveState {
    version: u32,

    /// Fingerprint of the loaded ROM (first 1KB of PRG)
    rom_fingerprint: u32,

    cpu: CpuState,
    ppu: PpuState,
    apu: ApuState,
    bus: BusState,
    cartridge: CartridgeState,
}

impl SaveState {
    /// Capture the complete state of a console
    pub fn capture(nes: &Nes) -> Result<Self, SaveStateError> {
        let cart = nes.bus.cartridge.as_ref().ok_or(SaveStateError::NoCartridge)?;
        let ppu = &nes.bus.ppu;

        Ok(SaveState {
            version: CURRENT_SAVE_STATE_VERSION,
            rom_fingerprint: cart.fingerprint(),
            cpu: CpuState {
                a: nes.cpu.a,
                x: nes.cpu.x,
                y: nes.cpu.y,
                p: nes.cpu.p,
                sp: nes.cpu.sp,
                pc: nes.cpu.pc,
                cycles: nes.cpu.cycles(),
            },
            ppu: PpuState {
                ctrl: ppu.ctrl,
                mask: ppu.mask,
                oam_addr: ppu.oam_addr,
                vblank: ppu.vblank,
                sprite_zero_hit: ppu.sprite_zero_hit,
                sprite_overflow: ppu.sprite_overflow,
                io_latch: ppu.io_latch,
                oam: ppu.oam.to_vec(),
                vram: ppu.vram.to_vec(),
                palette_ram: ppu.palette_ram.to_vec(),
                v: ppu.v,
                t: ppu.t,
                x: ppu.x,
                w: ppu.w,
                data_buffer: ppu.data_buffer,
                scanline: ppu.scanline,
                dot: ppu.dot,
                frame: ppu.frame,
                odd_frame: ppu.odd_frame,
            },
            apu: nes.bus.apu.save_state(),
            bus: BusState {
                ram: nes.bus.ram.to_vec(),
                controller1: nes.bus.controller1.save_state(),
                controller2: nes.bus.controller2.save_state(),
                oam_dma_page: nes.bus.oam_dma_page,
            },
            cartridge: CartridgeState {
                mapper: cart.save_state(),
                prg_ram: cart.prg_ram().map(|ram| ram.to_vec()).unwrap_or_default(),
                chr_ram: cart.chr_ram().map(|ram| ram.to_vec()).unwrap_or_default(),
            },
        })
    }

    /// Restore this state into a console. The console must have a
    /// cartridge loaded; a fingerprint mismatch restores anyway but is
    /// reported (and logged) as a warning.
    pub fn apply(&self, nes: &mut Nes) -> Result<RestoreReport, SaveStateError> {
        if self.version != CURRENT_SAVE_STATE_VERSION {
            return Err(SaveStateError::IncompatibleVersion {
                found: self.version,
                expected: CURRENT_SAVE_STATE_VERSION,
            });
        }

        let cart = nes.bus.cartridge.as_mut().ok_or(SaveStateError::NoCartridge)?;

        let mut report = RestoreReport::default();
        if cart.fingerprint() != self.rom_fingerprint {
            warn!(
                "Save state fingerprint {:08X} does not match the loaded ROM ({:08X})",
                self.rom_fingerprint,
                cart.fingerprint()
            );
            report.rom_mismatch = true;
        }

        cart.load_state(&self.cartridge.mapper);
        if !self.cartridge.prg_ram.is_empty() {
            cart.load_prg_ram(&self.cartridge.prg_ram);
        }
        if !self.cartridge.chr_ram.is_empty() {
            cart.load_chr_ram(&self.cartridge.chr_ram);
        }

        nes.cpu.a = self.cpu.a;
        nes.cpu.x = self.cpu.x;
        nes.cpu.y = self.cpu.y;
        nes.cpu.p = self.cpu.p;
        nes.cpu.sp = self.cpu.sp;
        nes.cpu.pc = self.cpu.pc;
        nes.cpu.set_cycles(self.cpu.cycles);

        let ppu = &mut nes.bus.ppu;
        ppu.ctrl = self.ppu.ctrl;
        ppu.mask = self.ppu.mask;
        ppu.oam_addr = self.ppu.oam_addr;
        ppu.vblank = self.ppu.vblank;
        ppu.sprite_zero_hit = self.ppu.sprite_zero_hit;
        ppu.sprite_overflow = self.ppu.sprite_overflow;
        ppu.io_latch = self.ppu.io_latch;
        ppu.oam.copy_from_slice(&self.ppu.oam);
        ppu.vram.copy_from_slice(&self.ppu.vram);
        ppu.palette_ram.copy_from_slice(&self.ppu.palette_ram);
        ppu.v = self.ppu.v;
        ppu.t = self.ppu.t;
        ppu.x = self.ppu.x;
        ppu.w = self.ppu.w;
        ppu.data_buffer = self.ppu.data_buffer;
        ppu.scanline = self.ppu.scanline;
        ppu.dot = self.ppu.dot;
        ppu.frame = self.ppu.frame;
        ppu.odd_frame = self.ppu.odd_frame;

        nes.bus.apu.load_state(&self.apu);

        nes.bus.ram.copy_from_slice(&self.bus.ram);
        nes.bus.controller1.load_state(&self.bus.controller1);
        nes.bus.controller2.load_state(&self.bus.controller2);
        nes.bus.oam_dma_page = self.bus.oam_dma_page;

        nes.crashed = None;

        info!("Save state restored");
        Ok(report)
    }

    /// Serialize to bytes (magic prefix + bincode payload)
    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveStateError> {
        let payload = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| SaveStateError::Encode(e.to_string()))?;

        let mut bytes = Vec::with_capacity(payload.len() + 4);
        bytes.extend_from_slice(&SAVE_STATE_MAGIC);
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Deserialize from bytes produced by [`SaveState::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SaveStateError> {
        if bytes.len() < 4 || bytes[0..4] != SAVE_STATE_MAGIC {
            return Err(SaveStateError::BadMagic);
        }

        let (state, _) =
            bincode::serde::decode_from_slice(&bytes[4..], bincode::config::standard())
                .map_err(|e| SaveStateError::Decode(e.to_string()))?;
        Ok(state)
    }

    /// Write the state to a file
    pub fn write_file(&self, path: &Path) -> Result<(), SaveStateError> {
        let bytes = self.to_bytes()?;
        let mut file = File::create(path)?;
        file.write_all(&bytes)?;
        info!("Save state written to {}", path.display());
        Ok(())
    }

    /// Read a state from a file
    pub fn read_file(path: &Path) -> Result<Self, SaveStateError> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// The format version carried by this state
    pub fn version(&self) -> u32 {
        self.version
    }
}
