//! # famicore
//!
//! A hardware-model emulation core for the Nintendo Entertainment System /
//! Famicom. The crate cycle-interleaves a 6502-derived CPU, the picture
//! processing unit, the audio processing unit and a replaceable cartridge
//! mapper, and hands the host finished 256x240 RGB frames and stereo float
//! samples.
//!
//! Host video, audio and input backends are deliberately not part of this
//! crate: drive [`Nes::frame`] at ~60 Hz, present [`Nes::framebuffer`], and
//! drain samples with [`Nes::drain_audio`] or an [`audio::SampleRing`].

pub mod apu;
pub mod audio;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod mappers;
pub mod memory;
pub mod nes;
pub mod ppu;
pub mod savestate;
pub mod tile;
pub mod util;

pub use cartridge::{Cartridge, Mirroring, RomError};
pub use controller::Button;
pub use nes::{FrameStatus, Nes};
pub use savestate::{RestoreReport, SaveState, SaveStateError};
