//! NES console implementation
//!
//! The console ties the CPU to the memory bus and runs the machine at the
//! hardware's 1:1:3 CPU/APU/PPU cycle ratio: every CPU instruction is
//! followed by the same number of APU cycles and three times as many PPU
//! dots. [`Nes::frame`] repeats that until the PPU finishes the frame, then
//! hands the host the framebuffer and the audio accumulated along the way.

use log::{info, warn};

use crate::audio::SampleRing;
use crate::cartridge::{Cartridge, RomError};
use crate::controller::Button;
use crate::cpu::{Cpu, CpuBus};
use crate::memory::MemoryBus;

/// Host sample rate used when none is specified
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// CPU cycles consumed by a sprite DMA transfer
const OAM_DMA_CYCLES: u32 = 513;

/// Outcome of running a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame rendered to completion
    Complete,

    /// The CPU fetched an opcode with no decoding, at this PC. The console
    /// stays halted until reset.
    Crashed(u16),
}

/// The NES console
pub struct Nes {
    pub(crate) cpu: Cpu,
    pub(crate) bus: MemoryBus,

    /// Faulting PC once the CPU jams; latched until reset
    pub(crate) crashed: Option<u16>,
}

impl Nes {
    /// Create a console producing audio at the default host rate
    pub fn new() -> Self {
        Self::with_sample_rate(DEFAULT_SAMPLE_RATE)
    }

    /// Create a console producing audio at the given host rate
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Nes {
            cpu: Cpu::new(),
            bus: MemoryBus::new(sample_rate),
            crashed: None,
        }
    }

    /// Load an iNES image and reset the console
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), RomError> {
        let cartridge = Cartridge::from_bytes(data)?;
        self.bus.insert_cartridge(cartridge);
        self.reset();
        info!("Cartridge loaded");
        Ok(())
    }

    /// Eject the cartridge; the console goes back to the uninitialized
    /// state
    pub fn eject(&mut self) {
        self.bus.remove_cartridge();
        self.crashed = None;
    }

    /// Reset the console. Safe to call repeatedly: resetting a reset
    /// console leaves the same state.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu = Cpu::new();
        if self.bus.cartridge.is_some() {
            self.cpu.reset(&mut self.bus);
        }
        self.crashed = None;
    }

    /// Whether a cartridge is inserted
    pub fn cartridge_present(&self) -> bool {
        self.bus.cartridge.is_some()
    }

    /// Execute one CPU instruction and advance the APU and PPU to match
    pub fn step(&mut self) {
        if self.crashed.is_some() {
            return;
        }

        // A latched 0x4014 write performs sprite DMA before the next
        // instruction: 256 bytes through OAMDATA with the CPU stalled.
        if let Some(page) = self.bus.oam_dma_page.take() {
            let base = (page as u16) << 8;
            for offset in 0..256 {
                let value = self.bus.read(base + offset);
                self.bus.write(0x2004, value);
            }
            self.cpu.halt_cycles(OAM_DMA_CYCLES);
        }

        self.bus.cpu_cycle = self.cpu.cycles();

        match self.cpu.step(&mut self.bus) {
            Ok(cycles) => self.bus.tick(cycles),
            Err(pc) => {
                warn!("CPU jammed at ${:04X}", pc);
                self.crashed = Some(pc);
            }
        }
    }

    /// Run until the PPU completes the current frame
    pub fn frame(&mut self) -> FrameStatus {
        if !self.cartridge_present() {
            return FrameStatus::Complete;
        }

        loop {
            if let Some(pc) = self.crashed {
                return FrameStatus::Crashed(pc);
            }

            self.step();

            if self.bus.ppu.take_frame_complete() {
                return FrameStatus::Complete;
            }
        }
    }

    /// The last completed frame: 256x240 packed 0x00RRGGBB words
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.ppu.framebuffer()
    }

    /// Press or release a controller button
    pub fn set_button(&mut self, port: u8, button: Button, pressed: bool) {
        match port {
            1 => self.bus.controller1.set_button(button, pressed),
            2 => self.bus.controller2.set_button(button, pressed),
            _ => {}
        }
    }

    /// Drain accumulated audio through a callback, in sample order
    pub fn drain_audio(&mut self, sink: impl FnMut(f32, f32)) {
        self.bus.apu.drain_samples(sink);
    }

    /// Take the accumulated audio as a vector of stereo pairs
    pub fn take_audio(&mut self) -> Vec<(f32, f32)> {
        self.bus.apu.take_samples()
    }

    /// Push accumulated audio into a host sample ring
    pub fn pump_audio(&mut self, ring: &SampleRing) {
        self.bus.apu.drain_samples(|left, right| {
            ring.push(left, right);
        });
    }

    /// Battery-backed PRG RAM contents, if the board has a battery
    pub fn save_ram(&self) -> Option<Vec<u8>> {
        self.bus.cartridge.as_ref().and_then(|cart| cart.save_ram())
    }

    /// Load battery-backed PRG RAM from a previous session
    pub fn load_ram(&mut self, data: &[u8]) {
        if let Some(cart) = &mut self.bus.cartridge {
            cart.load_ram(data);
        }
    }

    /// CPU register state, for harnesses that check golden values
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Internal RAM contents, for harnesses that read back results a test
    /// program stored. Reading here has no side effects, unlike going
    /// through the bus.
    pub fn ram(&self) -> &[u8] {
        &self.bus.ram
    }

    /// Total CPU cycles executed since power-on
    pub fn cpu_cycles(&self) -> u64 {
        self.cpu.cycles()
    }
}

impl Default for Nes {
    fn default() -> Self {
        Nes::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal NROM image: an infinite loop at the reset vector
    fn spin_rom() -> Vec<u8> {
        let mut data = vec![0x4E, 0x45, 0x53, 0x1A, 1, 1, 0x00, 0x00];
        data.extend_from_slice(&[0; 8]);

        let mut prg = vec![0xEA; 16 * 1024];
        // 0x8000: JMP 0x8000
        prg[0] = 0x4C;
        prg[1] = 0x00;
        prg[2] = 0x80;
        prg[0x3FFC] = 0x00; // reset vector -> 0x8000
        prg[0x3FFD] = 0x80;
        data.extend_from_slice(&prg);
        data.extend(std::iter::repeat(0).take(8 * 1024));
        data
    }

    #[test]
    fn frame_without_cartridge_is_a_no_op() {
        let mut nes = Nes::new();
        assert_eq!(nes.frame(), FrameStatus::Complete);
    }

    #[test]
    fn frame_runs_one_frame_of_cpu_time() {
        let mut nes = Nes::new();
        nes.load_rom(&spin_rom()).unwrap();

        // The first frame is short (the PPU starts at the top of the
        // frame, VBlank lands ~241 scanlines in); measure the second.
        assert_eq!(nes.frame(), FrameStatus::Complete);
        let before = nes.cpu_cycles();
        assert_eq!(nes.frame(), FrameStatus::Complete);
        let elapsed = nes.cpu_cycles() - before;

        // ~29780 CPU cycles per NTSC frame, give or take an instruction.
        assert!((29_600..30_000).contains(&elapsed), "{}", elapsed);
    }

    #[test]
    fn crash_latches_until_reset() {
        let mut data = spin_rom();
        // Replace the loop with a jammed opcode.
        data[16] = 0x02;

        let mut nes = Nes::new();
        nes.load_rom(&data).unwrap();

        assert_eq!(nes.frame(), FrameStatus::Crashed(0x8000));
        assert_eq!(nes.frame(), FrameStatus::Crashed(0x8000));

        nes.reset();
        // The jam is still in ROM; the point is that reset re-arms the CPU.
        assert_eq!(nes.frame(), FrameStatus::Crashed(0x8000));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut nes = Nes::new();
        nes.load_rom(&spin_rom()).unwrap();
        nes.frame();

        nes.reset();
        let pc_once = nes.cpu().pc;
        nes.reset();
        assert_eq!(nes.cpu().pc, pc_once);
        assert_eq!(nes.cpu().sp, 0xFD);
    }

    #[test]
    fn audio_accumulates_during_a_frame() {
        let mut nes = Nes::new();
        nes.load_rom(&spin_rom()).unwrap();
        nes.frame();
        nes.take_audio();

        // A full frame is worth ~735 samples at 44.1 kHz.
        nes.frame();
        let samples = nes.take_audio();
        assert!((700..800).contains(&samples.len()), "{}", samples.len());
    }

    #[test]
    fn oam_dma_copies_a_page_and_stalls() {
        let mut nes = Nes::new();
        nes.load_rom(&spin_rom()).unwrap();

        // Fill RAM page 2 with a pattern, then trigger DMA from it.
        for i in 0..256u16 {
            nes.bus.write(0x0200 + i, i as u8);
        }
        nes.bus.write(0x4014, 0x02);

        let before = nes.cpu_cycles();
        nes.step(); // performs the DMA and consumes the stall
        assert!(nes.cpu_cycles() - before >= 513);
        assert_eq!(nes.bus.ppu.oam[0], 0);
        assert_eq!(nes.bus.ppu.oam[255], 255);
    }
}
