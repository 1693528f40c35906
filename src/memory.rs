//! Memory bus implementation for the NES
//!
//! The CPU sees a 16-bit address space dispatched to the components that
//! live on it. The bus owns those components - PPU, APU, cartridge and
//! controllers - so every register access lands on real device state and
//! carries its side effects (status reads clear flags, data reads move the
//! VRAM pointer, strobe writes latch the pads).
//!
//! Memory map:
//! - 0x0000 - 0x1FFF: 2KB internal RAM, mirrored four times
//! - 0x2000 - 0x3FFF: PPU registers, mirrored every 8 bytes
//! - 0x4000 - 0x4017: APU and I/O registers
//! - 0x4018 - 0x401F: disabled APU test registers
//! - 0x4020 - 0xFFFF: cartridge space (PRG ROM, PRG RAM, mapper registers)

use log::trace;

use crate::apu::Apu;
use crate::cartridge::Cartridge;
use crate::controller::Controller;
use crate::cpu::CpuBus;
use crate::ppu::Ppu;

/// Size of the internal RAM (2KB)
const RAM_SIZE: usize = 0x0800;

/// The memory bus connecting all NES components
pub struct MemoryBus {
    /// Internal RAM (2KB)
    pub ram: [u8; RAM_SIZE],

    /// Picture processing unit
    pub ppu: Ppu,

    /// Audio processing unit
    pub apu: Apu,

    /// Inserted cartridge, if any
    pub cartridge: Option<Cartridge>,

    /// Controller ports
    pub controller1: Controller,
    pub controller2: Controller,

    /// Page latched by a 0x4014 write; the console performs the DMA
    pub oam_dma_page: Option<u8>,

    /// CPU cycle stamp applied to cartridge writes
    pub cpu_cycle: u64,
}

impl MemoryBus {
    /// Create a new memory bus with an APU at the given host sample rate
    pub fn new(sample_rate: u32) -> Self {
        MemoryBus {
            ram: [0; RAM_SIZE],
            ppu: Ppu::new(),
            apu: Apu::new(sample_rate),
            cartridge: None,
            controller1: Controller::new(),
            controller2: Controller::new(),
            oam_dma_page: None,
            cpu_cycle: 0,
        }
    }

    /// Reset everything on the bus
    pub fn reset(&mut self) {
        self.ram = [0; RAM_SIZE];
        self.ppu.reset();
        self.apu.reset();
        self.controller1.reset();
        self.controller2.reset();
        self.oam_dma_page = None;
        self.cpu_cycle = 0;
        if let Some(cart) = &mut self.cartridge {
            cart.reset();
        }
    }

    /// Insert a cartridge
    pub fn insert_cartridge(&mut self, cartridge: Cartridge) {
        self.cartridge = Some(cartridge);
    }

    /// Remove the cartridge
    pub fn remove_cartridge(&mut self) {
        self.cartridge = None;
    }

    /// Advance the APU and PPU for one CPU instruction's worth of cycles
    /// (the PPU runs three dots per CPU cycle)
    pub fn tick(&mut self, cycles: u32) {
        if let Some(cart) = &mut self.cartridge {
            self.apu.run(cycles, cart);
            for _ in 0..cycles * 3 {
                self.ppu.step(cart);
            }
        }
    }
}

impl CpuBus for MemoryBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            // Internal RAM and mirrors
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],

            // PPU registers and mirrors
            0x2000..=0x3FFF => match &mut self.cartridge {
                Some(cart) => self.ppu.read_register(cart, (addr & 0x0007) as usize),
                None => 0,
            },

            // APU status
            0x4015 => self.apu.read_status(),

            // Controllers; the upper bits ride the open bus
            0x4016 => 0x40 | self.controller1.read(),
            0x4017 => 0x40 | self.controller2.read(),

            // Write-only APU and I/O registers
            0x4000..=0x4014 => 0,

            // Disabled APU test registers
            0x4018..=0x401F => {
                trace!("Read from disabled APU test register: ${:04X}", addr);
                0
            }

            // Cartridge space
            0x4020..=0xFFFF => match &mut self.cartridge {
                Some(cart) => cart.read(addr),
                None => {
                    trace!("Read from cartridge space with no cartridge: ${:04X}", addr);
                    0
                }
            },
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            // Internal RAM and mirrors
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = value,

            // PPU registers and mirrors
            0x2000..=0x3FFF => {
                if let Some(cart) = &mut self.cartridge {
                    self.ppu.write_register(cart, (addr & 0x0007) as usize, value);
                }
            }

            // Sprite DMA: latch the page, the console stalls the CPU and
            // performs the copy
            0x4014 => self.oam_dma_page = Some(value),

            // Controller strobe hits both pads
            0x4016 => {
                self.controller1.write(value);
                self.controller2.write(value);
            }

            // APU registers (0x4017 is the frame counter; the pad on that
            // address is read-only)
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write_register(addr, value),

            // Disabled APU test registers
            0x4018..=0x401F => {
                trace!(
                    "Write to disabled APU test register: ${:04X} = ${:02X}",
                    addr,
                    value
                );
            }

            // Cartridge space
            0x4020..=0xFFFF => {
                let cycle = self.cpu_cycle;
                if let Some(cart) = &mut self.cartridge {
                    cart.write(addr, value, cycle);
                } else {
                    trace!(
                        "Write to cartridge space with no cartridge: ${:04X} = ${:02X}",
                        addr,
                        value
                    );
                }
            }
        }
    }

    fn poll_nmi(&mut self) -> bool {
        self.ppu.take_nmi()
    }

    fn poll_irq(&mut self) -> bool {
        let mapper_irq = self
            .cartridge
            .as_ref()
            .map(|cart| cart.irq_triggered())
            .unwrap_or(false);
        self.apu.irq_pending() || mapper_irq
    }
}
