//! Shared helpers for the integration suite: an in-memory iNES builder and
//! a small 6502 program assembler, so tests exercise the console the way a
//! game would instead of poking at internals.

/// Builds iNES images in memory
pub struct RomBuilder {
    prg_banks: u8,
    chr_banks: u8,
    mapper: u8,
    flags6: u8,
    prg: Vec<u8>,
    chr: Vec<u8>,
}

#[allow(dead_code)]
impl RomBuilder {
    /// An NROM image with 16KB PRG and CHR RAM
    pub fn nrom() -> Self {
        RomBuilder::new(1, 0, 0)
    }

    pub fn new(prg_banks: u8, chr_banks: u8, mapper: u8) -> Self {
        RomBuilder {
            prg_banks,
            chr_banks,
            mapper,
            flags6: 0,
            prg: vec![0xEA; prg_banks as usize * 16 * 1024],
            chr: vec![0; chr_banks as usize * 8 * 1024],
        }
    }

    pub fn vertical_mirroring(mut self) -> Self {
        self.flags6 |= 0x01;
        self
    }

    /// Place bytes at a CPU address within the *last* PRG bank's mapping
    /// (0xC000-0xFFFF for multi-bank images, 0x8000+ mirrored for NROM)
    pub fn with_code(mut self, addr: u16, code: &[u8]) -> Self {
        let bank_offset = (self.prg_banks as usize - 1) * 16 * 1024;
        let within = (addr as usize - 0x8000) % (16 * 1024);
        self.prg[bank_offset + within..bank_offset + within + code.len()].copy_from_slice(code);
        self
    }

    /// Place bytes at an absolute offset into PRG ROM
    pub fn with_prg(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.prg[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Place bytes at an absolute offset into CHR ROM
    pub fn with_chr(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.chr[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Point the reset vector at `addr` (stored in the last PRG bank)
    pub fn with_reset_vector(self, addr: u16) -> Self {
        self.with_code(0xFFFC, &[addr as u8, (addr >> 8) as u8])
    }

    /// Point the NMI vector at `addr`
    pub fn with_nmi_vector(self, addr: u16) -> Self {
        self.with_code(0xFFFA, &[addr as u8, (addr >> 8) as u8])
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = vec![
            0x4E,
            0x45,
            0x53,
            0x1A,
            self.prg_banks,
            self.chr_banks,
            self.flags6 | (self.mapper << 4),
            self.mapper & 0xF0,
        ];
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&self.prg);
        data.extend_from_slice(&self.chr);
        data
    }
}

/// Tiny 6502 assembler covering the handful of instructions the test
/// programs need
#[derive(Default)]
pub struct Program {
    bytes: Vec<u8>,
}

#[allow(dead_code)]
impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn lda_imm(mut self, value: u8) -> Self {
        self.bytes.extend_from_slice(&[0xA9, value]);
        self
    }

    pub fn ldx_imm(mut self, value: u8) -> Self {
        self.bytes.extend_from_slice(&[0xA2, value]);
        self
    }

    pub fn ldy_imm(mut self, value: u8) -> Self {
        self.bytes.extend_from_slice(&[0xA0, value]);
        self
    }

    pub fn lda_abs(mut self, addr: u16) -> Self {
        self.bytes.extend_from_slice(&[0xAD, addr as u8, (addr >> 8) as u8]);
        self
    }

    pub fn sta_zp(mut self, addr: u8) -> Self {
        self.bytes.extend_from_slice(&[0x85, addr]);
        self
    }

    pub fn stx_zp(mut self, addr: u8) -> Self {
        self.bytes.extend_from_slice(&[0x86, addr]);
        self
    }

    pub fn sta_abs(mut self, addr: u16) -> Self {
        self.bytes.extend_from_slice(&[0x8D, addr as u8, (addr >> 8) as u8]);
        self
    }

    pub fn adc_imm(mut self, value: u8) -> Self {
        self.bytes.extend_from_slice(&[0x69, value]);
        self
    }

    pub fn clc(mut self) -> Self {
        self.bytes.push(0x18);
        self
    }

    pub fn sei(mut self) -> Self {
        self.bytes.push(0x78);
        self
    }

    pub fn cli(mut self) -> Self {
        self.bytes.push(0x58);
        self
    }

    pub fn inc_zp(mut self, addr: u8) -> Self {
        self.bytes.extend_from_slice(&[0xE6, addr]);
        self
    }

    pub fn rti(mut self) -> Self {
        self.bytes.push(0x40);
        self
    }

    /// BIT absolute (used to poll PPUSTATUS: bit 7 lands in N, bit 6 in V)
    pub fn bit_abs(mut self, addr: u16) -> Self {
        self.bytes.extend_from_slice(&[0x2C, addr as u8, (addr >> 8) as u8]);
        self
    }

    /// BPL back over the previous `distance` bytes (spin until N set)
    pub fn bpl_back(mut self, distance: u8) -> Self {
        self.bytes.extend_from_slice(&[0x10, (distance as i8).wrapping_neg() as u8]);
        self
    }

    /// BVC back over the previous `distance` bytes (spin until V set)
    pub fn bvc_back(mut self, distance: u8) -> Self {
        self.bytes.extend_from_slice(&[0x50, (distance as i8).wrapping_neg() as u8]);
        self
    }

    /// JMP absolute
    pub fn jmp(mut self, addr: u16) -> Self {
        self.bytes.extend_from_slice(&[0x4C, addr as u8, (addr >> 8) as u8]);
        self
    }

    /// Infinite loop: JMP to this instruction's own address
    pub fn spin(self, addr: u16) -> Self {
        self.jmp(addr)
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
