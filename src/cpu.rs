//! CPU implementation for the Ricoh 2A03 (modified MOS 6502)
//!
//! The 2A03 is a MOS 6502 with decimal mode disabled. Decoding is driven by
//! a 256-entry table packing mnemonic, addressing mode, instruction size,
//! base cycle count and the page-cross penalty flag for each opcode. The
//! table covers all official instructions plus the illegal opcodes that
//! shipped games actually rely on (LAX, SAX, DCP, ISC, SLO, RLA, SRE, RRA,
//! ALR, ANC, ARR, AXS and the multi-byte NOPs).
//!
//! An opcode with no table entry halts the CPU: [`Cpu::step`] reports the
//! faulting program counter and the console surfaces it at the frame
//! boundary instead of guessing at what a jammed processor would do.

use crate::util::{combine_bytes, stack_address};

/// Status register flag bits
pub mod flags {
    pub const CARRY: u8 = 0x01;
    pub const ZERO: u8 = 0x02;
    pub const INTERRUPT_DISABLE: u8 = 0x04;
    pub const DECIMAL: u8 = 0x08; // Ignored on the 2A03, but still settable
    pub const BREAK: u8 = 0x10;
    pub const UNUSED: u8 = 0x20; // Always 1 when pushed to the stack
    pub const OVERFLOW: u8 = 0x40;
    pub const NEGATIVE: u8 = 0x80;
}

/// Addressing modes of the 6502
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndexedIndirect, // (Indirect,X)
    IndirectIndexed, // (Indirect),Y
}

/// Instruction mnemonics, official and illegal
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[rustfmt::skip]
pub enum Instruction {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
    // Illegal opcodes
    Alr, Anc, Arr, Axs, Lax, Sax, Dcp, Isc, Rla, Rra, Slo, Sre, Skb, Ign,
}

/// One decoded opcode table entry
#[derive(Debug, Copy, Clone)]
pub struct OpEntry {
    pub instruction: Instruction,
    pub mode: AddressingMode,
    pub size: u8,
    pub cycles: u8,
    /// Whether a page crossing during operand resolution costs a cycle
    pub page_penalty: bool,
}

/// Represents a bus the CPU can read from and write to
pub trait CpuBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);

    /// Poll the NMI line; returns true if an NMI is pending
    fn poll_nmi(&mut self) -> bool;

    /// Poll the IRQ line; returns true while any IRQ source is asserted
    fn poll_irq(&mut self) -> bool;
}

/// Structure representing the state of the NES CPU (Ricoh 2A03)
pub struct Cpu {
    // Registers
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
    pub sp: u8,
    pub pc: u16,

    /// Total cycles executed since power-on
    cycles: u64,

    /// Cycles the CPU is halted for (sprite DMA)
    stall: u32,

    /// Decode table, one entry per opcode
    opcodes: Box<[Option<OpEntry>; 256]>,
}

impl Cpu {
    /// Create a new CPU instance in the power-on state
    pub fn new() -> Self {
        Cpu {
            a: 0,
            x: 0,
            y: 0,
            p: flags::INTERRUPT_DISABLE | flags::UNUSED,
            sp: 0xFD,
            pc: 0,
            cycles: 0,
            stall: 0,
            opcodes: build_opcode_table(),
        }
    }

    /// Reset the CPU: load PC from the reset vector, set I, drop SP by 3
    pub fn reset(&mut self, bus: &mut impl CpuBus) {
        self.set_flag(flags::INTERRUPT_DISABLE, true);
        self.sp = 0xFD;
        self.pc = self.read16(bus, 0xFFFC);
        self.stall = 0;
        self.cycles += 7;
    }

    /// Total cycles executed
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Overwrite the cycle counter (save-state restore)
    pub fn set_cycles(&mut self, cycles: u64) {
        self.cycles = cycles;
    }

    /// Halt the CPU for `n` cycles (sprite DMA steals the bus)
    pub fn halt_cycles(&mut self, n: u32) {
        self.stall += n;
    }

    /// Formatted register state for tracing
    pub fn status_string(&self) -> String {
        format!(
            "A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} PC:{:04X} CYC:{}",
            self.a, self.x, self.y, self.p, self.sp, self.pc, self.cycles
        )
    }

    /// Set or clear a flag in the status register
    pub fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.p |= flag;
        } else {
            self.p &= !flag;
        }
    }

    /// Check if a flag is set
    pub fn get_flag(&self, flag: u8) -> bool {
        (self.p & flag) != 0
    }

    fn update_zero_and_negative_flags(&mut self, value: u8) {
        self.set_flag(flags::ZERO, value == 0);
        self.set_flag(flags::NEGATIVE, value & 0x80 != 0);
    }

    fn read16(&mut self, bus: &mut impl CpuBus, addr: u16) -> u16 {
        let low = bus.read(addr);
        let high = bus.read(addr.wrapping_add(1));
        combine_bytes(low, high)
    }

    /// 16-bit read that never leaves the page: the high byte of a pointer
    /// at 0xxxFF comes from 0xxx00. `JMP (addr)` and zero-page pointers
    /// both behave this way on real hardware.
    fn read16_page_wrapped(&mut self, bus: &mut impl CpuBus, addr: u16) -> u16 {
        let low = bus.read(addr);
        let high_addr = (addr & 0xFF00) | ((addr as u8).wrapping_add(1) as u16);
        let high = bus.read(high_addr);
        combine_bytes(low, high)
    }

    fn push(&mut self, bus: &mut impl CpuBus, value: u8) {
        bus.write(stack_address(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop(&mut self, bus: &mut impl CpuBus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(stack_address(self.sp))
    }

    fn push16(&mut self, bus: &mut impl CpuBus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    /// Push the status register; bit 5 is always 1, B reflects the push
    /// reason (true for BRK/PHP, false for hardware interrupts)
    fn push_status(&mut self, bus: &mut impl CpuBus, with_break: bool) {
        let mut status = self.p | flags::UNUSED;
        if with_break {
            status |= flags::BREAK;
        } else {
            status &= !flags::BREAK;
        }
        self.push(bus, status);
    }

    /// Service a non-maskable interrupt
    fn handle_nmi(&mut self, bus: &mut impl CpuBus) {
        self.push16(bus, self.pc);
        self.push_status(bus, false);
        self.set_flag(flags::INTERRUPT_DISABLE, true);
        self.pc = self.read16(bus, 0xFFFA);
    }

    /// Service a maskable interrupt request
    fn handle_irq(&mut self, bus: &mut impl CpuBus) {
        self.push16(bus, self.pc);
        self.push_status(bus, false);
        self.set_flag(flags::INTERRUPT_DISABLE, true);
        self.pc = self.read16(bus, 0xFFFE);
    }

    /// Resolve the operand address for an addressing mode without moving
    /// PC (which still points at the byte after the opcode). Returns the
    /// address and whether resolution crossed a page.
    fn operand_address(&mut self, bus: &mut impl CpuBus, mode: AddressingMode) -> (u16, bool) {
        match mode {
            AddressingMode::Implied | AddressingMode::Accumulator => (0, false),

            AddressingMode::Immediate => (self.pc, false),

            AddressingMode::ZeroPage => (bus.read(self.pc) as u16, false),

            AddressingMode::ZeroPageX => {
                let base = bus.read(self.pc);
                (base.wrapping_add(self.x) as u16, false)
            }

            AddressingMode::ZeroPageY => {
                let base = bus.read(self.pc);
                (base.wrapping_add(self.y) as u16, false)
            }

            AddressingMode::Relative => {
                let offset = bus.read(self.pc) as i8;
                // Branch targets are relative to the following instruction.
                let base = self.pc.wrapping_add(1);
                let target = base.wrapping_add(offset as u16);
                (target, (base & 0xFF00) != (target & 0xFF00))
            }

            AddressingMode::Absolute => (self.read16(bus, self.pc), false),

            AddressingMode::AbsoluteX => {
                let base = self.read16(bus, self.pc);
                let addr = base.wrapping_add(self.x as u16);
                (addr, (base & 0xFF00) != (addr & 0xFF00))
            }

            AddressingMode::AbsoluteY => {
                let base = self.read16(bus, self.pc);
                let addr = base.wrapping_add(self.y as u16);
                (addr, (base & 0xFF00) != (addr & 0xFF00))
            }

            AddressingMode::Indirect => {
                let ptr = self.read16(bus, self.pc);
                (self.read16_page_wrapped(bus, ptr), false)
            }

            AddressingMode::IndexedIndirect => {
                let ptr = bus.read(self.pc).wrapping_add(self.x) as u16;
                (self.read16_page_wrapped(bus, ptr), false)
            }

            AddressingMode::IndirectIndexed => {
                let ptr = bus.read(self.pc) as u16;
                let base = self.read16_page_wrapped(bus, ptr);
                let addr = base.wrapping_add(self.y as u16);
                (addr, (base & 0xFF00) != (addr & 0xFF00))
            }
        }
    }

    /// Execute one instruction, returning the number of CPU cycles
    /// consumed, or the faulting PC if the opcode has no table entry.
    pub fn step(&mut self, bus: &mut impl CpuBus) -> Result<u32, u16> {
        // A DMA stall consumes its cycles before anything else runs.
        if self.stall > 0 {
            let stalled = self.stall;
            self.stall = 0;
            self.cycles += stalled as u64;
            return Ok(stalled);
        }

        // Interrupt gate: NMI always wins, IRQ only with I clear.
        if bus.poll_nmi() {
            self.handle_nmi(bus);
            self.cycles += 7;
            return Ok(7);
        }
        if bus.poll_irq() && !self.get_flag(flags::INTERRUPT_DISABLE) {
            self.handle_irq(bus);
            self.cycles += 7;
            return Ok(7);
        }

        let opcode_pc = self.pc;
        let opcode = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);

        let entry = match self.opcodes[opcode as usize] {
            Some(entry) => entry,
            None => return Err(opcode_pc),
        };

        let (addr, page_crossed) = self.operand_address(bus, entry.mode);
        self.pc = self.pc.wrapping_add(entry.size as u16 - 1);

        let extra = self.execute(bus, entry, addr, page_crossed);
        let mut cycles = entry.cycles as u32 + extra;
        if entry.page_penalty && page_crossed {
            cycles += 1;
        }

        self.cycles += cycles as u64;
        Ok(cycles)
    }

    /// Shared body of the conditional branches. A taken branch costs one
    /// extra cycle, two if it lands on a different page.
    fn branch(&mut self, condition: bool, target: u16, page_crossed: bool) -> u32 {
        if !condition {
            return 0;
        }
        self.pc = target;
        if page_crossed {
            2
        } else {
            1
        }
    }

    fn adc_value(&mut self, value: u8) {
        let carry = self.get_flag(flags::CARRY) as u16;
        let sum = self.a as u16 + value as u16 + carry;
        let result = sum as u8;

        self.set_flag(flags::CARRY, sum > 0xFF);
        // Overflow: both operands agree on sign and the result disagrees.
        self.set_flag(flags::OVERFLOW, (self.a ^ result) & (value ^ result) & 0x80 != 0);
        self.a = result;
        self.update_zero_and_negative_flags(self.a);
    }

    fn sbc_value(&mut self, value: u8) {
        self.adc_value(!value);
    }

    fn compare(&mut self, register: u8, value: u8) {
        let result = register.wrapping_sub(value);
        self.set_flag(flags::CARRY, register >= value);
        self.update_zero_and_negative_flags(result);
    }

    fn asl_value(&mut self, value: u8) -> u8 {
        self.set_flag(flags::CARRY, value & 0x80 != 0);
        let result = value << 1;
        self.update_zero_and_negative_flags(result);
        result
    }

    fn lsr_value(&mut self, value: u8) -> u8 {
        self.set_flag(flags::CARRY, value & 0x01 != 0);
        let result = value >> 1;
        self.update_zero_and_negative_flags(result);
        result
    }

    fn rol_value(&mut self, value: u8) -> u8 {
        let carry_in = self.get_flag(flags::CARRY) as u8;
        self.set_flag(flags::CARRY, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.update_zero_and_negative_flags(result);
        result
    }

    fn ror_value(&mut self, value: u8) -> u8 {
        let carry_in = (self.get_flag(flags::CARRY) as u8) << 7;
        self.set_flag(flags::CARRY, value & 0x01 != 0);
        let result = (value >> 1) | carry_in;
        self.update_zero_and_negative_flags(result);
        result
    }

    /// Read-modify-write helper. The 6502 writes the unmodified value back
    /// before the modified one; serial-port mappers depend on seeing both.
    fn rmw(
        &mut self,
        bus: &mut impl CpuBus,
        addr: u16,
        modify: impl FnOnce(&mut Self, u8) -> u8,
    ) -> u8 {
        let value = bus.read(addr);
        bus.write(addr, value);
        let result = modify(self, value);
        bus.write(addr, result);
        result
    }

    fn execute(
        &mut self,
        bus: &mut impl CpuBus,
        entry: OpEntry,
        addr: u16,
        page_crossed: bool,
    ) -> u32 {
        use Instruction::*;

        match entry.instruction {
            Adc => {
                let value = bus.read(addr);
                self.adc_value(value);
            }
            And => {
                self.a &= bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Asl => {
                if entry.mode == AddressingMode::Accumulator {
                    self.a = self.asl_value(self.a);
                } else {
                    self.rmw(bus, addr, Self::asl_value);
                }
            }
            Bcc => return self.branch(!self.get_flag(flags::CARRY), addr, page_crossed),
            Bcs => return self.branch(self.get_flag(flags::CARRY), addr, page_crossed),
            Beq => return self.branch(self.get_flag(flags::ZERO), addr, page_crossed),
            Bit => {
                let value = bus.read(addr);
                self.set_flag(flags::ZERO, self.a & value == 0);
                self.set_flag(flags::NEGATIVE, value & 0x80 != 0);
                self.set_flag(flags::OVERFLOW, value & 0x40 != 0);
            }
            Bmi => return self.branch(self.get_flag(flags::NEGATIVE), addr, page_crossed),
            Bne => return self.branch(!self.get_flag(flags::ZERO), addr, page_crossed),
            Bpl => return self.branch(!self.get_flag(flags::NEGATIVE), addr, page_crossed),
            Brk => {
                // BRK pushes the address two past the opcode byte.
                self.push16(bus, self.pc.wrapping_add(1));
                self.push_status(bus, true);
                self.set_flag(flags::INTERRUPT_DISABLE, true);
                self.pc = self.read16(bus, 0xFFFE);
            }
            Bvc => return self.branch(!self.get_flag(flags::OVERFLOW), addr, page_crossed),
            Bvs => return self.branch(self.get_flag(flags::OVERFLOW), addr, page_crossed),
            Clc => self.set_flag(flags::CARRY, false),
            Cld => self.set_flag(flags::DECIMAL, false),
            Cli => self.set_flag(flags::INTERRUPT_DISABLE, false),
            Clv => self.set_flag(flags::OVERFLOW, false),
            Cmp => {
                let value = bus.read(addr);
                self.compare(self.a, value);
            }
            Cpx => {
                let value = bus.read(addr);
                self.compare(self.x, value);
            }
            Cpy => {
                let value = bus.read(addr);
                self.compare(self.y, value);
            }
            Dec => {
                self.rmw(bus, addr, |cpu, v| {
                    let result = v.wrapping_sub(1);
                    cpu.update_zero_and_negative_flags(result);
                    result
                });
            }
            Dex => {
                self.x = self.x.wrapping_sub(1);
                self.update_zero_and_negative_flags(self.x);
            }
            Dey => {
                self.y = self.y.wrapping_sub(1);
                self.update_zero_and_negative_flags(self.y);
            }
            Eor => {
                self.a ^= bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Inc => {
                self.rmw(bus, addr, |cpu, v| {
                    let result = v.wrapping_add(1);
                    cpu.update_zero_and_negative_flags(result);
                    result
                });
            }
            Inx => {
                self.x = self.x.wrapping_add(1);
                self.update_zero_and_negative_flags(self.x);
            }
            Iny => {
                self.y = self.y.wrapping_add(1);
                self.update_zero_and_negative_flags(self.y);
            }
            Jmp => self.pc = addr,
            Jsr => {
                // JSR pushes the address of its own last byte.
                self.push16(bus, self.pc.wrapping_sub(1));
                self.pc = addr;
            }
            Lda => {
                self.a = bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Ldx => {
                self.x = bus.read(addr);
                self.update_zero_and_negative_flags(self.x);
            }
            Ldy => {
                self.y = bus.read(addr);
                self.update_zero_and_negative_flags(self.y);
            }
            Lsr => {
                if entry.mode == AddressingMode::Accumulator {
                    self.a = self.lsr_value(self.a);
                } else {
                    self.rmw(bus, addr, Self::lsr_value);
                }
            }
            Nop => {}
            Ora => {
                self.a |= bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Pha => self.push(bus, self.a),
            Php => self.push_status(bus, true),
            Pla => {
                self.a = self.pop(bus);
                self.update_zero_and_negative_flags(self.a);
            }
            Plp => {
                let status = self.pop(bus);
                self.p = (status & !flags::BREAK) | flags::UNUSED;
            }
            Rol => {
                if entry.mode == AddressingMode::Accumulator {
                    self.a = self.rol_value(self.a);
                } else {
                    self.rmw(bus, addr, Self::rol_value);
                }
            }
            Ror => {
                if entry.mode == AddressingMode::Accumulator {
                    self.a = self.ror_value(self.a);
                } else {
                    self.rmw(bus, addr, Self::ror_value);
                }
            }
            Rti => {
                let status = self.pop(bus);
                self.p = (status & !flags::BREAK) | flags::UNUSED;
                let low = self.pop(bus);
                let high = self.pop(bus);
                self.pc = combine_bytes(low, high);
            }
            Rts => {
                let low = self.pop(bus);
                let high = self.pop(bus);
                self.pc = combine_bytes(low, high).wrapping_add(1);
            }
            Sbc => {
                let value = bus.read(addr);
                self.sbc_value(value);
            }
            Sec => self.set_flag(flags::CARRY, true),
            Sed => self.set_flag(flags::DECIMAL, true),
            Sei => self.set_flag(flags::INTERRUPT_DISABLE, true),
            Sta => bus.write(addr, self.a),
            Stx => bus.write(addr, self.x),
            Sty => bus.write(addr, self.y),
            Tax => {
                self.x = self.a;
                self.update_zero_and_negative_flags(self.x);
            }
            Tay => {
                self.y = self.a;
                self.update_zero_and_negative_flags(self.y);
            }
            Tsx => {
                self.x = self.sp;
                self.update_zero_and_negative_flags(self.x);
            }
            Txa => {
                self.a = self.x;
                self.update_zero_and_negative_flags(self.a);
            }
            Txs => self.sp = self.x,
            Tya => {
                self.a = self.y;
                self.update_zero_and_negative_flags(self.a);
            }

            // Illegal opcodes

            Alr => {
                self.a &= bus.read(addr);
                self.a = self.lsr_value(self.a);
            }
            Anc => {
                self.a &= bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
                self.set_flag(flags::CARRY, self.a & 0x80 != 0);
            }
            Arr => {
                self.a &= bus.read(addr);
                let carry_in = (self.get_flag(flags::CARRY) as u8) << 7;
                self.a = (self.a >> 1) | carry_in;
                self.update_zero_and_negative_flags(self.a);
                self.set_flag(flags::CARRY, self.a & 0x40 != 0);
                self.set_flag(flags::OVERFLOW, ((self.a >> 6) ^ (self.a >> 5)) & 0x01 != 0);
            }
            Axs => {
                let value = bus.read(addr);
                let operand = self.a & self.x;
                self.set_flag(flags::CARRY, operand >= value);
                self.x = operand.wrapping_sub(value);
                self.update_zero_and_negative_flags(self.x);
            }
            Lax => {
                self.a = bus.read(addr);
                self.x = self.a;
                self.update_zero_and_negative_flags(self.a);
            }
            Sax => bus.write(addr, self.a & self.x),
            Dcp => {
                let result = self.rmw(bus, addr, |_, v| v.wrapping_sub(1));
                self.compare(self.a, result);
            }
            Isc => {
                let result = self.rmw(bus, addr, |_, v| v.wrapping_add(1));
                self.sbc_value(result);
            }
            Rla => {
                let result = self.rmw(bus, addr, Self::rol_value);
                self.a &= result;
                self.update_zero_and_negative_flags(self.a);
            }
            Rra => {
                let result = self.rmw(bus, addr, Self::ror_value);
                self.adc_value(result);
            }
            Slo => {
                let result = self.rmw(bus, addr, Self::asl_value);
                self.a |= result;
                self.update_zero_and_negative_flags(self.a);
            }
            Sre => {
                let result = self.rmw(bus, addr, Self::lsr_value);
                self.a ^= result;
                self.update_zero_and_negative_flags(self.a);
            }
            Skb | Ign => {
                // Multi-byte NOPs still perform the operand read.
                bus.read(addr);
            }
        }

        0
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Cpu::new()
    }
}

/// Build the 256-entry decode table. Opcodes left `None` are the JAM/KIL
/// family and the handful of unstable illegals no shipped game depends on.
#[rustfmt::skip]
fn build_opcode_table() -> Box<[Option<OpEntry>; 256]> {
    use AddressingMode::*;
    use Instruction::*;

    let mut table: Box<[Option<OpEntry>; 256]> = Box::new([None; 256]);

    let mut set = |code: usize, instruction, mode, size: u8, cycles: u8, page_penalty: bool| {
        table[code] = Some(OpEntry { instruction, mode, size, cycles, page_penalty });
    };

    // ADC
    set(0x69, Adc, Immediate, 2, 2, false);
    set(0x65, Adc, ZeroPage, 2, 3, false);
    set(0x75, Adc, ZeroPageX, 2, 4, false);
    set(0x6D, Adc, Absolute, 3, 4, false);
    set(0x7D, Adc, AbsoluteX, 3, 4, true);
    set(0x79, Adc, AbsoluteY, 3, 4, true);
    set(0x61, Adc, IndexedIndirect, 2, 6, false);
    set(0x71, Adc, IndirectIndexed, 2, 5, true);

    // AND
    set(0x29, And, Immediate, 2, 2, false);
    set(0x25, And, ZeroPage, 2, 3, false);
    set(0x35, And, ZeroPageX, 2, 4, false);
    set(0x2D, And, Absolute, 3, 4, false);
    set(0x3D, And, AbsoluteX, 3, 4, true);
    set(0x39, And, AbsoluteY, 3, 4, true);
    set(0x21, And, IndexedIndirect, 2, 6, false);
    set(0x31, And, IndirectIndexed, 2, 5, true);

    // ASL
    set(0x0A, Asl, Accumulator, 1, 2, false);
    set(0x06, Asl, ZeroPage, 2, 5, false);
    set(0x16, Asl, ZeroPageX, 2, 6, false);
    set(0x0E, Asl, Absolute, 3, 6, false);
    set(0x1E, Asl, AbsoluteX, 3, 7, false);

    // Branches
    set(0x90, Bcc, Relative, 2, 2, false);
    set(0xB0, Bcs, Relative, 2, 2, false);
    set(0xF0, Beq, Relative, 2, 2, false);
    set(0x30, Bmi, Relative, 2, 2, false);
    set(0xD0, Bne, Relative, 2, 2, false);
    set(0x10, Bpl, Relative, 2, 2, false);
    set(0x50, Bvc, Relative, 2, 2, false);
    set(0x70, Bvs, Relative, 2, 2, false);

    // BIT
    set(0x24, Bit, ZeroPage, 2, 3, false);
    set(0x2C, Bit, Absolute, 3, 4, false);

    // BRK
    set(0x00, Brk, Implied, 1, 7, false);

    // Flag operations
    set(0x18, Clc, Implied, 1, 2, false);
    set(0xD8, Cld, Implied, 1, 2, false);
    set(0x58, Cli, Implied, 1, 2, false);
    set(0xB8, Clv, Implied, 1, 2, false);
    set(0x38, Sec, Implied, 1, 2, false);
    set(0xF8, Sed, Implied, 1, 2, false);
    set(0x78, Sei, Implied, 1, 2, false);

    // CMP
    set(0xC9, Cmp, Immediate, 2, 2, false);
    set(0xC5, Cmp, ZeroPage, 2, 3, false);
    set(0xD5, Cmp, ZeroPageX, 2, 4, false);
    set(0xCD, Cmp, Absolute, 3, 4, false);
    set(0xDD, Cmp, AbsoluteX, 3, 4, true);
    set(0xD9, Cmp, AbsoluteY, 3, 4, true);
    set(0xC1, Cmp, IndexedIndirect, 2, 6, false);
    set(0xD1, Cmp, IndirectIndexed, 2, 5, true);

    // CPX / CPY
    set(0xE0, Cpx, Immediate, 2, 2, false);
    set(0xE4, Cpx, ZeroPage, 2, 3, false);
    set(0xEC, Cpx, Absolute, 3, 4, false);
    set(0xC0, Cpy, Immediate, 2, 2, false);
    set(0xC4, Cpy, ZeroPage, 2, 3, false);
    set(0xCC, Cpy, Absolute, 3, 4, false);

    // DEC / DEX / DEY
    set(0xC6, Dec, ZeroPage, 2, 5, false);
    set(0xD6, Dec, ZeroPageX, 2, 6, false);
    set(0xCE, Dec, Absolute, 3, 6, false);
    set(0xDE, Dec, AbsoluteX, 3, 7, false);
    set(0xCA, Dex, Implied, 1, 2, false);
    set(0x88, Dey, Implied, 1, 2, false);

    // EOR
    set(0x49, Eor, Immediate, 2, 2, false);
    set(0x45, Eor, ZeroPage, 2, 3, false);
    set(0x55, Eor, ZeroPageX, 2, 4, false);
    set(0x4D, Eor, Absolute, 3, 4, false);
    set(0x5D, Eor, AbsoluteX, 3, 4, true);
    set(0x59, Eor, AbsoluteY, 3, 4, true);
    set(0x41, Eor, IndexedIndirect, 2, 6, false);
    set(0x51, Eor, IndirectIndexed, 2, 5, true);

    // INC / INX / INY
    set(0xE6, Inc, ZeroPage, 2, 5, false);
    set(0xF6, Inc, ZeroPageX, 2, 6, false);
    set(0xEE, Inc, Absolute, 3, 6, false);
    set(0xFE, Inc, AbsoluteX, 3, 7, false);
    set(0xE8, Inx, Implied, 1, 2, false);
    set(0xC8, Iny, Implied, 1, 2, false);

    // JMP / JSR
    set(0x4C, Jmp, Absolute, 3, 3, false);
    set(0x6C, Jmp, Indirect, 3, 5, false);
    set(0x20, Jsr, Absolute, 3, 6, false);

    // LDA
    set(0xA9, Lda, Immediate, 2, 2, false);
    set(0xA5, Lda, ZeroPage, 2, 3, false);
    set(0xB5, Lda, ZeroPageX, 2, 4, false);
    set(0xAD, Lda, Absolute, 3, 4, false);
    set(0xBD, Lda, AbsoluteX, 3, 4, true);
    set(0xB9, Lda, AbsoluteY, 3, 4, true);
    set(0xA1, Lda, IndexedIndirect, 2, 6, false);
    set(0xB1, Lda, IndirectIndexed, 2, 5, true);

    // LDX / LDY
    set(0xA2, Ldx, Immediate, 2, 2, false);
    set(0xA6, Ldx, ZeroPage, 2, 3, false);
    set(0xB6, Ldx, ZeroPageY, 2, 4, false);
    set(0xAE, Ldx, Absolute, 3, 4, false);
    set(0xBE, Ldx, AbsoluteY, 3, 4, true);
    set(0xA0, Ldy, Immediate, 2, 2, false);
    set(0xA4, Ldy, ZeroPage, 2, 3, false);
    set(0xB4, Ldy, ZeroPageX, 2, 4, false);
    set(0xAC, Ldy, Absolute, 3, 4, false);
    set(0xBC, Ldy, AbsoluteX, 3, 4, true);

    // LSR
    set(0x4A, Lsr, Accumulator, 1, 2, false);
    set(0x46, Lsr, ZeroPage, 2, 5, false);
    set(0x56, Lsr, ZeroPageX, 2, 6, false);
    set(0x4E, Lsr, Absolute, 3, 6, false);
    set(0x5E, Lsr, AbsoluteX, 3, 7, false);

    // NOP
    set(0xEA, Nop, Implied, 1, 2, false);

    // ORA
    set(0x09, Ora, Immediate, 2, 2, false);
    set(0x05, Ora, ZeroPage, 2, 3, false);
    set(0x15, Ora, ZeroPageX, 2, 4, false);
    set(0x0D, Ora, Absolute, 3, 4, false);
    set(0x1D, Ora, AbsoluteX, 3, 4, true);
    set(0x19, Ora, AbsoluteY, 3, 4, true);
    set(0x01, Ora, IndexedIndirect, 2, 6, false);
    set(0x11, Ora, IndirectIndexed, 2, 5, true);

    // Stack operations
    set(0x48, Pha, Implied, 1, 3, false);
    set(0x08, Php, Implied, 1, 3, false);
    set(0x68, Pla, Implied, 1, 4, false);
    set(0x28, Plp, Implied, 1, 4, false);

    // ROL / ROR
    set(0x2A, Rol, Accumulator, 1, 2, false);
    set(0x26, Rol, ZeroPage, 2, 5, false);
    set(0x36, Rol, ZeroPageX, 2, 6, false);
    set(0x2E, Rol, Absolute, 3, 6, false);
    set(0x3E, Rol, AbsoluteX, 3, 7, false);
    set(0x6A, Ror, Accumulator, 1, 2, false);
    set(0x66, Ror, ZeroPage, 2, 5, false);
    set(0x76, Ror, ZeroPageX, 2, 6, false);
    set(0x6E, Ror, Absolute, 3, 6, false);
    set(0x7E, Ror, AbsoluteX, 3, 7, false);

    // RTI / RTS
    set(0x40, Rti, Implied, 1, 6, false);
    set(0x60, Rts, Implied, 1, 6, false);

    // SBC (0xEB is the illegal duplicate)
    set(0xE9, Sbc, Immediate, 2, 2, false);
    set(0xEB, Sbc, Immediate, 2, 2, false);
    set(0xE5, Sbc, ZeroPage, 2, 3, false);
    set(0xF5, Sbc, ZeroPageX, 2, 4, false);
    set(0xED, Sbc, Absolute, 3, 4, false);
    set(0xFD, Sbc, AbsoluteX, 3, 4, true);
    set(0xF9, Sbc, AbsoluteY, 3, 4, true);
    set(0xE1, Sbc, IndexedIndirect, 2, 6, false);
    set(0xF1, Sbc, IndirectIndexed, 2, 5, true);

    // STA / STX / STY
    set(0x85, Sta, ZeroPage, 2, 3, false);
    set(0x95, Sta, ZeroPageX, 2, 4, false);
    set(0x8D, Sta, Absolute, 3, 4, false);
    set(0x9D, Sta, AbsoluteX, 3, 5, false);
    set(0x99, Sta, AbsoluteY, 3, 5, false);
    set(0x81, Sta, IndexedIndirect, 2, 6, false);
    set(0x91, Sta, IndirectIndexed, 2, 6, false);
    set(0x86, Stx, ZeroPage, 2, 3, false);
    set(0x96, Stx, ZeroPageY, 2, 4, false);
    set(0x8E, Stx, Absolute, 3, 4, false);
    set(0x84, Sty, ZeroPage, 2, 3, false);
    set(0x94, Sty, ZeroPageX, 2, 4, false);
    set(0x8C, Sty, Absolute, 3, 4, false);

    // Transfers
    set(0xAA, Tax, Implied, 1, 2, false);
    set(0xA8, Tay, Implied, 1, 2, false);
    set(0xBA, Tsx, Implied, 1, 2, false);
    set(0x8A, Txa, Implied, 1, 2, false);
    set(0x9A, Txs, Implied, 1, 2, false);
    set(0x98, Tya, Implied, 1, 2, false);

    // Illegal opcodes

    // LAX
    set(0xA7, Lax, ZeroPage, 2, 3, false);
    set(0xB7, Lax, ZeroPageY, 2, 4, false);
    set(0xAF, Lax, Absolute, 3, 4, false);
    set(0xBF, Lax, AbsoluteY, 3, 4, true);
    set(0xA3, Lax, IndexedIndirect, 2, 6, false);
    set(0xB3, Lax, IndirectIndexed, 2, 5, true);

    // SAX
    set(0x87, Sax, ZeroPage, 2, 3, false);
    set(0x97, Sax, ZeroPageY, 2, 4, false);
    set(0x8F, Sax, Absolute, 3, 4, false);
    set(0x83, Sax, IndexedIndirect, 2, 6, false);

    // DCP
    set(0xC7, Dcp, ZeroPage, 2, 5, false);
    set(0xD7, Dcp, ZeroPageX, 2, 6, false);
    set(0xCF, Dcp, Absolute, 3, 6, false);
    set(0xDF, Dcp, AbsoluteX, 3, 7, false);
    set(0xDB, Dcp, AbsoluteY, 3, 7, false);
    set(0xC3, Dcp, IndexedIndirect, 2, 8, false);
    set(0xD3, Dcp, IndirectIndexed, 2, 8, false);

    // ISC
    set(0xE7, Isc, ZeroPage, 2, 5, false);
    set(0xF7, Isc, ZeroPageX, 2, 6, false);
    set(0xEF, Isc, Absolute, 3, 6, false);
    set(0xFF, Isc, AbsoluteX, 3, 7, false);
    set(0xFB, Isc, AbsoluteY, 3, 7, false);
    set(0xE3, Isc, IndexedIndirect, 2, 8, false);
    set(0xF3, Isc, IndirectIndexed, 2, 8, false);

    // SLO
    set(0x07, Slo, ZeroPage, 2, 5, false);
    set(0x17, Slo, ZeroPageX, 2, 6, false);
    set(0x0F, Slo, Absolute, 3, 6, false);
    set(0x1F, Slo, AbsoluteX, 3, 7, false);
    set(0x1B, Slo, AbsoluteY, 3, 7, false);
    set(0x03, Slo, IndexedIndirect, 2, 8, false);
    set(0x13, Slo, IndirectIndexed, 2, 8, false);

    // RLA
    set(0x27, Rla, ZeroPage, 2, 5, false);
    set(0x37, Rla, ZeroPageX, 2, 6, false);
    set(0x2F, Rla, Absolute, 3, 6, false);
    set(0x3F, Rla, AbsoluteX, 3, 7, false);
    set(0x3B, Rla, AbsoluteY, 3, 7, false);
    set(0x23, Rla, IndexedIndirect, 2, 8, false);
    set(0x33, Rla, IndirectIndexed, 2, 8, false);

    // SRE
    set(0x47, Sre, ZeroPage, 2, 5, false);
    set(0x57, Sre, ZeroPageX, 2, 6, false);
    set(0x4F, Sre, Absolute, 3, 6, false);
    set(0x5F, Sre, AbsoluteX, 3, 7, false);
    set(0x5B, Sre, AbsoluteY, 3, 7, false);
    set(0x43, Sre, IndexedIndirect, 2, 8, false);
    set(0x53, Sre, IndirectIndexed, 2, 8, false);

    // RRA
    set(0x67, Rra, ZeroPage, 2, 5, false);
    set(0x77, Rra, ZeroPageX, 2, 6, false);
    set(0x6F, Rra, Absolute, 3, 6, false);
    set(0x7F, Rra, AbsoluteX, 3, 7, false);
    set(0x7B, Rra, AbsoluteY, 3, 7, false);
    set(0x63, Rra, IndexedIndirect, 2, 8, false);
    set(0x73, Rra, IndirectIndexed, 2, 8, false);

    // ALR / ANC / ARR / AXS
    set(0x4B, Alr, Immediate, 2, 2, false);
    set(0x0B, Anc, Immediate, 2, 2, false);
    set(0x2B, Anc, Immediate, 2, 2, false);
    set(0x6B, Arr, Immediate, 2, 2, false);
    set(0xCB, Axs, Immediate, 2, 2, false);

    // Two-byte NOPs (SKB)
    set(0x80, Skb, Immediate, 2, 2, false);
    set(0x82, Skb, Immediate, 2, 2, false);
    set(0x89, Skb, Immediate, 2, 2, false);
    set(0xC2, Skb, Immediate, 2, 2, false);
    set(0xE2, Skb, Immediate, 2, 2, false);

    // Multi-byte NOPs (IGN) and implied NOP variants
    set(0x04, Ign, ZeroPage, 2, 3, false);
    set(0x44, Ign, ZeroPage, 2, 3, false);
    set(0x64, Ign, ZeroPage, 2, 3, false);
    set(0x0C, Ign, Absolute, 3, 4, false);
    set(0x14, Ign, ZeroPageX, 2, 4, false);
    set(0x34, Ign, ZeroPageX, 2, 4, false);
    set(0x54, Ign, ZeroPageX, 2, 4, false);
    set(0x74, Ign, ZeroPageX, 2, 4, false);
    set(0xD4, Ign, ZeroPageX, 2, 4, false);
    set(0xF4, Ign, ZeroPageX, 2, 4, false);
    set(0x1C, Ign, AbsoluteX, 3, 4, true);
    set(0x3C, Ign, AbsoluteX, 3, 4, true);
    set(0x5C, Ign, AbsoluteX, 3, 4, true);
    set(0x7C, Ign, AbsoluteX, 3, 4, true);
    set(0xDC, Ign, AbsoluteX, 3, 4, true);
    set(0xFC, Ign, AbsoluteX, 3, 4, true);
    set(0x1A, Nop, Implied, 1, 2, false);
    set(0x3A, Nop, Implied, 1, 2, false);
    set(0x5A, Nop, Implied, 1, 2, false);
    set(0x7A, Nop, Implied, 1, 2, false);
    set(0xDA, Nop, Implied, 1, 2, false);
    set(0xFA, Nop, Implied, 1, 2, false);

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        mem: Vec<u8>,
        nmi: bool,
        irq: bool,
    }

    impl TestBus {
        fn new() -> Self {
            TestBus {
                mem: vec![0; 0x10000],
                nmi: false,
                irq: false,
            }
        }

        /// Load a program at `addr` and point the reset vector at it
        fn with_program(addr: u16, program: &[u8]) -> (Self, Cpu) {
            let mut bus = TestBus::new();
            bus.mem[addr as usize..addr as usize + program.len()].copy_from_slice(program);
            bus.mem[0xFFFC] = addr as u8;
            bus.mem[0xFFFD] = (addr >> 8) as u8;
            let mut cpu = Cpu::new();
            cpu.reset(&mut bus);
            (bus, cpu)
        }
    }

    impl CpuBus for TestBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }

        fn write(&mut self, addr: u16, value: u8) {
            self.mem[addr as usize] = value;
        }

        fn poll_nmi(&mut self) -> bool {
            std::mem::take(&mut self.nmi)
        }

        fn poll_irq(&mut self) -> bool {
            self.irq
        }
    }

    #[test]
    fn reset_loads_vector_and_sets_i() {
        let (_, cpu) = TestBus::with_program(0xC000, &[0xEA]);
        assert_eq!(cpu.pc, 0xC000);
        assert!(cpu.get_flag(flags::INTERRUPT_DISABLE));
        assert_eq!(cpu.sp, 0xFD);
    }

    #[test]
    fn lda_sets_zero_and_negative() {
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0xA9, 0x00, 0xA9, 0x80]);
        cpu.step(&mut bus).unwrap();
        assert!(cpu.get_flag(flags::ZERO));
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.get_flag(flags::NEGATIVE));
        assert!(!cpu.get_flag(flags::ZERO));
    }

    #[test]
    fn adc_reports_carry_and_overflow() {
        // 0x7F + 0x01 = 0x80: signed overflow, no carry.
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0xA9, 0x7F, 0x69, 0x01]);
        cpu.step(&mut bus).unwrap();
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.get_flag(flags::OVERFLOW));
        assert!(!cpu.get_flag(flags::CARRY));

        // 0xFF + 0x01 = carry out, no signed overflow.
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0xA9, 0xFF, 0x69, 0x01]);
        cpu.step(&mut bus).unwrap();
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.get_flag(flags::CARRY));
        assert!(!cpu.get_flag(flags::OVERFLOW));
        assert!(cpu.get_flag(flags::ZERO));
    }

    #[test]
    fn jmp_indirect_wraps_within_page() {
        let mut bus = TestBus::new();
        bus.mem[0x02FF] = 0x34;
        bus.mem[0x0200] = 0x12; // high byte comes from 0x0200, not 0x0300
        bus.mem[0x0300] = 0xFF;
        bus.mem[0x8000] = 0x6C;
        bus.mem[0x8001] = 0xFF;
        bus.mem[0x8002] = 0x02;
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0x1234);
    }

    #[test]
    fn branch_cycle_penalties() {
        // Not taken: 2 cycles.
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0x38, 0x90, 0x10]); // SEC; BCC
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.step(&mut bus).unwrap(), 2);

        // Taken, same page: 3 cycles.
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0xB0, 0x10]); // BCS (C=0)
        cpu.set_flag(flags::CARRY, true);
        assert_eq!(cpu.step(&mut bus).unwrap(), 3);
        assert_eq!(cpu.pc, 0x8012);

        // Taken, crossing a page: 4 cycles.
        let (mut bus, mut cpu) = TestBus::with_program(0x80F0, &[0xB0, 0x20]);
        cpu.set_flag(flags::CARRY, true);
        assert_eq!(cpu.step(&mut bus).unwrap(), 4);
        assert_eq!(cpu.pc, 0x8112);
    }

    #[test]
    fn page_cross_read_penalty() {
        // LDA 0x80FF,X with X=1 crosses into 0x8100.
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0xBD, 0xFF, 0x80]);
        cpu.x = 1;
        assert_eq!(cpu.step(&mut bus).unwrap(), 5);

        // Same read without a crossing costs the base 4.
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0xBD, 0x00, 0x80]);
        cpu.x = 1;
        assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    }

    #[test]
    fn pushed_status_always_has_bit5() {
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0x08]); // PHP
        cpu.p = 0; // even with everything cleared...
        cpu.step(&mut bus).unwrap();
        let pushed = bus.mem[0x0100 + cpu.sp as usize + 1];
        assert!(pushed & flags::UNUSED != 0);
        assert!(pushed & flags::BREAK != 0); // PHP pushes B set
    }

    #[test]
    fn brk_and_rti_round_trip() {
        let mut bus = TestBus::new();
        bus.mem[0x8000] = 0x00; // BRK
        bus.mem[0x9000] = 0x40; // RTI at the interrupt handler
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0x90;

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0x9000);
        assert!(cpu.get_flag(flags::INTERRUPT_DISABLE));

        cpu.step(&mut bus).unwrap(); // RTI
        assert_eq!(cpu.pc, 0x8002); // BRK return address skips the padding byte
    }

    #[test]
    fn irq_respects_interrupt_disable() {
        let mut bus = TestBus::new();
        bus.mem[0x8000] = 0xEA;
        bus.mem[0x8001] = 0x58; // CLI
        bus.mem[0x8002] = 0xEA;
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0x90;

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        bus.irq = true;

        cpu.step(&mut bus).unwrap(); // NOP, I set: no interrupt
        assert_eq!(cpu.pc, 0x8001);
        cpu.step(&mut bus).unwrap(); // CLI
        cpu.step(&mut bus).unwrap(); // now the IRQ is serviced
        assert_eq!(cpu.pc, 0x9000);
    }

    #[test]
    fn nmi_fires_even_with_i_set() {
        let mut bus = TestBus::new();
        bus.mem[0x8000] = 0xEA;
        bus.mem[0xFFFA] = 0x00;
        bus.mem[0xFFFB] = 0xA0;
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        bus.nmi = true;
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0xA000);

        // The pushed status has B clear.
        let pushed = bus.mem[0x0100 + cpu.sp as usize + 1];
        assert!(pushed & flags::BREAK == 0);
        assert!(pushed & flags::UNUSED != 0);
    }

    #[test]
    fn unknown_opcode_reports_faulting_pc() {
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0x02]); // JAM
        assert_eq!(cpu.step(&mut bus), Err(0x8000));
    }

    #[test]
    fn lax_loads_both_registers() {
        let mut bus = TestBus::new();
        bus.mem[0x0010] = 0x5A;
        bus.mem[0x8000] = 0xA7; // LAX zp
        bus.mem[0x8001] = 0x10;
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.a, 0x5A);
        assert_eq!(cpu.x, 0x5A);
    }

    #[test]
    fn dcp_decrements_then_compares() {
        let mut bus = TestBus::new();
        bus.mem[0x0010] = 0x41;
        bus.mem[0x8000] = 0xA9; // LDA #0x40
        bus.mem[0x8001] = 0x40;
        bus.mem[0x8002] = 0xC7; // DCP zp 0x10
        bus.mem[0x8003] = 0x10;
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus).unwrap();
        cpu.step(&mut bus).unwrap();
        assert_eq!(bus.mem[0x0010], 0x40);
        assert!(cpu.get_flag(flags::ZERO)); // A == decremented value
        assert!(cpu.get_flag(flags::CARRY));
    }

    #[test]
    fn rmw_writes_old_value_first() {
        // Observed through a bus that records the write sequence.
        struct RecordingBus {
            inner: TestBus,
            writes: Vec<(u16, u8)>,
        }

        impl CpuBus for RecordingBus {
            fn read(&mut self, addr: u16) -> u8 {
                self.inner.read(addr)
            }
            fn write(&mut self, addr: u16, value: u8) {
                self.writes.push((addr, value));
                self.inner.write(addr, value);
            }
            fn poll_nmi(&mut self) -> bool {
                false
            }
            fn poll_irq(&mut self) -> bool {
                false
            }
        }

        let (bus, mut cpu) = TestBus::with_program(0x8000, &[0xE6, 0x10]); // INC zp
        let mut bus = RecordingBus { inner: bus, writes: Vec::new() };
        bus.inner.mem[0x0010] = 7;
        cpu.step(&mut bus).unwrap();
        assert_eq!(bus.writes, vec![(0x0010, 7), (0x0010, 8)]);
    }

    #[test]
    fn halt_cycles_are_consumed_before_execution() {
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0xEA]);
        cpu.halt_cycles(513);
        assert_eq!(cpu.step(&mut bus).unwrap(), 513);
        assert_eq!(cpu.pc, 0x8000); // nothing executed yet
        assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    }

    #[test]
    fn stack_pointer_wraps_within_page_one() {
        let (mut bus, mut cpu) = TestBus::with_program(0x8000, &[0x48, 0x48, 0x48]);
        cpu.sp = 0x01;
        for _ in 0..3 {
            cpu.step(&mut bus).unwrap();
        }
        assert_eq!(cpu.sp, 0xFE); // 0x01 -> 0x00 -> 0xFF -> 0xFE
    }
}
