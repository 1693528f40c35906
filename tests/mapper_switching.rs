//! Bank switching exercised end-to-end: programs running from the fixed
//! bank flip mapper registers and observe the switch through the bus.

mod common;

use common::{Program, RomBuilder};
use famicore::{Nes, RomError};

#[test]
fn uxrom_switches_the_low_window_and_keeps_the_fixed_bank() {
    // Distinct marker bytes at offset 0x100 of each 16KB bank.
    let program = Program::new()
        .lda_abs(0x8100)
        .sta_zp(0x00) // bank 0 marker
        .lda_imm(0x01)
        .sta_abs(0x8000) // select bank 1
        .lda_abs(0x8100)
        .sta_zp(0x01) // bank 1 marker
        .lda_abs(0xC100)
        .sta_zp(0x02); // fixed bank marker
    let spin_at = 0xC000 + program.len() as u16;
    let program = program.spin(spin_at);

    let rom = RomBuilder::new(2, 0, 2)
        .with_prg(0x0100, &[0x11])
        .with_prg(0x4100, &[0x22])
        .with_code(0xC000, program.bytes())
        .with_reset_vector(0xC000)
        .build();

    let mut nes = Nes::new();
    nes.load_rom(&rom).unwrap();
    nes.frame();

    assert_eq!(nes.ram()[0x00], 0x11);
    assert_eq!(nes.ram()[0x01], 0x22);
    // The fixed bank is the last one; 0xC100 maps to PRG offset 0x4100.
    assert_eq!(nes.ram()[0x02], 0x22);
}

#[test]
fn gxrom_switches_prg_in_32k_pages() {
    let program = Program::new()
        .lda_abs(0x8100)
        .sta_zp(0x00)
        .lda_imm(0x10) // PRG page 1 in bits 4-5
        .sta_abs(0x8000)
        .lda_abs(0x8100)
        .sta_zp(0x01);
    // The program must survive the switch: place it identically in both
    // 32K pages, in the 0xC000 half.
    let spin_at = 0xC000 + program.len() as u16;
    let program = program.spin(spin_at);

    let rom = RomBuilder::new(4, 1, 66)
        .with_prg(0x0100, &[0x11])
        .with_prg(0x8100, &[0x22])
        .with_prg(0x4000, program.bytes())
        .with_prg(0xC000, program.bytes())
        .with_prg(0x7FFC, &[0x00, 0xC0])
        .with_prg(0xFFFC, &[0x00, 0xC0])
        .build();

    let mut nes = Nes::new();
    nes.load_rom(&rom).unwrap();
    nes.frame();

    assert_eq!(nes.ram()[0x00], 0x11);
    assert_eq!(nes.ram()[0x01], 0x22);
}

#[test]
fn unsupported_mapper_is_rejected_at_load() {
    let rom = RomBuilder::new(1, 1, 13).build();
    let mut nes = Nes::new();
    assert!(matches!(
        nes.load_rom(&rom),
        Err(RomError::UnsupportedMapper(13))
    ));
}
