//! Save states through the public API, including the file round trip.

mod common;

use common::{Program, RomBuilder};
use famicore::{Nes, SaveState};

fn test_rom() -> Vec<u8> {
    let program = Program::new().inc_zp(0x20).jmp(0x8000);
    RomBuilder::nrom()
        .with_code(0x8000, program.bytes())
        .with_reset_vector(0x8000)
        .build()
}

#[test]
fn snapshot_rewinds_a_running_console() {
    let mut nes = Nes::new();
    nes.load_rom(&test_rom()).unwrap();
    for _ in 0..5 {
        nes.frame();
    }

    let state = SaveState::capture(&nes).unwrap();
    let counter = nes.ram()[0x20];
    let pc = nes.cpu().pc;

    for _ in 0..5 {
        nes.frame();
    }
    assert_ne!(nes.ram()[0x20], counter);

    let report = state.apply(&mut nes).unwrap();
    assert!(!report.rom_mismatch);
    assert_eq!(nes.ram()[0x20], counter);
    assert_eq!(nes.cpu().pc, pc);

    // Execution continues normally from the restored point.
    nes.frame();
    assert_ne!(nes.ram()[0x20], counter);
}

#[test]
fn state_survives_the_file_round_trip() {
    let mut nes = Nes::new();
    nes.load_rom(&test_rom()).unwrap();
    for _ in 0..3 {
        nes.frame();
    }

    let path = std::env::temp_dir().join("famicore_state_roundtrip.fcss");
    let state = SaveState::capture(&nes).unwrap();
    state.write_file(&path).unwrap();

    let loaded = SaveState::read_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(
        loaded.to_bytes().unwrap(),
        state.to_bytes().unwrap(),
        "file round trip altered the state"
    );

    let counter = nes.ram()[0x20];
    for _ in 0..3 {
        nes.frame();
    }
    loaded.apply(&mut nes).unwrap();
    assert_eq!(nes.ram()[0x20], counter);
}

#[test]
fn restore_reports_a_mismatched_rom() {
    let mut nes = Nes::new();
    nes.load_rom(&test_rom()).unwrap();
    let state = SaveState::capture(&nes).unwrap();

    // A ROM with different PRG contents fingerprints differently.
    let program = Program::new().spin(0x8000);
    let other_rom = RomBuilder::nrom()
        .with_code(0x8000, program.bytes())
        .with_reset_vector(0x8000)
        .build();

    let mut other = Nes::new();
    other.load_rom(&other_rom).unwrap();
    let report = state.apply(&mut other).unwrap();
    assert!(report.rom_mismatch);
}
