//! Rendering exercised end-to-end: programs configure the PPU through its
//! registers the way games do, and the tests check the finished
//! framebuffer and status flags.

mod common;

use common::{Program, RomBuilder};
use famicore::Nes;

/// 0x21 in the master palette (light blue)
const BG_COLOR: u32 = 0x64B0FF;

/// 0x16 in the master palette (brick red)
const SPRITE_COLOR: u32 = 0xB53120;

/// Wait for VBlank by polling PPUSTATUS bit 7
fn wait_vblank(program: Program) -> Program {
    program.bit_abs(0x2002).bpl_back(5)
}

/// Set the VRAM address through PPUADDR
fn set_vram_addr(program: Program, addr: u16) -> Program {
    program
        .lda_imm((addr >> 8) as u8)
        .sta_abs(0x2006)
        .lda_imm(addr as u8)
        .sta_abs(0x2006)
}

/// Write one byte through PPUDATA
fn write_vram(program: Program, value: u8) -> Program {
    program.lda_imm(value).sta_abs(0x2007)
}

/// Build a setup ROM: wait out reset, paint the palette, upload a solid
/// tile 1 into CHR RAM, run `extra`, zero the scroll, enable rendering
/// with `mask`, then run `tail` and spin.
fn render_rom(
    extra: impl FnOnce(Program) -> Program,
    mask: u8,
    tail: impl FnOnce(Program) -> Program,
) -> Vec<u8> {
    let mut program = Program::new();
    program = wait_vblank(program);
    program = wait_vblank(program);

    // Backdrop dark, background palette 0 color 1 light blue, sprite
    // palette 0 color 1 brick red.
    program = set_vram_addr(program, 0x3F00);
    program = write_vram(program, 0x0F);
    program = write_vram(program, 0x21);
    program = set_vram_addr(program, 0x3F11);
    program = write_vram(program, 0x16);

    // Tile 1: all pixels color 1 (plane 0 solid, plane 1 clear).
    program = set_vram_addr(program, 0x0010);
    for _ in 0..8 {
        program = write_vram(program, 0xFF);
    }
    for _ in 0..8 {
        program = write_vram(program, 0x00);
    }

    program = extra(program);

    // Zero the scroll and switch rendering on.
    program = program
        .lda_imm(0x00)
        .sta_abs(0x2005)
        .sta_abs(0x2005)
        .lda_imm(mask)
        .sta_abs(0x2001);

    program = tail(program);

    let spin_at = 0x8000 + program.len() as u16;
    let program = program.spin(spin_at);

    RomBuilder::nrom()
        .with_code(0x8000, program.bytes())
        .with_reset_vector(0x8000)
        .build()
}

#[test]
fn background_tile_renders_with_palette_color() {
    let rom = render_rom(
        |mut program| {
            // Top-left nametable entry shows tile 1.
            program = set_vram_addr(program, 0x2000);
            program = write_vram(program, 0x01);
            program
        },
        0x0A, // background on, left column visible
        |program| program,
    );

    let mut nes = Nes::new();
    nes.load_rom(&rom).unwrap();
    for _ in 0..4 {
        nes.frame();
    }

    let fb = nes.framebuffer();
    assert_eq!(fb[3 * 256 + 3], BG_COLOR, "inside the tile");
    assert_eq!(fb[3 * 256 + 8], 0x000000, "right of the tile");
    assert_eq!(fb[100 * 256 + 3], 0x000000, "below the tile");
}

#[test]
fn left_column_clipping_blanks_the_first_8_pixels() {
    let rom = render_rom(
        |mut program| {
            program = set_vram_addr(program, 0x2000);
            program = write_vram(program, 0x01);
            program = write_vram(program, 0x01); // second tile too
            program
        },
        0x08, // background on, left column clipped
        |program| program,
    );

    let mut nes = Nes::new();
    nes.load_rom(&rom).unwrap();
    for _ in 0..4 {
        nes.frame();
    }

    let fb = nes.framebuffer();
    assert_eq!(fb[3 * 256 + 3], 0x000000, "clipped column");
    assert_eq!(fb[3 * 256 + 10], BG_COLOR, "second tile renders");
}

#[test]
fn sprite_renders_at_its_oam_position() {
    let rom = render_rom(
        |mut program| {
            // OAM entry 0 well away from the background: Y=50, tile 1,
            // palette 0, X=100.
            program = program.lda_imm(0x00).sta_abs(0x2003);
            for byte in [50u8, 0x01, 0x00, 100] {
                program = program.lda_imm(byte).sta_abs(0x2004);
            }
            program
        },
        0x1E, // background + sprites, nothing clipped
        |program| program,
    );

    let mut nes = Nes::new();
    nes.load_rom(&rom).unwrap();
    for _ in 0..4 {
        nes.frame();
    }

    // OAM Y is one above the first rendered line.
    let fb = nes.framebuffer();
    assert_eq!(fb[52 * 256 + 100], SPRITE_COLOR);
    assert_eq!(fb[52 * 256 + 99], 0x000000);
    assert_eq!(fb[49 * 256 + 100], 0x000000);
}

#[test]
fn sprite_zero_hit_raises_status_bit6() {
    let rom = render_rom(
        |mut program| {
            // An opaque background tile at tiles 2-3 of the top row...
            program = set_vram_addr(program, 0x2002);
            program = write_vram(program, 0x01);
            program = write_vram(program, 0x01);

            // ...and sprite 0 overlapping it.
            program = program.lda_imm(0x00).sta_abs(0x2003);
            for byte in [2u8, 0x01, 0x00, 18] {
                program = program.lda_imm(byte).sta_abs(0x2004);
            }

            program
        },
        0x1E,
        |program| {
            // Poll PPUSTATUS until the hit bit lands in V, then record it.
            program.bit_abs(0x2002).bvc_back(5).lda_imm(0x99).sta_zp(0x0F)
        },
    );

    let mut nes = Nes::new();
    nes.load_rom(&rom).unwrap();
    for _ in 0..6 {
        nes.frame();
    }

    assert_eq!(nes.ram()[0x0F], 0x99, "sprite-zero hit never reported");
}

#[test]
fn disabled_rendering_shows_the_backdrop() {
    let rom = render_rom(
        |mut program| {
            program = set_vram_addr(program, 0x2000);
            program = write_vram(program, 0x01);
            program
        },
        0x00, // rendering left off
        |program| program,
    );

    let mut nes = Nes::new();
    nes.load_rom(&rom).unwrap();
    for _ in 0..4 {
        nes.frame();
    }

    let fb = nes.framebuffer();
    assert_eq!(fb[3 * 256 + 3], 0x000000);
}
