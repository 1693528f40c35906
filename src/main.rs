//! # famicore
//!
//! Headless command-line runner for the emulation core: loads an iNES ROM,
//! runs a number of frames, and can dump the final framebuffer as a PNG or
//! write/read save states. Useful for exercising the core and capturing
//! regression screenshots without any host front-end.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use famicore::{FrameStatus, Nes, SaveState};

#[derive(Parser)]
#[command(name = "famicore", about = "Headless NES emulation core runner")]
struct Args {
    /// Path to an iNES ROM image
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Write the final framebuffer to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Write a save state here after the run
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Restore this save state before running
    #[arg(long)]
    load_state: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = fs::read(&args.rom)
        .with_context(|| format!("Failed to read ROM file {}", args.rom.display()))?;

    let mut nes = Nes::new();
    nes.load_rom(&rom)
        .with_context(|| format!("Failed to load {}", args.rom.display()))?;

    if let Some(path) = &args.load_state {
        let state = SaveState::read_file(path)
            .with_context(|| format!("Failed to read save state {}", path.display()))?;
        let report = state
            .apply(&mut nes)
            .context("Failed to restore save state")?;
        if report.rom_mismatch {
            eprintln!("warning: save state was taken from a different ROM");
        }
    }

    let mut samples = 0usize;
    for frame in 0..args.frames {
        match nes.frame() {
            FrameStatus::Complete => {}
            FrameStatus::Crashed(pc) => {
                bail!("CPU jammed at ${:04X} during frame {}", pc, frame);
            }
        }
        samples += nes.take_audio().len();
    }

    info!(
        "Ran {} frames, {} CPU cycles, {} audio samples",
        args.frames,
        nes.cpu_cycles(),
        samples
    );

    if let Some(path) = &args.screenshot {
        write_screenshot(&nes, path)?;
        println!("Screenshot written to {}", path.display());
    }

    if let Some(path) = &args.save_state {
        let state = SaveState::capture(&nes).context("Failed to capture save state")?;
        state
            .write_file(path)
            .with_context(|| format!("Failed to write save state {}", path.display()))?;
        println!("Save state written to {}", path.display());
    }

    Ok(())
}

/// Dump the framebuffer as a PNG
fn write_screenshot(nes: &Nes, path: &PathBuf) -> Result<()> {
    let framebuffer = nes.framebuffer();
    let image = image::RgbImage::from_fn(256, 240, |x, y| {
        let pixel = framebuffer[(y * 256 + x) as usize];
        image::Rgb([(pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8])
    });

    image
        .save(path)
        .with_context(|| format!("Failed to write screenshot {}", path.display()))?;
    Ok(())
}
