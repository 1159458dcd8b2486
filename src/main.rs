use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};
use tickboy::{
    BootRoms, GameBoy, Model,
    hardware::{SCREEN_HEIGHT, SCREEN_WIDTH},
};

/// Headless runner: plays a cartridge for a number of frames and optionally
/// dumps the last frame and the cartridge's persistent state.
#[derive(Parser)]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Force DMG mode even for color cartridges
    #[arg(long)]
    dmg: bool,

    /// Path to DMG boot ROM file (256 bytes)
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Path to CGB boot ROM file (2304 bytes)
    #[arg(long)]
    cgb_boot_rom: Option<PathBuf>,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Write the last frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Battery RAM file, loaded before the run and written after it
    #[arg(long)]
    save: Option<PathBuf>,

    /// RTC state file, loaded before the run and written after it
    #[arg(long)]
    rtc: Option<PathBuf>,

    /// Held buttons bitmask (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_buttons, default_value = "0")]
    buttons: u8,
}

fn parse_buttons(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid button mask {s:?}: {e}"))
}

fn read_optional(path: Option<&PathBuf>) -> std::io::Result<Option<Vec<u8>>> {
    path.map(std::fs::read).transpose()
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let rom = std::fs::read(&args.rom)?;
    let boot = BootRoms {
        dmg: read_optional(args.boot_rom.as_ref())?,
        cgb: read_optional(args.cgb_boot_rom.as_ref())?,
    };
    let model = args.dmg.then_some(Model::Dmg);
    let mut gb = GameBoy::with_model(rom, boot, model)?;

    if let Some(path) = &args.save {
        match std::fs::read(path) {
            Ok(data) => gb.load_battery_ram(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no save file at {}", path.display());
            }
            Err(e) => return Err(e.into()),
        }
    }
    if let Some(path) = &args.rtc {
        match std::fs::read(path) {
            Ok(data) => gb.load_rtc_state(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no RTC file at {}", path.display());
            }
            Err(e) => return Err(e.into()),
        }
    }

    for _ in 0..args.frames {
        gb.run_frame(args.buttons);
    }
    info!("ran {} frames, {}", args.frames, gb.cpu.debug_state());

    if let Some(path) = &args.screenshot {
        let frame = gb.ppu.frame().to_vec();
        let img = image::RgbaImage::from_raw(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, frame)
            .ok_or("frame buffer does not match the screen size")?;
        img.save(path)?;
        info!("wrote {}", path.display());
    }
    if let Some(path) = &args.save {
        match gb.battery_ram() {
            Some(ram) => std::fs::write(path, ram)?,
            None => warn!("cartridge has no battery, not writing {}", path.display()),
        }
    }
    if let Some(path) = &args.rtc {
        match gb.rtc_state() {
            Some(state) => std::fs::write(path, state)?,
            None => warn!("cartridge has no RTC, not writing {}", path.display()),
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("tickboy: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    fn battery_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0147] = 0x03;
        rom[0x0149] = 0x02;
        // jr -2
        rom[0x0100] = 0x18;
        rom[0x0101] = 0xFE;
        rom
    }

    #[test]
    fn headless_run_writes_screenshot_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let rom = dir.path().join("game.gb");
        let png = dir.path().join("shot.png");
        let sav = dir.path().join("game.sav");
        std::fs::write(&rom, battery_rom()).unwrap();

        let args = Args::parse_from([
            OsStr::new("tickboy"),
            rom.as_os_str(),
            OsStr::new("--frames"),
            OsStr::new("2"),
            OsStr::new("--screenshot"),
            png.as_os_str(),
            OsStr::new("--save"),
            sav.as_os_str(),
        ]);
        run(args).unwrap();

        let img = image::open(&png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32));
        assert_eq!(std::fs::read(&sav).unwrap().len(), 0x2000);
    }

    #[test]
    fn mismatched_save_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let rom = dir.path().join("game.gb");
        let sav = dir.path().join("game.sav");
        std::fs::write(&rom, battery_rom()).unwrap();
        std::fs::write(&sav, [0u8; 16]).unwrap();

        let args = Args::parse_from([
            OsStr::new("tickboy"),
            rom.as_os_str(),
            OsStr::new("--save"),
            sav.as_os_str(),
        ]);
        assert!(run(args).is_err());
    }

    #[test]
    fn button_masks_accept_hex() {
        assert_eq!(parse_buttons("0x81"), Ok(0x81));
        assert_eq!(parse_buttons("16"), Ok(16));
        assert!(parse_buttons("0x1FF").is_err());
    }
}
