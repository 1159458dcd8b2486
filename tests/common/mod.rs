#![allow(dead_code)]

use tickboy::{BootRoms, GameBoy, Model, cartridge::Cartridge, mmu::Mmu};

pub const ROM_BANK: usize = 0x4000;

/// Cartridge image with the given header codes. The first two bytes of every
/// ROM bank hold that bank's number, little endian.
pub fn image(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
    let len = (32 * 1024) << rom_code;
    let mut rom = vec![0u8; len];
    for (bank, chunk) in rom.chunks_mut(ROM_BANK).enumerate() {
        chunk[0] = bank as u8;
        chunk[1] = (bank >> 8) as u8;
    }
    rom[0x0147] = cart_type;
    rom[0x0148] = rom_code;
    rom[0x0149] = ram_code;
    rom
}

/// 32 KiB ROM-only image with `code` at the entry point.
pub fn program(code: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0100..0x0100 + code.len()].copy_from_slice(code);
    rom
}

pub fn dmg_mmu() -> Mmu {
    let cart = Cartridge::new(program(&[])).unwrap();
    Mmu::new(cart, Model::Dmg, None)
}

/// DMG session that skips the boot ROM and runs `code` from 0x0100.
pub fn session(code: &[u8]) -> GameBoy {
    GameBoy::with_model(program(code), BootRoms::default(), Some(Model::Dmg)).unwrap()
}
