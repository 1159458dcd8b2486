mod common;

use tickboy::{Model, cartridge::Cartridge, io, mmu::Mmu};

fn cgb_mmu() -> Mmu {
    let mut rom = common::program(&[]);
    rom[0x0143] = 0x80;
    Mmu::new(Cartridge::new(rom).unwrap(), Model::Cgb, None)
}

#[test]
fn echo_ram_mirrors_work_ram() {
    let mut mmu = common::dmg_mmu();
    mmu.write_byte(0xC123, 0x5A);
    assert_eq!(mmu.read_byte(0xE123), 0x5A);
    mmu.write_byte(0xFDFF, 0xA5);
    assert_eq!(mmu.read_byte(0xDDFF), 0xA5);
}

#[test]
fn unusable_region_reads_zero_and_ignores_writes() {
    let mut mmu = common::dmg_mmu();
    mmu.write_byte(0xFEA0, 0x12);
    assert_eq!(mmu.read_byte(0xFEA0), 0x00);
}

#[test]
fn oam_dma_copies_160_bytes_in_160_ticks() {
    let mut mmu = common::dmg_mmu();
    for i in 0..0xA0u16 {
        mmu.write_byte(0x8000 + i, i as u8 ^ 0x3C);
    }
    mmu.write_byte(0xC000, 0x77);
    mmu.write_byte(0xFF80, 0x99);
    mmu.write_byte(io::DMA, 0x80);

    for tick in 1..=160 {
        mmu.tick();
        if tick < 160 {
            assert!(mmu.dma_active());
            assert_eq!(mmu.read_byte(0xC000), 0x00);
            assert_eq!(mmu.read_byte(0xFE00), 0xFF);
            assert_eq!(mmu.read_byte(0xFF80), 0x99);
            assert_eq!(mmu.read_byte(io::DMA), 0x80);
        }
    }
    assert!(!mmu.dma_active());
    for i in 0..0xA0usize {
        assert_eq!(mmu.oam[i], i as u8 ^ 0x3C, "OAM byte {i}");
    }
    assert_eq!(mmu.read_byte(0xC000), 0x77);
}

#[test]
fn writes_during_oam_dma_only_reach_hram() {
    let mut mmu = common::dmg_mmu();
    mmu.write_byte(io::DMA, 0xC0);
    mmu.write_byte(0xC010, 0x11);
    mmu.write_byte(0xFF90, 0x22);
    for _ in 0..160 {
        mmu.tick();
    }
    assert_eq!(mmu.read_byte(0xC010), 0x00);
    assert_eq!(mmu.read_byte(0xFF90), 0x22);
}

#[test]
fn boot_rom_overlay_is_unmapped_for_good() {
    let mut boot = vec![0xAA; 0x100];
    boot[0] = 0x31;
    let cart = Cartridge::new(common::program(&[])).unwrap();
    let mut mmu = Mmu::new(cart, Model::Dmg, Some(boot));
    assert!(mmu.boot_mapped());
    assert_eq!(mmu.read_byte(0x0000), 0x31);
    assert_eq!(mmu.read_byte(0x0100), 0x00);

    mmu.write_byte(io::BOOT, 0x01);
    assert!(!mmu.boot_mapped());
    assert_eq!(mmu.read_byte(0x0000), 0x00);
    mmu.write_byte(io::BOOT, 0x00);
    assert!(!mmu.boot_mapped());
}

#[test]
fn dmg_ignores_color_registers() {
    let mut mmu = common::dmg_mmu();
    mmu.write_byte(io::SVBK, 0x03);
    mmu.write_byte(io::VBK, 0x01);
    assert_eq!(mmu.read_byte(io::SVBK), 0xFF);
    assert_eq!(mmu.read_byte(io::KEY1), 0xFF);
    assert_eq!(mmu.vram_bank, 0);
    assert_eq!(mmu.wram_bank, 1);
}

#[test]
fn cgb_banks_work_ram_and_vram() {
    let mut mmu = cgb_mmu();
    mmu.write_byte(io::SVBK, 0x02);
    mmu.write_byte(0xD000, 0x22);
    mmu.write_byte(io::SVBK, 0x00);
    assert_eq!(mmu.wram_bank, 1);
    assert_eq!(mmu.read_byte(0xD000), 0x00);
    assert_eq!(mmu.read_byte(io::SVBK), 0xF8);
    mmu.write_byte(io::SVBK, 0x02);
    assert_eq!(mmu.read_byte(0xD000), 0x22);

    mmu.write_byte(io::VBK, 0x01);
    mmu.write_byte(0x8000, 0x44);
    assert_eq!(mmu.read_byte(io::VBK), 0xFF);
    mmu.write_byte(io::VBK, 0x00);
    assert_eq!(mmu.read_byte(0x8000), 0x00);
    assert_eq!(mmu.vram[1][0], 0x44);
}

#[test]
fn palette_data_auto_increments() {
    let mut mmu = cgb_mmu();
    mmu.write_byte(io::BCPS, 0x80 | 0x3E);
    mmu.write_byte(io::BCPD, 0x1F);
    mmu.write_byte(io::BCPD, 0x7C);
    assert_eq!(mmu.bg_palette[0x3E], 0x1F);
    assert_eq!(mmu.bg_palette[0x3F], 0x7C);
    // the index wraps within 0x3F
    assert_eq!(mmu.read_byte(io::BCPS) & 0x3F, 0x00);
}

#[test]
fn general_hdma_copies_immediately() {
    let mut mmu = cgb_mmu();
    for i in 0..0x20u16 {
        mmu.write_byte(0xC100 + i, 0x80 | i as u8);
    }
    mmu.write_byte(io::HDMA1, 0xC1);
    mmu.write_byte(io::HDMA2, 0x00);
    mmu.write_byte(io::HDMA3, 0x02);
    mmu.write_byte(io::HDMA4, 0x00);
    mmu.write_byte(io::HDMA5, 0x01);
    for i in 0..0x20usize {
        assert_eq!(mmu.vram[0][0x200 + i], 0x80 | i as u8);
    }
    assert_eq!(mmu.read_byte(io::HDMA5), 0xFF);
    assert_eq!(mmu.take_hdma_stall(), 16);
}

#[test]
fn hblank_hdma_moves_one_block_per_call() {
    let mut mmu = cgb_mmu();
    for i in 0..0x20u16 {
        mmu.write_byte(0xC000 + i, i as u8 + 1);
    }
    mmu.write_byte(io::HDMA1, 0xC0);
    mmu.write_byte(io::HDMA2, 0x00);
    mmu.write_byte(io::HDMA3, 0x00);
    mmu.write_byte(io::HDMA4, 0x00);
    mmu.write_byte(io::HDMA5, 0x81);
    assert!(mmu.hdma_active());
    assert_eq!(mmu.vram[0][0], 0);

    mmu.hdma_hblank_transfer();
    assert_eq!(mmu.vram[0][0x0F], 0x10);
    assert_eq!(mmu.vram[0][0x10], 0);
    assert_eq!(mmu.read_byte(io::HDMA5), 0x00);

    mmu.hdma_hblank_transfer();
    assert!(!mmu.hdma_active());
    assert_eq!(mmu.vram[0][0x1F], 0x20);
    assert_eq!(mmu.read_byte(io::HDMA5), 0xFF);
}

#[test]
fn new_button_press_requests_joypad_interrupt() {
    let mut mmu = common::dmg_mmu();
    mmu.write_byte(io::IF, 0);
    assert_eq!(mmu.set_buttons(tickboy::joypad::A), tickboy::joypad::A);
    assert_eq!(mmu.reg(io::IF) & io::INT_JOYPAD, io::INT_JOYPAD);

    mmu.write_byte(io::IF, 0);
    assert_eq!(mmu.set_buttons(tickboy::joypad::A), 0);
    assert_eq!(mmu.reg(io::IF) & io::INT_JOYPAD, 0);
}
