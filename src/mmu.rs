use log::debug;

use crate::{cartridge::Cartridge, hardware::Model, io, joypad::Joypad, timer::Timer};

const VRAM_BANK_SIZE: usize = 0x2000;
const WRAM_BANK_SIZE: usize = 0x1000;
const OAM_SIZE: usize = 0xA0;
const PALETTE_SIZE: usize = 0x40;

/// Address space, register block and the DMA engines.
///
/// Every subsystem steps against a `&mut Mmu`. Signals that cross subsystems
/// (an audio channel was triggered, an HDMA copy stalls the CPU) are left here
/// as flags for the consumer to take on its next step.
#[derive(Debug)]
pub struct Mmu {
    pub vram: [[u8; VRAM_BANK_SIZE]; 2],
    pub vram_bank: usize,
    /// Bank 0 at index 0, switchable banks 1-7 after it.
    pub wram: [[u8; WRAM_BANK_SIZE]; 8],
    pub wram_bank: usize,
    pub oam: [u8; OAM_SIZE],
    pub bg_palette: [u8; PALETTE_SIZE],
    pub obj_palette: [u8; PALETTE_SIZE],
    /// Raw register block 0xFF00-0xFFFF, HRAM and IE included.
    io: [u8; 0x100],
    pub cart: Cartridge,
    boot_rom: Option<Vec<u8>>,
    pub timer: Timer,
    pub joypad: Joypad,
    cgb: bool,
    pub double_speed: bool,
    /// OAM DMA bytes left to copy. Non-zero restricts CPU access.
    dma_remaining: u8,
    hdma_src: u16,
    hdma_dst: u16,
    /// Bytes left in an armed HBlank transfer.
    hdma_len: u16,
    hdma_stall: u32,
    apu_triggers: u8,
}

impl Mmu {
    pub fn new(cart: Cartridge, model: Model, boot_rom: Option<Vec<u8>>) -> Self {
        let mut mmu = Self {
            vram: [[0; VRAM_BANK_SIZE]; 2],
            vram_bank: 0,
            wram: [[0; WRAM_BANK_SIZE]; 8],
            wram_bank: 1,
            oam: [0; OAM_SIZE],
            bg_palette: [0; PALETTE_SIZE],
            obj_palette: [0; PALETTE_SIZE],
            io: [0; 0x100],
            cart,
            boot_rom,
            timer: Timer::new(),
            joypad: Joypad::new(),
            cgb: model.is_cgb(),
            double_speed: false,
            dma_remaining: 0,
            hdma_src: 0,
            hdma_dst: 0x8000,
            hdma_len: 0,
            hdma_stall: 0,
            apu_triggers: 0,
        };
        if mmu.boot_rom.is_none() {
            mmu.apply_post_boot_state();
        }
        mmu
    }

    /// Register values the boot ROM leaves behind when it hands over to the
    /// cartridge at 0x0100.
    fn apply_post_boot_state(&mut self) {
        self.set_reg(io::LCDC, 0x91);
        self.set_reg(io::BGP, 0xFC);
        self.set_reg(io::NR50, 0x77);
        self.set_reg(io::NR51, 0xF3);
        self.set_reg(io::NR52, 0xF1);
        self.set_reg(io::BOOT, 0x01);
        if self.cgb {
            for pair in self.bg_palette.chunks_exact_mut(2) {
                pair[0] = 0xFF;
                pair[1] = 0x7F;
            }
        }
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb
    }

    #[inline]
    pub fn reg(&self, addr: u16) -> u8 {
        self.io[(addr & 0xFF) as usize]
    }

    #[inline]
    pub fn set_reg(&mut self, addr: u16, val: u8) {
        self.io[(addr & 0xFF) as usize] = val;
    }

    pub fn request_interrupt(&mut self, bit: u8) {
        self.io[0x0F] |= bit;
    }

    pub fn lcd_enabled(&self) -> bool {
        self.reg(io::LCDC) & 0x80 != 0
    }

    pub fn boot_mapped(&self) -> bool {
        self.reg(io::BOOT) == 0 && self.boot_rom.is_some()
    }

    pub fn dma_active(&self) -> bool {
        self.dma_remaining > 0
    }

    /// Audio channels triggered since the last call, one bit per channel.
    pub fn take_apu_triggers(&mut self) -> u8 {
        std::mem::take(&mut self.apu_triggers)
    }

    /// CPU ticks owed to HDMA/GDMA copies since the last call.
    pub fn take_hdma_stall(&mut self) -> u32 {
        std::mem::take(&mut self.hdma_stall)
    }

    /// Replace the held buttons; a newly pressed one requests the joypad
    /// interrupt. Returns the buttons that went down.
    pub fn set_buttons(&mut self, buttons: u8) -> u8 {
        let pressed = self.joypad.set_buttons(buttons);
        if pressed != 0 {
            self.request_interrupt(io::INT_JOYPAD);
        }
        pressed
    }

    /// Apply a pending KEY1 speed switch. Returns whether the speed changed.
    pub fn switch_speed(&mut self) -> bool {
        if !self.cgb || self.reg(io::KEY1) & 0x01 == 0 {
            return false;
        }
        self.double_speed = !self.double_speed;
        let key1 = self.reg(io::KEY1) & !0x01;
        self.set_reg(io::KEY1, key1);
        debug!(
            "speed switch: {}",
            if self.double_speed { "double" } else { "normal" }
        );
        true
    }

    /// Bus-side work for one master tick: timer, then one OAM DMA byte.
    pub fn tick(&mut self) {
        let cycles = if self.double_speed { 2 } else { 1 };
        self.timer.step(cycles, &mut self.io[0x0F]);
        if self.dma_remaining > 0 {
            let i = OAM_SIZE as u16 - self.dma_remaining as u16;
            let src = ((self.reg(io::DMA) as u16) << 8) + i;
            self.oam[i as usize] = self.peek(src);
            self.dma_remaining -= 1;
        }
    }

    /// CPU-visible read. During OAM DMA only the DMA register and HRAM
    /// answer; OAM reads 0xFF and everything else 0x00.
    pub fn read_byte(&self, addr: u16) -> u8 {
        if self.dma_remaining > 0 {
            return match addr {
                0xFE00..=0xFE9F => 0xFF,
                io::DMA | 0xFF80..=0xFFFE => self.reg(addr),
                _ => 0x00,
            };
        }
        self.peek(addr)
    }

    /// Read without the OAM DMA restriction. Used by the DMA engines and the
    /// disassembler.
    pub fn peek(&self, addr: u16) -> u8 {
        let a = addr as usize;
        match addr {
            0x0000..=0x00FF | 0x0200..=0x08FF if self.boot_mapped() => {
                match (&self.boot_rom, addr) {
                    (Some(boot), 0x0000..=0x00FF) => boot.get(a).copied().unwrap_or(0xFF),
                    (Some(boot), _) if self.cgb => boot.get(a).copied().unwrap_or(0xFF),
                    _ => self.cart.read(addr),
                }
            }
            0x0000..=0x7FFF => self.cart.read(addr),
            0x8000..=0x9FFF => self.vram[self.vram_bank][a - 0x8000],
            0xA000..=0xBFFF => self.cart.read(addr),
            0xC000..=0xCFFF => self.wram[0][a - 0xC000],
            0xD000..=0xDFFF => self.wram[self.wram_bank][a - 0xD000],
            0xE000..=0xEFFF => self.wram[0][a - 0xE000],
            0xF000..=0xFDFF => self.wram[self.wram_bank][a - 0xF000],
            0xFE00..=0xFE9F => self.oam[a - 0xFE00],
            0xFEA0..=0xFEFF => 0x00,
            0xFF00..=0xFFFF => self.read_io(addr),
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        if !self.cgb && (io::KEY0..=0xFF7F).contains(&addr) {
            return 0xFF;
        }
        let raw = self.reg(addr);
        match addr {
            0xFF03 | 0xFF08..=0xFF0E | 0xFF15 | 0xFF1F | 0xFF27..=0xFF29 => 0xFF,
            io::JOYP => self.joypad.read(),
            io::SC => raw | 0x7E,
            io::DIV | io::TIMA | io::TMA | io::TAC => self.timer.read(addr),
            io::IF => raw | 0xE0,
            io::LY if !self.lcd_enabled() => 0,
            io::STAT => {
                let v = raw | 0x80;
                if self.lcd_enabled() { v } else { v & !0x03 }
            }
            io::NR10 => raw | 0x80,
            io::NR11 => (raw & 0xC0) | 0x3F,
            io::NR13 | io::NR23 | io::NR33 => 0,
            io::NR14 | io::NR24 | io::NR34 => raw & 0x40,
            io::NR21 => raw & 0xC0,
            io::NR30 => raw | 0x7F,
            io::NR32 => raw | 0x9F,
            io::NR41 => raw | 0xC0,
            io::NR44 => (raw & 0x40) | 0x3F,
            io::NR52 => raw | 0x70,
            io::KEY1 => (raw & 0x01) | if self.double_speed { 0x80 } else { 0 },
            io::VBK => raw | 0xFE,
            io::SVBK => raw | 0xF8,
            io::BCPD => self.bg_palette[(self.reg(io::BCPS) & 0x3F) as usize],
            io::OCPD => self.obj_palette[(self.reg(io::OCPS) & 0x3F) as usize],
            _ => raw,
        }
    }

    /// CPU-visible write.
    pub fn write_byte(&mut self, addr: u16, val: u8) {
        if self.dma_remaining > 0 {
            if matches!(addr, io::DMA | 0xFF80..=0xFFFE) {
                self.set_reg(addr, val);
            }
            return;
        }
        let a = addr as usize;
        match addr {
            // The boot ROM shadows the cartridge registers below 0x100.
            0x0000..=0x00FF if self.reg(io::BOOT) == 0 => {}
            0x0000..=0x7FFF | 0xA000..=0xBFFF => self.cart.write(addr, val),
            0x8000..=0x9FFF => self.vram[self.vram_bank][a - 0x8000] = val,
            0xC000..=0xCFFF => self.wram[0][a - 0xC000] = val,
            0xD000..=0xDFFF => self.wram[self.wram_bank][a - 0xD000] = val,
            0xE000..=0xEFFF => self.wram[0][a - 0xE000] = val,
            0xF000..=0xFDFF => self.wram[self.wram_bank][a - 0xF000] = val,
            0xFE00..=0xFE9F => self.oam[a - 0xFE00] = val,
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFFFF => self.write_io(addr, val),
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        if !self.cgb && (io::KEY0..=0xFF7F).contains(&addr) && addr != io::BOOT {
            return;
        }
        match addr {
            io::JOYP => self.joypad.write(val),
            io::SC | io::LY => {}
            io::DIV | io::TIMA | io::TMA | io::TAC => {
                self.timer.write(addr, val, &mut self.io[0x0F]);
            }
            io::IF => self.set_reg(addr, val & 0x1F),
            io::STAT => {
                let mode = self.reg(io::STAT) & 0x03;
                self.set_reg(addr, mode | (val & 0x7C));
            }
            io::DMA => {
                let src = match val {
                    0xFE => 0xC0,
                    0xFF => 0xDF,
                    v => v,
                };
                self.set_reg(addr, src);
                self.dma_remaining = OAM_SIZE as u8;
            }
            io::NR12 | io::NR22 => {
                if val & 0xF8 == 0 {
                    let bit = if addr == io::NR12 { 0x01 } else { 0x02 };
                    let nr52 = self.reg(io::NR52) & !bit;
                    self.set_reg(io::NR52, nr52);
                }
                self.set_reg(addr, val);
            }
            io::NR14 | io::NR24 | io::NR34 | io::NR44 => {
                self.set_reg(addr, val);
                if val & 0x80 != 0 {
                    let ch = match addr {
                        io::NR14 => 0,
                        io::NR24 => 1,
                        io::NR34 => 2,
                        _ => 3,
                    };
                    self.apu_triggers |= 1 << ch;
                    let nr52 = self.reg(io::NR52) | (1 << ch);
                    self.set_reg(io::NR52, nr52);
                }
            }
            io::NR30 => self.set_reg(addr, val & 0x80),
            io::NR52 => {
                let nr52 = if val & 0x80 != 0 {
                    self.reg(io::NR52) | 0x80
                } else {
                    0
                };
                self.set_reg(addr, nr52);
            }
            io::KEY1 => {
                let key1 = (self.reg(io::KEY1) & 0xFE) | (val & 0x01);
                self.set_reg(addr, key1);
            }
            io::VBK => {
                self.vram_bank = (val & 0x01) as usize;
                self.set_reg(addr, val & 0x01);
            }
            io::BOOT => {
                // Unmapping the boot ROM is permanent.
                if self.reg(io::BOOT) == 0 {
                    self.set_reg(addr, val);
                }
            }
            io::HDMA1 => self.hdma_src = (((val as u16) << 8) | (self.hdma_src & 0xFF)) & 0xFFF0,
            io::HDMA2 => self.hdma_src = ((self.hdma_src & 0xFF00) | val as u16) & 0xFFF0,
            io::HDMA3 => {
                self.hdma_dst = ((((val as u16) << 8) | (self.hdma_dst & 0xFF)) & 0x1FF0) | 0x8000;
            }
            io::HDMA4 => {
                self.hdma_dst = (((self.hdma_dst & 0xFF00) | val as u16) & 0x1FF0) | 0x8000;
            }
            io::HDMA5 => self.write_hdma5(val),
            io::BCPD => {
                let bcps = self.reg(io::BCPS);
                self.bg_palette[(bcps & 0x3F) as usize] = val;
                if bcps & 0x80 != 0 {
                    self.set_reg(io::BCPS, 0xC0 | (bcps.wrapping_add(1) & 0x3F));
                }
            }
            io::OCPD => {
                let ocps = self.reg(io::OCPS);
                self.obj_palette[(ocps & 0x3F) as usize] = val;
                if ocps & 0x80 != 0 {
                    self.set_reg(io::OCPS, (ocps & 0xC0) | (ocps.wrapping_add(1) & 0x3F));
                }
            }
            io::SVBK => {
                let bank = (val & 0x07) as usize;
                self.wram_bank = bank.max(1);
                self.set_reg(addr, val & 0x07);
            }
            io::PCM12 | io::PCM34 => {}
            _ => self.set_reg(addr, val),
        }
    }

    fn write_hdma5(&mut self, val: u8) {
        let len = (((val & 0x7F) as u16) + 1) << 4;
        if val & 0x80 != 0 {
            self.hdma_len = len;
            self.set_reg(io::HDMA5, val & 0x7F);
            return;
        }
        if self.hdma_len != 0 {
            self.hdma_len = 0;
            let hdma5 = self.reg(io::HDMA5) | 0x80;
            self.set_reg(io::HDMA5, hdma5);
            return;
        }
        for _ in 0..len {
            self.copy_hdma_byte();
        }
        self.hdma_stall += self.hdma_block_cost() * (len as u32 >> 4);
        self.set_reg(io::HDMA5, 0xFF);
    }

    /// Copy one 16-byte block of an armed HBlank transfer. Called by the PPU
    /// on entering HBlank.
    pub fn hdma_hblank_transfer(&mut self) {
        if self.hdma_len == 0 {
            return;
        }
        self.hdma_stall += self.hdma_block_cost();
        for _ in 0..0x10 {
            self.copy_hdma_byte();
        }
        self.hdma_len -= 0x10;
        if self.hdma_len == 0 {
            self.set_reg(io::HDMA5, 0xFF);
        } else {
            let hdma5 = (self.reg(io::HDMA5) & 0x7F).wrapping_sub(1);
            self.set_reg(io::HDMA5, hdma5);
        }
    }

    pub fn hdma_active(&self) -> bool {
        self.hdma_len != 0
    }

    fn copy_hdma_byte(&mut self) {
        let byte = self.peek(self.hdma_src);
        self.vram[self.vram_bank][(self.hdma_dst & 0x1FFF) as usize] = byte;
        self.hdma_src = self.hdma_src.wrapping_add(1);
        self.hdma_dst = 0x8000 | (self.hdma_dst.wrapping_add(1) & 0x1FFF);
    }

    fn hdma_block_cost(&self) -> u32 {
        if self.double_speed { 16 } else { 8 }
    }

    /// Reset the internal divider, as a DIV write or STOP does.
    pub fn reset_div(&mut self) {
        self.timer.reset_div(&mut self.io[0x0F]);
    }
}
