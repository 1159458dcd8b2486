use crate::{
    hardware::{DOTS_PER_LINE, FRAME_BYTES, Frame, LINES_PER_FRAME, SCREEN_WIDTH},
    io,
    mmu::Mmu,
};

// Dot positions within a visible line
const OAM_SCAN_END: u16 = 80;
const TRANSFER_START: u16 = 91;
const HBLANK_START: u16 = 252;

const VBLANK_LINE: u8 = 144;

// Sprite limits
const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

// Window X position is clipped if greater than this value
const WINDOW_X_MAX: u8 = 166;

// VRAM layout constants
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_0_BASE: usize = 0x0000;
const TILE_DATA_1_BASE: usize = 0x1000;

// LCD modes kept in STAT bits 0-1
const MODE_HBLANK: u8 = 0;
const MODE_VBLANK: u8 = 1;
const MODE_OAM: u8 = 2;
const MODE_TRANSFER: u8 = 3;

const DMG_SHADES: [u8; 4] = [0xFF, 0xAA, 0x55, 0x00];

/// Winning object pixel for one screen column.
#[derive(Clone, Copy)]
struct ObjPixel {
    x: u8,
    attr: u8,
    color: u8,
}

/// Per-dot LCD controller. All register state lives in the [`Mmu`]; the PPU
/// only keeps its beam position and per-line scratch buffers.
pub struct Ppu {
    frame: Box<Frame>,
    ly: u8,
    dot: u16,
    /// Output column of the next pixel; starts negative to drop the
    /// sub-tile part of SCX.
    x: i16,
    /// Internal window line counter
    win_line_counter: u8,
    line_sprites: [u8; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    /// CGB tile attribute bit 7 of the background pixel at each column.
    bg_priority: [bool; SCREEN_WIDTH],
    /// Background pixel at each column used a non-zero color index.
    bg_opaque: [bool; SCREEN_WIDTH],
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            frame: Box::new([0xFF; FRAME_BYTES]),
            ly: 0,
            dot: 0,
            x: 0,
            win_line_counter: 0,
            line_sprites: [0; MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            bg_priority: [false; SCREEN_WIDTH],
            bg_opaque: [false; SCREEN_WIDTH],
        }
    }

    /// Last completed (or in-progress) frame as RGBA.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Current scanline, 0-153.
    pub fn line(&self) -> u8 {
        self.ly
    }

    /// Dot within the current scanline, 0-455.
    pub fn dot(&self) -> u16 {
        self.dot
    }

    /// Advance the beam by one dot.
    pub fn tick(&mut self, mmu: &mut Mmu) {
        let lcd_on = mmu.lcd_enabled();
        if self.ly < VBLANK_LINE {
            match self.dot {
                0 => {
                    self.collect_sprites(mmu);
                    if lcd_on {
                        self.compare_line(mmu);
                        set_mode(mmu, MODE_OAM);
                        if mmu.reg(io::STAT) & 0x20 != 0 {
                            mmu.request_interrupt(io::INT_STAT);
                        }
                    }
                }
                OAM_SCAN_END => {
                    if lcd_on {
                        set_mode(mmu, MODE_TRANSFER);
                    }
                }
                TRANSFER_START..HBLANK_START => {
                    if self.dot == TRANSFER_START {
                        self.x = -((mmu.reg(io::SCX) % 8) as i16);
                    }
                    if (0..SCREEN_WIDTH as i16).contains(&self.x) {
                        self.render_pixel(mmu, self.x as usize);
                    }
                    self.x += 1;
                }
                HBLANK_START => {
                    // columns the scroll offset pushed past the transfer window
                    while (0..SCREEN_WIDTH as i16).contains(&self.x) {
                        self.render_pixel(mmu, self.x as usize);
                        self.x += 1;
                    }
                    if mmu.reg(io::LCDC) & 0x20 != 0
                        && mmu.reg(io::WY) <= self.ly
                        && mmu.reg(io::WX) < WINDOW_X_MAX
                    {
                        self.win_line_counter = self.win_line_counter.wrapping_add(1);
                    }
                    if lcd_on {
                        mmu.hdma_hblank_transfer();
                        set_mode(mmu, MODE_HBLANK);
                        if mmu.reg(io::STAT) & 0x08 != 0 {
                            mmu.request_interrupt(io::INT_STAT);
                        }
                    }
                }
                _ => {}
            }
        } else if self.dot == 0 && lcd_on {
            if self.ly == VBLANK_LINE {
                set_mode(mmu, MODE_VBLANK);
                // the OAM source fires here as well as the VBlank one
                if mmu.reg(io::STAT) & 0x30 != 0 {
                    mmu.request_interrupt(io::INT_STAT);
                }
                mmu.request_interrupt(io::INT_VBLANK);
            }
            self.compare_line(mmu);
        }

        self.dot += 1;
        if self.dot == DOTS_PER_LINE {
            self.dot = 0;
            self.ly = (self.ly + 1) % LINES_PER_FRAME;
            if self.ly == 0 {
                self.bg_priority = [false; SCREEN_WIDTH];
                self.bg_opaque = [false; SCREEN_WIDTH];
                self.win_line_counter = 0;
            }
        }
    }

    /// Publish LY and latch the LY=LYC flag, raising STAT when enabled.
    fn compare_line(&self, mmu: &mut Mmu) {
        mmu.set_reg(io::LY, self.ly);
        let stat = mmu.reg(io::STAT);
        if mmu.reg(io::LYC) == self.ly {
            mmu.set_reg(io::STAT, stat | 0x04);
            if stat & 0x40 != 0 {
                mmu.request_interrupt(io::INT_STAT);
            }
        } else {
            mmu.set_reg(io::STAT, stat & !0x04);
        }
    }

    fn collect_sprites(&mut self, mmu: &Mmu) {
        let height: u16 = if mmu.reg(io::LCDC) & 0x04 != 0 { 16 } else { 8 };
        let line = self.ly as u16 + 16;
        self.sprite_count = 0;
        for i in 0..TOTAL_SPRITES {
            let cy = mmu.oam[i * 4] as u16;
            if cy == 0 || cy >= 160 || cy > line || cy + height <= line {
                continue;
            }
            self.line_sprites[self.sprite_count] = i as u8;
            self.sprite_count += 1;
            if self.sprite_count == MAX_SPRITES_PER_LINE {
                break;
            }
        }
    }

    fn render_pixel(&mut self, mmu: &Mmu, x: usize) {
        let lcdc = mmu.reg(io::LCDC);
        if lcdc & 0x80 == 0 {
            self.put(x, [0xFF; 4]);
            return;
        }

        self.bg_priority[x] = false;
        self.bg_opaque[x] = false;
        if mmu.is_cgb() || lcdc & 0x01 != 0 {
            self.render_background(mmu, x);
            if lcdc & 0x20 != 0 {
                self.render_window(mmu, x);
            }
        } else {
            self.put(x, dmg_shade(mmu.reg(io::BGP), 0));
        }

        if !mmu.dma_active() && lcdc & 0x02 != 0 {
            self.render_objects(mmu, x);
        }
    }

    fn render_background(&mut self, mmu: &Mmu, x: usize) {
        let lcdc = mmu.reg(io::LCDC);
        let map_base = if lcdc & 0x08 != 0 {
            BG_MAP_1_BASE
        } else {
            BG_MAP_0_BASE
        };
        let ry = mmu.reg(io::SCY).wrapping_add(self.ly);
        let rx = mmu.reg(io::SCX).wrapping_add(x as u8);
        let map_addr = map_base + (rx / 8) as usize + (ry / 8) as usize * 32;
        self.render_tile(mmu, map_addr, rx % 8, ry % 8, x);
    }

    fn render_window(&mut self, mmu: &Mmu, x: usize) {
        let wx = mmu.reg(io::WX);
        if mmu.reg(io::WY) > self.ly || wx as usize > x + 7 {
            return;
        }
        let map_base = if mmu.reg(io::LCDC) & 0x40 != 0 {
            BG_MAP_1_BASE
        } else {
            BG_MAP_0_BASE
        };
        let rx = (x + 7 - wx as usize) as u8;
        let row = self.win_line_counter;
        let map_addr = map_base + (rx / 8) as usize + (row / 8) as usize * 32;
        self.render_tile(mmu, map_addr, rx % 8, row % 8, x);
    }

    fn render_tile(&mut self, mmu: &Mmu, map_addr: usize, bx: u8, by: u8, x: usize) {
        let code = mmu.vram[0][map_addr];
        let tile = tile_data_addr(mmu.reg(io::LCDC), code);
        let cgb = mmu.is_cgb();
        let attr = if cgb { mmu.vram[1][map_addr] } else { 0 };
        let bx = if attr & 0x20 != 0 { 7 - bx } else { bx };
        let by = if attr & 0x40 != 0 { 7 - by } else { by };
        let bank = usize::from(attr & 0x08 != 0);
        let color = tile_pixel(mmu, bank, tile, bx, by);

        let rgba = if cgb {
            cgb_color(&mmu.bg_palette, attr & 0x07, color)
        } else {
            dmg_shade(mmu.reg(io::BGP), color)
        };
        self.put(x, rgba);
        self.bg_priority[x] = attr & 0x80 != 0;
        self.bg_opaque[x] = color != 0;
    }

    fn render_objects(&mut self, mmu: &Mmu, x: usize) {
        let lcdc = mmu.reg(io::LCDC);
        let tall = lcdc & 0x04 != 0;
        let cgb = mmu.is_cgb();
        // DMG, and CGB with OPRI bit 0 set, rank objects by X first
        let x_priority = !cgb || mmu.reg(io::OPRI) & 0x01 != 0;

        let mut best: Option<ObjPixel> = None;
        for &index in &self.line_sprites[..self.sprite_count] {
            let base = index as usize * 4;
            let cy = mmu.oam[base];
            let cx = mmu.oam[base + 1];
            let code = mmu.oam[base + 2];
            let attr = mmu.oam[base + 3];
            if cx == 0 || cx >= 168 || cx as usize > x + 8 || cx as usize <= x {
                continue;
            }
            if let Some(b) = best {
                if !x_priority || cx >= b.x {
                    continue;
                }
            }

            let mut bx = (x + 8 - cx as usize) as u8;
            let mut by = self.ly.wrapping_add(16).wrapping_sub(cy) & 0x0F;
            if attr & 0x20 != 0 {
                bx = 7 - bx;
            }
            if attr & 0x40 != 0 {
                by = if tall { 15 - by } else { 7u8.wrapping_sub(by) & 0x0F };
            }
            let code = if tall { code & !1 } else { code };
            let bank = usize::from(cgb && attr & 0x08 != 0);
            let color = tile_pixel(mmu, bank, code as usize * 16, bx, by);
            if color != 0 {
                best = Some(ObjPixel { x: cx, attr, color });
            }
        }

        let Some(px) = best else {
            return;
        };
        // on CGB, LCDC bit 0 clear puts every object above the background
        let bg_can_win = !cgb || lcdc & 0x01 != 0;
        if bg_can_win && (self.bg_priority[x] || px.attr & 0x80 != 0) && self.bg_opaque[x] {
            return;
        }
        let rgba = if cgb {
            cgb_color(&mmu.obj_palette, px.attr & 0x07, px.color)
        } else {
            let reg = if px.attr & 0x10 != 0 { io::OBP1 } else { io::OBP0 };
            dmg_shade(mmu.reg(reg), px.color)
        };
        self.put(x, rgba);
    }

    fn put(&mut self, x: usize, rgba: [u8; 4]) {
        let i = (self.ly as usize * SCREEN_WIDTH + x) * 4;
        self.frame[i..i + 4].copy_from_slice(&rgba);
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

fn set_mode(mmu: &mut Mmu, mode: u8) {
    let stat = (mmu.reg(io::STAT) & !0x03) | mode;
    mmu.set_reg(io::STAT, stat);
}

/// VRAM offset of a background/window tile. LCDC bit 4 selects unsigned
/// indexing from 0x8000, otherwise signed indexing around 0x9000.
fn tile_data_addr(lcdc: u8, code: u8) -> usize {
    if lcdc & 0x10 != 0 {
        TILE_DATA_0_BASE + code as usize * 16
    } else {
        (TILE_DATA_1_BASE as isize + code as i8 as isize * 16) as usize
    }
}

fn tile_pixel(mmu: &Mmu, bank: usize, tile: usize, bx: u8, by: u8) -> u8 {
    let row = tile + by as usize * 2;
    let lo = mmu.vram[bank][row];
    let hi = mmu.vram[bank][row + 1];
    let shift = 7 - bx;
    ((lo >> shift) & 1) | (((hi >> shift) & 1) << 1)
}

fn dmg_shade(palette: u8, color: u8) -> [u8; 4] {
    let shade = DMG_SHADES[((palette >> (color * 2)) & 0x03) as usize];
    [shade, shade, shade, 0xFF]
}

/// Scale a 5-bit channel to 8 bits.
fn to8(v: u8) -> u8 {
    ((v as u32 * 527 + 23) >> 6) as u8
}

/// Resolve a CGB palette entry (little-endian RGB555) to RGBA.
fn cgb_color(ram: &[u8; 0x40], palette: u8, color: u8) -> [u8; 4] {
    let i = palette as usize * 8 + color as usize * 2;
    let lo = ram[i];
    let hi = ram[i + 1];
    let r = lo & 0x1F;
    let g = ((lo & 0xE0) >> 5) | ((hi & 0x03) << 3);
    let b = (hi & 0x7C) >> 2;
    [to8(r), to8(g), to8(b), 0xFF]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cartridge::Cartridge, hardware::Model};

    fn mmu(model: Model) -> Mmu {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0143] = if model.is_cgb() { 0x80 } else { 0x00 };
        Mmu::new(Cartridge::new(rom).unwrap(), model, None)
    }

    fn run(ppu: &mut Ppu, mmu: &mut Mmu, dots: u32) {
        for _ in 0..dots {
            ppu.tick(mmu);
        }
    }

    fn pixel(ppu: &Ppu, x: usize, y: usize) -> [u8; 4] {
        let i = (y * SCREEN_WIDTH + x) * 4;
        ppu.frame()[i..i + 4].try_into().unwrap()
    }

    #[test]
    fn mode_sequence_within_a_line() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        run(&mut ppu, &mut mmu, 1);
        assert_eq!(mmu.reg(io::STAT) & 0x03, MODE_OAM);
        run(&mut ppu, &mut mmu, 80);
        assert_eq!(mmu.reg(io::STAT) & 0x03, MODE_TRANSFER);
        run(&mut ppu, &mut mmu, 172);
        assert_eq!(mmu.reg(io::STAT) & 0x03, MODE_HBLANK);
        assert_eq!(ppu.dot(), 253);
    }

    #[test]
    fn window_line_counter_ignores_bg_enable() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        mmu.write_byte(io::LCDC, 0xA0);
        mmu.write_byte(io::WY, 0);
        mmu.write_byte(io::WX, 7);
        run(&mut ppu, &mut mmu, DOTS_PER_LINE as u32 * 2);
        assert_eq!(ppu.win_line_counter, 2);

        // window enable clear: no advance
        mmu.write_byte(io::LCDC, 0x81);
        run(&mut ppu, &mut mmu, DOTS_PER_LINE as u32);
        assert_eq!(ppu.win_line_counter, 2);
    }

    #[test]
    fn vblank_at_line_144() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        run(&mut ppu, &mut mmu, 144 * 456);
        assert_eq!(mmu.reg(io::IF) & io::INT_VBLANK, 0);
        run(&mut ppu, &mut mmu, 1);
        assert_eq!(mmu.reg(io::STAT) & 0x03, MODE_VBLANK);
        assert_eq!(mmu.reg(io::IF) & io::INT_VBLANK, io::INT_VBLANK);
        assert_eq!(mmu.reg(io::LY), 144);
    }

    #[test]
    fn ly_holds_153_on_last_line() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        run(&mut ppu, &mut mmu, 153 * 456 + 100);
        assert_eq!(mmu.reg(io::LY), 153);
        run(&mut ppu, &mut mmu, 356 + 1);
        assert_eq!(mmu.reg(io::LY), 0);
    }

    #[test]
    fn coincidence_flag_tracks_lyc() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        mmu.set_reg(io::LYC, 2);
        run(&mut ppu, &mut mmu, 2 * 456 + 1);
        assert_eq!(mmu.reg(io::STAT) & 0x04, 0x04);
        run(&mut ppu, &mut mmu, 456);
        assert_eq!(mmu.reg(io::STAT) & 0x04, 0);
    }

    #[test]
    fn background_uses_bgp_shades() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        mmu.set_reg(io::BGP, 0xE4);
        for row in 0..8 {
            mmu.vram[0][row * 2] = 0xFF;
        }
        run(&mut ppu, &mut mmu, 456);
        assert_eq!(pixel(&ppu, 0, 0), [0xAA, 0xAA, 0xAA, 0xFF]);
        assert_eq!(pixel(&ppu, 159, 0), [0xAA, 0xAA, 0xAA, 0xFF]);
    }

    #[test]
    fn fine_scroll_still_fills_the_line() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        mmu.set_reg(io::BGP, 0xE4);
        mmu.set_reg(io::SCX, 7);
        for row in 0..8 {
            mmu.vram[0][row * 2 + 1] = 0xFF;
        }
        ppu.frame[..].fill(0x11);
        run(&mut ppu, &mut mmu, 456);
        assert_eq!(pixel(&ppu, 159, 0), [0x55, 0x55, 0x55, 0xFF]);
    }

    #[test]
    fn lcd_off_renders_white_without_interrupts() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        mmu.set_reg(io::LCDC, 0x11);
        mmu.set_reg(io::STAT, 0x78);
        mmu.set_reg(io::BGP, 0xFF);
        run(&mut ppu, &mut mmu, 154 * 456);
        assert_eq!(pixel(&ppu, 80, 80), [0xFF; 4]);
        assert_eq!(mmu.reg(io::IF), 0);
    }

    fn solid_tile(mmu: &mut Mmu, tile: usize, lo: u8, hi: u8) {
        for row in 0..8 {
            mmu.vram[0][tile * 16 + row * 2] = lo;
            mmu.vram[0][tile * 16 + row * 2 + 1] = hi;
        }
    }

    #[test]
    fn dmg_smaller_x_object_wins() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        mmu.set_reg(io::LCDC, 0x93);
        mmu.set_reg(io::OBP0, 0xE4);
        mmu.set_reg(io::OBP1, 0xE4);
        solid_tile(&mut mmu, 1, 0xFF, 0xFF);
        solid_tile(&mut mmu, 2, 0xFF, 0x00);
        mmu.oam[0..4].copy_from_slice(&[16, 10, 1, 0x00]);
        mmu.oam[4..8].copy_from_slice(&[16, 9, 2, 0x10]);
        run(&mut ppu, &mut mmu, 456);
        assert_eq!(pixel(&ppu, 0, 0), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(pixel(&ppu, 5, 0), [0xAA, 0xAA, 0xAA, 0xFF]);
        assert_eq!(pixel(&ppu, 9, 0), [0x00, 0x00, 0x00, 0xFF]);
    }

    #[test]
    fn priority_bit_hides_object_behind_opaque_background() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        mmu.set_reg(io::LCDC, 0x93);
        mmu.set_reg(io::BGP, 0xE4);
        mmu.set_reg(io::OBP0, 0xE4);
        solid_tile(&mut mmu, 0, 0xF0, 0x00);
        solid_tile(&mut mmu, 1, 0xFF, 0xFF);
        mmu.oam[0..4].copy_from_slice(&[16, 8, 1, 0x80]);
        run(&mut ppu, &mut mmu, 456);
        // background color 1 on the left half of the tile, color 0 on the right
        assert_eq!(pixel(&ppu, 0, 0), [0xAA, 0xAA, 0xAA, 0xFF]);
        assert_eq!(pixel(&ppu, 7, 0), [0x00, 0x00, 0x00, 0xFF]);
    }

    #[test]
    fn objects_hidden_during_oam_dma() {
        let mut mmu = mmu(Model::Dmg);
        let mut ppu = Ppu::new();
        mmu.set_reg(io::LCDC, 0x93);
        mmu.set_reg(io::OBP0, 0xE4);
        solid_tile(&mut mmu, 1, 0xFF, 0xFF);
        mmu.oam[0..4].copy_from_slice(&[16, 8, 1, 0x00]);
        run(&mut ppu, &mut mmu, 10);
        // the bus is never ticked here, so the transfer stays in flight
        mmu.write_byte(io::DMA, 0xC0);
        run(&mut ppu, &mut mmu, 100);
        assert_eq!(pixel(&ppu, 0, 0), [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn cgb_palette_conversion() {
        let mut ram = [0u8; 0x40];
        ram[0] = 0xFF;
        ram[1] = 0x7F;
        ram[2] = 0xE0;
        ram[3] = 0x03;
        ram[4] = 0x1F;
        assert_eq!(cgb_color(&ram, 0, 0), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(cgb_color(&ram, 0, 1), [0x00, 0xFF, 0x00, 0xFF]);
        assert_eq!(cgb_color(&ram, 0, 2), [0xFF, 0x00, 0x00, 0xFF]);
        assert_eq!(to8(16), 132);
    }

    #[test]
    fn cgb_tile_attributes_select_bank_and_palette() {
        let mut mmu = mmu(Model::Cgb);
        let mut ppu = Ppu::new();
        for row in 0..8 {
            mmu.vram[1][row * 2] = 0xFF;
        }
        mmu.vram[1][BG_MAP_0_BASE] = 0x08 | 0x02;
        // palette 2, color 1: pure blue
        mmu.bg_palette[2 * 8 + 2] = 0x00;
        mmu.bg_palette[2 * 8 + 3] = 0x7C;
        run(&mut ppu, &mut mmu, 456);
        assert_eq!(pixel(&ppu, 3, 0), [0x00, 0x00, 0xFF, 0xFF]);
        // tile 0 in bank 0 is blank and palette 0 is white after boot
        assert_eq!(pixel(&ppu, 8, 0), [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn signed_tile_addressing() {
        assert_eq!(tile_data_addr(0x10, 0x80), 0x0800);
        assert_eq!(tile_data_addr(0x00, 0x00), 0x1000);
        assert_eq!(tile_data_addr(0x00, 0x80), 0x0800);
        assert_eq!(tile_data_addr(0x00, 0x7F), 0x17F0);
    }
}
