//! Controller state and the JOYP select matrix.

pub const RIGHT: u8 = 0x01;
pub const LEFT: u8 = 0x02;
pub const UP: u8 = 0x04;
pub const DOWN: u8 = 0x08;
pub const A: u8 = 0x10;
pub const B: u8 = 0x20;
pub const SELECT: u8 = 0x40;
pub const START: u8 = 0x80;

#[derive(Debug, Clone, Copy, Default)]
pub struct Joypad {
    /// Held buttons, one bit per constant above.
    pub buttons: u8,
    /// JOYP bits 4-5 as last written.
    pub select: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            buttons: 0,
            select: 0x30,
        }
    }

    /// Replace the held set and return the buttons that went down.
    pub fn set_buttons(&mut self, buttons: u8) -> u8 {
        let pressed = buttons & !self.buttons;
        self.buttons = buttons;
        pressed
    }

    pub fn read(&self) -> u8 {
        let mut v = 0x0F | self.select;
        if self.select & 0x10 == 0 {
            v &= !(self.buttons & 0x0F);
        }
        if self.select & 0x20 == 0 {
            v &= !(self.buttons >> 4);
        }
        v | 0xC0
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }
}
