use crate::io;

/// DIV/TIMA/TMA/TAC. TIMA counts falling edges of the selected divider bit
/// and the overflow reload from TMA lands one tick after the overflow.
#[derive(Debug, Clone)]
pub struct Timer {
    /// 16-bit internal divider counter. DIV register is the upper 8 bits.
    pub div: u16,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    last_signal: bool,
    /// TIMA overflowed on the previous tick and reloads on the next one.
    pending_reload: bool,
    /// The reload was applied during the current tick.
    reloading: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            last_signal: false,
            pending_reload: false,
            reloading: false,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            io::DIV => (self.div >> 8) as u8,
            io::TIMA => self.tima,
            io::TMA => self.tma,
            io::TAC => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            io::DIV => self.reset_div(if_reg),
            io::TIMA => {
                // the reload wins over a write landing on the same tick
                if self.reloading {
                    return;
                }
                self.tima = val;
                self.pending_reload = false;
            }
            io::TMA => {
                self.tma = val;
                if self.reloading {
                    self.tima = val;
                }
            }
            io::TAC => {
                let prev = self.signal();
                self.tac = val & 0x07;
                let new = self.signal();
                if prev && !new {
                    self.increment();
                }
                self.last_signal = new;
            }
            _ => {}
        }
    }

    /// Advance the divider by `cycles` and raise the timer interrupt in
    /// `if_reg` when a reload lands.
    pub fn step(&mut self, cycles: u16, if_reg: &mut u8) {
        for _ in 0..cycles {
            self.apply_reload(if_reg);
            self.div = self.div.wrapping_add(1);
            self.edge();
        }
    }

    /// Reset the internal divider counter, applying TIMA edge logic.
    pub fn reset_div(&mut self, if_reg: &mut u8) {
        self.apply_reload(if_reg);
        self.div = 0;
        self.edge();
    }

    fn apply_reload(&mut self, if_reg: &mut u8) {
        self.reloading = false;
        if self.pending_reload {
            self.tima = self.tma;
            *if_reg |= io::INT_TIMER;
            self.pending_reload = false;
            self.reloading = true;
        }
    }

    fn edge(&mut self) {
        let new = self.signal();
        if self.last_signal && !new {
            self.increment();
        }
        self.last_signal = new;
    }

    fn increment(&mut self) {
        if self.tima == 0xFF {
            self.tima = 0;
            self.pending_reload = true;
        } else {
            self.tima += 1;
        }
    }

    fn signal(&self) -> bool {
        if self.tac & 0x04 == 0 {
            return false;
        }
        let bit = match self.tac & 0x03 {
            0x00 => 9,
            0x01 => 3,
            0x02 => 5,
            _ => 7,
        };
        (self.div >> bit) & 1 != 0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
