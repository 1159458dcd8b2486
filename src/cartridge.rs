use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::rtc::{Clock, Rtc, SystemClock};

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;
const MBC2_RAM_SIZE: usize = 0x200;
const HEADER_END: usize = 0x150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
    Mmm01,
    Mbc6,
    Mbc7,
    PocketCamera,
    Tama5,
    HuC3,
    HuC1,
}

impl MbcType {
    /// Mappers that are recognised in the header but not emulated. They read
    /// as zero outside the fixed bank and ignore writes.
    pub const fn is_stub(self) -> bool {
        matches!(
            self,
            MbcType::Mmm01
                | MbcType::Mbc6
                | MbcType::Mbc7
                | MbcType::PocketCamera
                | MbcType::Tama5
                | MbcType::HuC3
                | MbcType::HuC1
        )
    }
}

/// Extra hardware declared by the cartridge type byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CartOptions {
    pub ram: bool,
    pub battery: bool,
    pub timer: bool,
    pub rumble: bool,
    pub sensor: bool,
}

impl CartOptions {
    const NONE: Self = Self {
        ram: false,
        battery: false,
        timer: false,
        rumble: false,
        sensor: false,
    };
    const RAM: Self = Self {
        ram: true,
        ..Self::NONE
    };
    const RAM_BATTERY: Self = Self {
        ram: true,
        battery: true,
        ..Self::NONE
    };
}

#[derive(Debug)]
pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    pub mbc: MbcType,
    pub options: CartOptions,
    pub cgb: bool,
    pub title: String,
    rom_banks: usize,
    ram_banks: usize,
    rom_bank: u16,
    ram_bank: u8,
    ram_enable: bool,
    bank_mode: bool,
    /// Byte offset of the bank mapped at 0x4000-0x7FFF.
    rom_offset: usize,
    /// Byte offset of the bank mapped at 0xA000-0xBFFF, `None` when denied.
    ram_offset: Option<usize>,
    rtc: Option<Rtc>,
    clock: Box<dyn Clock>,
}

impl Cartridge {
    pub fn new(rom: Vec<u8>) -> Result<Self> {
        Self::with_clock(rom, Box::new(SystemClock))
    }

    /// Build a cartridge whose RTC (if any) reads time from `clock`.
    pub fn with_clock(rom: Vec<u8>, clock: Box<dyn Clock>) -> Result<Self> {
        if rom.len() < HEADER_END {
            return Err(Error::RomTooShort { len: rom.len() });
        }
        let header = Header::parse(&rom);
        let expected = header.rom_size()?;
        if rom.len() < expected {
            return Err(Error::RomSizeMismatch {
                len: rom.len(),
                expected,
            });
        }
        let mut ram_banks = header.ram_banks()?;
        let (mbc, options) = header.kind()?;
        let ram_size = if mbc == MbcType::Mbc2 {
            ram_banks = 1;
            MBC2_RAM_SIZE
        } else {
            ram_banks * RAM_BANK_SIZE
        };
        let rtc = options.timer.then(|| Rtc::new(clock.now()));
        let cgb = header.cgb_supported();
        let title = header.title();

        let mut cart = Self {
            rom_banks: rom.len() / ROM_BANK_SIZE,
            rom,
            ram: vec![0; ram_size],
            mbc,
            options,
            cgb,
            title,
            ram_banks,
            rom_bank: if mbc == MbcType::Mbc5 { 1 } else { 0 },
            ram_bank: 0,
            ram_enable: false,
            bank_mode: false,
            rom_offset: ROM_BANK_SIZE,
            ram_offset: None,
            rtc,
            clock,
        };
        cart.update_rom_bank();
        cart.update_ram_bank();

        info!(
            "Loaded ROM: {} (MBC: {:?}, ROM banks: {}, RAM banks: {}, CGB: {})",
            cart.title,
            cart.mbc,
            cart.rom_banks,
            cart.ram_banks,
            if cart.cgb { "yes" } else { "no" }
        );
        Ok(cart)
    }

    fn clamp_rom_bank(&self, bank: usize) -> usize {
        if bank > self.rom_banks {
            warn!(
                "invalid {:?} ROM bank {:#x} / {:#x}",
                self.mbc, bank, self.rom_banks
            );
            bank % (self.rom_banks + 1)
        } else {
            bank
        }
    }

    fn update_rom_bank(&mut self) {
        let bank = match self.mbc {
            MbcType::Mbc1 => {
                let mut bank = if self.bank_mode {
                    self.rom_bank as usize
                } else {
                    self.rom_bank as usize | ((self.ram_bank as usize & 0x03) << 5)
                };
                if bank & 0x1F == 0 {
                    bank += 1;
                }
                self.clamp_rom_bank(bank)
            }
            MbcType::Mbc2 => self.clamp_rom_bank((self.rom_bank as usize).max(1)),
            MbcType::Mbc3 => {
                let bank = self.clamp_rom_bank(self.rom_bank as usize);
                if self.rom_bank == 0 { 1 } else { bank }
            }
            MbcType::Mbc5 => self.clamp_rom_bank(self.rom_bank as usize),
            _ => 1,
        };
        self.rom_offset = bank * ROM_BANK_SIZE;
    }

    fn update_ram_bank(&mut self) {
        self.ram_offset = if !self.ram_enable {
            None
        } else {
            match self.mbc {
                MbcType::Mbc1 if !self.bank_mode => (self.ram_banks > 0).then_some(0),
                MbcType::Mbc2 => Some(0),
                MbcType::Mbc3 if self.ram_bank > 0x03 => None,
                MbcType::Mbc1 | MbcType::Mbc3 | MbcType::Mbc5 => {
                    if self.ram_bank as usize >= self.ram_banks {
                        debug!(
                            "invalid {:?} RAM bank {:#x} / {:#x}",
                            self.mbc, self.ram_bank, self.ram_banks
                        );
                        None
                    } else {
                        Some(self.ram_bank as usize * RAM_BANK_SIZE)
                    }
                }
                _ => None,
            }
        };
    }

    fn rtc_selected(&self) -> bool {
        self.ram_enable && self.rtc.is_some() && (0x08..=0x0C).contains(&self.ram_bank)
    }

    pub fn read(&self, addr: u16) -> u8 {
        let a = addr as usize;
        match (self.mbc, addr) {
            (_, 0x0000..=0x3FFF) => self.rom.get(a).copied().unwrap_or(0xFF),
            (mbc, _) if mbc.is_stub() => 0x00,
            (MbcType::NoMbc, 0x4000..=0x7FFF) => self.rom.get(a).copied().unwrap_or(0xFF),
            (_, 0x4000..=0x7FFF) => self
                .rom
                .get(self.rom_offset + a - 0x4000)
                .copied()
                .unwrap_or(0xFF),
            (MbcType::Mbc2, 0xA000..=0xBFFF) => match self.ram_offset {
                Some(_) => self
                    .ram
                    .get(a - 0xA000)
                    .map(|v| v & 0x0F)
                    .unwrap_or(0xFF),
                None => 0xFF,
            },
            (MbcType::Mbc3, 0xA000..=0xBFFF) if self.ram_bank > 0x03 => {
                if !self.rtc_selected() {
                    return 0xFF;
                }
                self.rtc
                    .as_ref()
                    .map(|rtc| rtc.read(self.ram_bank, self.clock.now()))
                    .unwrap_or(0xFF)
            }
            (MbcType::Mbc1 | MbcType::Mbc3 | MbcType::Mbc5, 0xA000..=0xBFFF) => self
                .ram_offset
                .and_then(|off| self.ram.get(off + a - 0xA000))
                .copied()
                .unwrap_or(0xFF),
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        let a = addr as usize;
        match (self.mbc, addr) {
            (MbcType::Mbc1 | MbcType::Mbc2 | MbcType::Mbc3, 0x0000..=0x1FFF) => {
                self.ram_enable = val & 0x0F == 0x0A;
                self.update_ram_bank();
            }
            (MbcType::Mbc5, 0x0000..=0x1FFF) => {
                self.ram_enable = val == 0x0A;
                self.update_ram_bank();
            }
            (MbcType::Mbc1, 0x2000..=0x3FFF) => {
                self.rom_bank = (val & 0x1F) as u16;
                self.update_rom_bank();
            }
            (MbcType::Mbc1, 0x4000..=0x5FFF) => {
                self.ram_bank = val & 0x03;
                self.update_rom_bank();
                self.update_ram_bank();
            }
            (MbcType::Mbc1, 0x6000..=0x7FFF) => {
                self.bank_mode = val & 0x01 != 0;
                self.update_rom_bank();
                self.update_ram_bank();
            }
            (MbcType::Mbc2, 0x2000..=0x3FFF) => {
                self.rom_bank = (val & 0x0F) as u16;
                self.update_rom_bank();
            }
            (MbcType::Mbc2, 0xA000..=0xBFFF) => {
                if self.ram_offset.is_none() {
                    return;
                }
                let off = a - 0xA000;
                if off >= MBC2_RAM_SIZE {
                    debug!("invalid MBC2 RAM write: {addr:#06x}");
                    return;
                }
                self.ram[off] = val & 0x0F;
            }
            (MbcType::Mbc3, 0x2000..=0x3FFF) => {
                self.rom_bank = (val & 0x7F) as u16;
                self.update_rom_bank();
            }
            (MbcType::Mbc3, 0x4000..=0x5FFF) => {
                self.ram_bank = val;
                self.update_ram_bank();
            }
            // Latching is implicit: every RTC read samples the clock.
            (MbcType::Mbc3, 0x6000..=0x7FFF) => {}
            (MbcType::Mbc3, 0xA000..=0xBFFF) if self.ram_bank > 0x03 => {
                if !self.rtc_selected() {
                    return;
                }
                let now = self.clock.now();
                let reg = self.ram_bank;
                if let Some(rtc) = self.rtc.as_mut() {
                    rtc.write(reg, val, now);
                }
            }
            (MbcType::Mbc5, 0x2000..=0x2FFF) => {
                self.rom_bank = (self.rom_bank & 0xFF00) | val as u16;
                self.update_rom_bank();
            }
            (MbcType::Mbc5, 0x3000..=0x3FFF) => {
                self.rom_bank = (self.rom_bank & 0x00FF) | (((val as u16) << 8) & 0x100);
                self.update_rom_bank();
            }
            (MbcType::Mbc5, 0x4000..=0x5FFF) => {
                // Bit 3 drives the rumble motor on rumble carts.
                self.ram_bank = if self.options.rumble { val & !0x08 } else { val };
                self.update_ram_bank();
            }
            (MbcType::Mbc1 | MbcType::Mbc3 | MbcType::Mbc5, 0xA000..=0xBFFF) => {
                if let Some(off) = self.ram_offset
                    && let Some(b) = self.ram.get_mut(off + a - 0xA000)
                {
                    *b = val;
                }
            }
            _ => {}
        }
    }

    pub fn rom_banks(&self) -> usize {
        self.rom_banks
    }

    pub fn ram_banks(&self) -> usize {
        self.ram_banks
    }

    pub fn has_battery(&self) -> bool {
        self.options.battery && !self.ram.is_empty()
    }

    pub fn has_rtc(&self) -> bool {
        self.rtc.is_some()
    }

    /// Battery-backed RAM contents, if the cartridge declares a battery.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.has_battery().then_some(self.ram.as_slice())
    }

    pub fn load_battery_ram(&mut self, data: &[u8]) -> Result<()> {
        if !self.has_battery() {
            return Err(Error::NoBattery);
        }
        if data.len() != self.ram.len() {
            return Err(Error::SaveSize {
                len: data.len(),
                expected: self.ram.len(),
            });
        }
        self.ram.copy_from_slice(data);
        Ok(())
    }

    pub fn rtc_state(&self) -> Option<[u8; crate::rtc::RTC_STATE_LEN]> {
        self.rtc.as_ref().map(Rtc::to_bytes)
    }

    pub fn load_rtc_state(&mut self, data: &[u8]) -> Result<()> {
        let rtc = self.rtc.as_mut().ok_or(Error::NoRtc)?;
        *rtc = Rtc::from_bytes(data)?;
        Ok(())
    }
}

struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn byte(&self, addr: usize) -> u8 {
        self.data.get(addr).copied().unwrap_or(0)
    }

    fn title(&self) -> String {
        let end = 0x0143.min(self.data.len());
        let mut slice = &self.data[0x0134.min(self.data.len())..end];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    fn cgb_supported(&self) -> bool {
        self.byte(0x0143) & 0x80 != 0
    }

    /// Image size declared at 0x148.
    fn rom_size(&self) -> Result<usize> {
        match self.byte(0x0148) {
            code @ 0x00..=0x08 => Ok((32 * 1024) << code),
            0x52 => Ok(72 * ROM_BANK_SIZE),
            0x53 => Ok(80 * ROM_BANK_SIZE),
            0x54 => Ok(96 * ROM_BANK_SIZE),
            code => Err(Error::UnknownRomSize(code)),
        }
    }

    fn ram_banks(&self) -> Result<usize> {
        match self.byte(0x0149) {
            0x00 | 0x01 => Ok(0),
            0x02 => Ok(1),
            0x03 => Ok(4),
            0x04 => Ok(16),
            0x05 => Ok(8),
            code => Err(Error::UnsupportedRamSize(code)),
        }
    }

    fn kind(&self) -> Result<(MbcType, CartOptions)> {
        let none = CartOptions::NONE;
        let kind = match self.byte(0x0147) {
            0x00 => (MbcType::NoMbc, none),
            0x01 => (MbcType::Mbc1, none),
            0x02 => (MbcType::Mbc1, CartOptions::RAM),
            0x03 => (MbcType::Mbc1, CartOptions::RAM_BATTERY),
            0x05 => (MbcType::Mbc2, none),
            0x06 => (
                MbcType::Mbc2,
                CartOptions {
                    battery: true,
                    ..none
                },
            ),
            0x0B => (MbcType::Mmm01, none),
            0x0C => (MbcType::Mmm01, CartOptions::RAM),
            0x0D => (MbcType::Mmm01, CartOptions::RAM_BATTERY),
            0x0F => (
                MbcType::Mbc3,
                CartOptions {
                    timer: true,
                    battery: true,
                    ..none
                },
            ),
            0x10 => (
                MbcType::Mbc3,
                CartOptions {
                    timer: true,
                    ..CartOptions::RAM_BATTERY
                },
            ),
            0x11 => (MbcType::Mbc3, none),
            0x12 => (MbcType::Mbc3, CartOptions::RAM),
            0x13 => (MbcType::Mbc3, CartOptions::RAM_BATTERY),
            0x19 => (MbcType::Mbc5, none),
            0x1A => (MbcType::Mbc5, CartOptions::RAM),
            0x1B => (MbcType::Mbc5, CartOptions::RAM_BATTERY),
            0x1C => (
                MbcType::Mbc5,
                CartOptions {
                    rumble: true,
                    ..none
                },
            ),
            0x1D => (
                MbcType::Mbc5,
                CartOptions {
                    rumble: true,
                    ..CartOptions::RAM
                },
            ),
            0x1E => (
                MbcType::Mbc5,
                CartOptions {
                    rumble: true,
                    ..CartOptions::RAM_BATTERY
                },
            ),
            0x20 => (MbcType::Mbc6, none),
            0x22 => (
                MbcType::Mbc7,
                CartOptions {
                    sensor: true,
                    rumble: true,
                    ..CartOptions::RAM_BATTERY
                },
            ),
            0xFC => (MbcType::PocketCamera, none),
            0xFD => (MbcType::Tama5, none),
            0xFE => (MbcType::HuC3, none),
            0xFF => (MbcType::HuC1, CartOptions::RAM_BATTERY),
            code => return Err(Error::UnsupportedCartridge(code)),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtc::ManualClock;

    /// Image whose every ROM bank starts with its own bank number.
    fn image(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
        let len = (32 * 1024) << rom_code;
        let mut rom = vec![0u8; len];
        for (bank, chunk) in rom.chunks_mut(ROM_BANK_SIZE).enumerate() {
            chunk[0] = bank as u8;
            chunk[1] = (bank >> 8) as u8;
        }
        rom[0x0134..0x0138].copy_from_slice(b"TEST");
        rom[0x0147] = cart_type;
        rom[0x0148] = rom_code;
        rom[0x0149] = ram_code;
        rom
    }

    fn bank_at_4000(cart: &Cartridge) -> u16 {
        cart.read(0x4000) as u16 | ((cart.read(0x4001) as u16) << 8)
    }

    #[test]
    fn rejects_malformed_images() {
        assert_eq!(
            Cartridge::new(vec![0; 0x100]).unwrap_err(),
            Error::RomTooShort { len: 0x100 }
        );

        let mut rom = image(0x00, 0, 0);
        rom[0x0148] = 1;
        assert_eq!(
            Cartridge::new(rom).unwrap_err(),
            Error::RomSizeMismatch {
                len: 0x8000,
                expected: 0x10000
            }
        );

        let mut rom = image(0x00, 0, 0);
        rom[0x0149] = 0x07;
        assert_eq!(
            Cartridge::new(rom).unwrap_err(),
            Error::UnsupportedRamSize(0x07)
        );

        for code in [0x08, 0x09, 0x42] {
            assert_eq!(
                Cartridge::new(image(code, 0, 0)).unwrap_err(),
                Error::UnsupportedCartridge(code)
            );
        }
    }

    #[test]
    fn header_fields() {
        let mut rom = image(0x1B, 1, 0x03);
        rom[0x0143] = 0x80;
        let cart = Cartridge::new(rom).unwrap();
        assert_eq!(cart.title, "TEST");
        assert!(cart.cgb);
        assert_eq!(cart.mbc, MbcType::Mbc5);
        assert_eq!(cart.rom_banks(), 4);
        assert_eq!(cart.ram_banks(), 4);
        assert!(cart.has_battery());
    }

    #[test]
    fn mbc1_out_of_range_bank_wraps() {
        // 4 banks: bank 6 wraps to 6 % 5 = 1.
        let mut cart = Cartridge::new(image(0x01, 1, 0)).unwrap();
        cart.write(0x2000, 0x06);
        assert_eq!(bank_at_4000(&cart), 1);
        cart.write(0x2000, 0x03);
        assert_eq!(bank_at_4000(&cart), 3);
    }

    #[test]
    fn mbc1_upper_bits_select_high_banks_in_mode_0() {
        let mut cart = Cartridge::new(image(0x01, 6, 0)).unwrap();
        cart.write(0x2000, 0x02);
        cart.write(0x4000, 0x01);
        assert_eq!(bank_at_4000(&cart), 0x22);
        cart.write(0x6000, 0x01);
        assert_eq!(bank_at_4000(&cart), 0x02);
    }

    #[test]
    fn mbc1_ram_requires_enable() {
        let mut cart = Cartridge::new(image(0x03, 0, 0x03)).unwrap();
        cart.write(0xA000, 0x55);
        assert_eq!(cart.read(0xA000), 0xFF);
        cart.write(0x0000, 0x0A);
        cart.write(0xA000, 0x55);
        assert_eq!(cart.read(0xA000), 0x55);
        cart.write(0x0000, 0x00);
        assert_eq!(cart.read(0xA000), 0xFF);
    }

    #[test]
    fn mbc2_stores_nibbles_in_512_entries() {
        let mut cart = Cartridge::new(image(0x06, 1, 0)).unwrap();
        cart.write(0x0000, 0x0A);
        cart.write(0xA000, 0xAB);
        assert_eq!(cart.read(0xA000), 0x0B);
        cart.write(0xA200, 0x07);
        assert_eq!(cart.battery_ram().unwrap().len(), MBC2_RAM_SIZE);

        cart.write(0x2000, 0x00);
        assert_eq!(bank_at_4000(&cart), 1);
        cart.write(0x2000, 0x02);
        assert_eq!(bank_at_4000(&cart), 2);
    }

    #[test]
    fn mbc2_rom_bank_uses_low_nibble() {
        let mut cart = Cartridge::new(image(0x06, 1, 0)).unwrap();
        cart.write(0x2000, 0x13);
        assert_eq!(bank_at_4000(&cart), 3);
        cart.write(0x2000, 0xF0);
        assert_eq!(bank_at_4000(&cart), 1);
    }

    #[test]
    fn mbc3_denies_missing_ram_banks() {
        let mut cart = Cartridge::new(image(0x13, 1, 0x02)).unwrap();
        cart.write(0x0000, 0x0A);
        cart.write(0x4000, 0x00);
        cart.write(0xA000, 0x12);
        assert_eq!(cart.read(0xA000), 0x12);

        cart.write(0x4000, 0x02);
        cart.write(0xA000, 0x34);
        assert_eq!(cart.read(0xA000), 0xFF);

        // Banks 4-7 are neither RAM nor RTC.
        cart.write(0x4000, 0x05);
        assert_eq!(cart.read(0xA000), 0xFF);

        // No timer on this cart.
        cart.write(0x4000, 0x08);
        assert_eq!(cart.read(0xA000), 0xFF);
    }

    #[test]
    fn mbc3_bank_zero_maps_bank_one() {
        let mut cart = Cartridge::new(image(0x11, 2, 0)).unwrap();
        cart.write(0x2000, 0x00);
        assert_eq!(bank_at_4000(&cart), 1);
        cart.write(0x2000, 0x85);
        assert_eq!(bank_at_4000(&cart), 5);
    }

    #[test]
    fn mbc3_rtc_reads_through_clock() {
        let clock = ManualClock::new(86_400 * 1000);
        let mut cart = Cartridge::with_clock(image(0x10, 1, 0x02), Box::new(clock.clone())).unwrap();
        assert!(cart.has_rtc());
        cart.write(0x0000, 0x0A);
        cart.write(0x4000, 0x08);
        cart.write(0xA000, 50);
        assert_eq!(cart.read(0xA000), 50);
        clock.advance(15);
        assert_eq!(cart.read(0xA000), 5);
        cart.write(0x4000, 0x09);
        assert_eq!(cart.read(0xA000), 1);

        cart.write(0x0000, 0x00);
        assert_eq!(cart.read(0xA000), 0xFF);

        let saved = cart.rtc_state().unwrap();
        cart.load_rtc_state(&saved).unwrap();
        assert_eq!(cart.rtc_state().unwrap(), saved);
    }

    #[test]
    fn mbc5_nine_bit_rom_bank_and_bank_zero() {
        let mut cart = Cartridge::new(image(0x19, 8, 0)).unwrap();
        assert_eq!(bank_at_4000(&cart), 1);
        cart.write(0x2000, 0x00);
        assert_eq!(bank_at_4000(&cart), 0);
        cart.write(0x2000, 0x05);
        cart.write(0x3000, 0x01);
        assert_eq!(bank_at_4000(&cart), 0x105);
    }

    #[test]
    fn mbc5_ram_enable_requires_exact_value() {
        let mut cart = Cartridge::new(image(0x1A, 1, 0x03)).unwrap();
        cart.write(0x0000, 0x1A);
        cart.write(0xA000, 0x42);
        assert_eq!(cart.read(0xA000), 0xFF);
        cart.write(0x0000, 0x0A);
        cart.write(0x4000, 0x03);
        cart.write(0xA000, 0x42);
        assert_eq!(cart.read(0xA000), 0x42);
    }

    #[test]
    fn stub_mappers_read_zero_above_fixed_bank() {
        let mut cart = Cartridge::new(image(0xFE, 1, 0)).unwrap();
        assert_eq!(cart.mbc, MbcType::HuC3);
        assert_eq!(cart.read(0x0134), b'T');
        assert_eq!(cart.read(0x4000), 0x00);
        cart.write(0x2000, 0x02);
        assert_eq!(cart.read(0x4000), 0x00);
        assert_eq!(cart.read(0xA000), 0x00);
    }

    #[test]
    fn battery_ram_round_trip() {
        let mut cart = Cartridge::new(image(0x03, 0, 0x02)).unwrap();
        let mut save = vec![0u8; RAM_BANK_SIZE];
        save[0] = 0x99;
        cart.load_battery_ram(&save).unwrap();
        cart.write(0x0000, 0x0A);
        assert_eq!(cart.read(0xA000), 0x99);
        assert_eq!(
            cart.load_battery_ram(&[0; 4]),
            Err(Error::SaveSize {
                len: 4,
                expected: RAM_BANK_SIZE
            })
        );

        let mut plain = Cartridge::new(image(0x01, 0, 0)).unwrap();
        assert!(plain.battery_ram().is_none());
        assert_eq!(plain.load_battery_ram(&save), Err(Error::NoBattery));
        assert_eq!(plain.load_rtc_state(&[0; 16]), Err(Error::NoRtc));
    }
}
