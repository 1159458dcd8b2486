use log::info;

use crate::{
    apu::Apu,
    cartridge::Cartridge,
    cpu::{Cpu, CpuState, instr},
    error::{Error, Result},
    hardware::{AudioFrame, Frame, Model, TICKS_PER_FRAME},
    mmu::Mmu,
    ppu::Ppu,
    rtc::{Clock, RTC_STATE_LEN, SystemClock},
};

/// Boot ROM images supplied by the caller. The one matching the session's
/// model is mapped at power-on; without it the session starts from the
/// post-boot register state.
#[derive(Debug, Clone, Default)]
pub struct BootRoms {
    pub dmg: Option<Vec<u8>>,
    pub cgb: Option<Vec<u8>>,
}

impl BootRoms {
    fn select(self, model: Model) -> Result<Option<Vec<u8>>> {
        let image = match model {
            Model::Dmg => self.dmg,
            Model::Cgb => self.cgb,
        };
        match image {
            Some(image) if image.len() != model.boot_rom_len() => Err(Error::BootRomSize {
                model: model.name(),
                len: image.len(),
                expected: model.boot_rom_len(),
            }),
            image => Ok(image),
        }
    }
}

/// One emulation session: the four units stepped in lock-step against a
/// shared bus.
pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    pub ppu: Ppu,
    pub apu: Apu,
    model: Model,
}

impl GameBoy {
    /// Build a session whose model follows the cartridge header.
    pub fn new(rom: Vec<u8>, boot: BootRoms) -> Result<Self> {
        Self::with_model(rom, boot, None)
    }

    /// Build a session, optionally forcing the console model.
    pub fn with_model(rom: Vec<u8>, boot: BootRoms, model: Option<Model>) -> Result<Self> {
        Self::with_clock(rom, boot, model, Box::new(SystemClock))
    }

    /// Build a session whose cartridge RTC reads time from `clock`.
    pub fn with_clock(
        rom: Vec<u8>,
        boot: BootRoms,
        model: Option<Model>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        let cart = Cartridge::with_clock(rom, clock)?;
        let model = model.unwrap_or(if cart.cgb { Model::Cgb } else { Model::Dmg });
        let boot_rom = boot.select(model)?;
        let cpu = if boot_rom.is_some() {
            Cpu::new()
        } else {
            Cpu::new_post_boot(model)
        };
        info!(
            "{} session for \"{}\" ({:?}), boot ROM {}",
            model.name(),
            cart.title,
            cart.mbc,
            if boot_rom.is_some() { "mapped" } else { "skipped" }
        );
        Ok(Self {
            cpu,
            mmu: Mmu::new(cart, model, boot_rom),
            ppu: Ppu::new(),
            apu: Apu::new(),
            model,
        })
    }

    pub fn model(&self) -> Model {
        self.model
    }

    /// Advance every unit by one master tick.
    pub fn tick(&mut self) {
        self.mmu.tick();
        self.cpu.tick(&mut self.mmu);
        self.apu.tick(&mut self.mmu);
        self.ppu.tick(&mut self.mmu);
    }

    /// Run one video frame with `buttons` held (see [`crate::joypad`]).
    /// Returns the RGBA frame and the frame's interleaved stereo samples.
    ///
    /// A CPU in STOP freezes the machine until a button is held; the frame
    /// then ends early with whatever has been produced so far.
    pub fn run_frame(&mut self, buttons: u8) -> (&Frame, &AudioFrame) {
        self.mmu.set_buttons(buttons);
        if buttons != 0 && self.cpu.state == CpuState::Stop {
            self.cpu.state = CpuState::Running;
        }
        for _ in 0..TICKS_PER_FRAME {
            self.tick();
            if self.cpu.state == CpuState::Stop {
                break;
            }
        }
        (self.ppu.frame(), self.apu.samples())
    }

    /// Format the instruction at `pc` without side effects.
    pub fn disassemble(&self, pc: u16) -> String {
        let opcode = self.mmu.peek(pc);
        let descriptor = if opcode == 0xCB {
            &instr::EXTENDED[self.mmu.peek(pc.wrapping_add(1)) as usize]
        } else {
            &instr::PRIMARY[opcode as usize]
        };
        descriptor.disasm(&self.mmu, pc)
    }

    /// Battery-backed cartridge RAM, if the cartridge has a battery.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.mmu.cart.battery_ram()
    }

    pub fn load_battery_ram(&mut self, data: &[u8]) -> Result<()> {
        self.mmu.cart.load_battery_ram(data)
    }

    /// Raw RTC offsets, if the cartridge has a clock.
    pub fn rtc_state(&self) -> Option<[u8; RTC_STATE_LEN]> {
        self.mmu.cart.rtc_state()
    }

    pub fn load_rtc_state(&mut self, data: &[u8]) -> Result<()> {
        self.mmu.cart.load_rtc_state(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom(cgb: bool) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0143] = if cgb { 0xC0 } else { 0x00 };
        rom
    }

    #[test]
    fn model_follows_header_unless_forced() {
        let gb = GameBoy::new(rom(true), BootRoms::default()).unwrap();
        assert_eq!(gb.model(), Model::Cgb);
        assert_eq!(gb.cpu.a, 0x11);
        let gb = GameBoy::with_model(rom(true), BootRoms::default(), Some(Model::Dmg)).unwrap();
        assert_eq!(gb.model(), Model::Dmg);
        assert_eq!(gb.cpu.a, 0x01);
    }

    #[test]
    fn boot_rom_size_is_checked_for_selected_model() {
        let boot = BootRoms {
            dmg: Some(vec![0; 0x80]),
            cgb: None,
        };
        assert_eq!(
            GameBoy::new(rom(false), boot.clone()).err(),
            Some(Error::BootRomSize {
                model: "DMG",
                len: 0x80,
                expected: 0x100
            })
        );
        // the DMG image is not consulted for a CGB session
        assert!(GameBoy::new(rom(true), boot).is_ok());
    }

    #[test]
    fn boot_rom_starts_at_zero() {
        let boot = BootRoms {
            dmg: Some(vec![0; 0x100]),
            cgb: None,
        };
        let gb = GameBoy::new(rom(false), boot).unwrap();
        assert_eq!(gb.cpu.pc, 0x0000);
        assert!(gb.mmu.boot_mapped());
    }

    #[test]
    fn disassemble_reads_operands() {
        let mut image = rom(false);
        image[0x0100..0x0103].copy_from_slice(&[0xC2, 0x50, 0x01]);
        image[0x0103..0x0105].copy_from_slice(&[0xCB, 0x7C]);
        let gb = GameBoy::new(image, BootRoms::default()).unwrap();
        assert_eq!(gb.disassemble(0x0100), "jp nz, $0150");
        assert_eq!(gb.disassemble(0x0103), "bit 7, h");
    }

    #[test]
    fn persistence_requires_matching_hardware() {
        let mut gb = GameBoy::new(rom(false), BootRoms::default()).unwrap();
        assert!(gb.battery_ram().is_none());
        assert!(gb.rtc_state().is_none());
        assert_eq!(gb.load_battery_ram(&[0; 8]), Err(Error::NoBattery));
        assert_eq!(gb.load_rtc_state(&[0; 16]), Err(Error::NoRtc));
    }
}
