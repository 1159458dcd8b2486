//! LR35902 instruction engine.
//!
//! Instructions execute as explicit micro-step state machines: the CPU holds
//! a reference to the current descriptor and a step counter, and every CPU
//! step (one machine cycle) advances the descriptor by exactly one step.

pub mod instr;

#[cfg(feature = "cpu-trace")]
use log::trace;

use crate::{hardware::Model, io, mmu::Mmu};
use instr::{EXTENDED, INTERRUPTS, Instr, PRIMARY};

// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
pub const FLAG_Z: u8 = 0x80; // Zero
pub const FLAG_N: u8 = 0x40; // Subtract
pub const FLAG_H: u8 = 0x20; // Half Carry
pub const FLAG_C: u8 = 0x10; // Carry

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

const DMG_BOOT_A: u8 = 0x01;
const CGB_BOOT_A: u8 = 0x11;
const BOOT_F: u8 = 0xB0;
const BOOT_B: u8 = 0x00;
const BOOT_C: u8 = 0x13;
const BOOT_D: u8 = 0x00;
const BOOT_E: u8 = 0xD8;
const BOOT_H: u8 = 0x01;
const BOOT_L: u8 = 0x4D;

// Master ticks per CPU step
const TICKS_PER_STEP: u8 = 4;
const TICKS_PER_STEP_DOUBLE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuState {
    #[default]
    Running,
    /// Waiting for `IF & IE` to become non-zero.
    Halt,
    /// Waiting for a button press.
    Stop,
}

#[derive(Debug, Clone)]
pub struct Cpu {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    pub ime: bool,
    pub state: CpuState,
    /// Steps left until EI takes effect; IME turns on when it reaches zero.
    ei_delay: u8,
    instr: Option<&'static Instr>,
    step: u8,
    /// Scratch carried between the steps of one instruction.
    tmp: [u16; 2],
    hdma_wait: u32,
    phase: u8,
}

impl Cpu {
    /// Power-on state for running a boot ROM from 0x0000.
    pub fn new() -> Self {
        Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            pc: 0x0000,
            sp: 0x0000,
            ime: false,
            state: CpuState::Running,
            ei_delay: 0,
            instr: None,
            step: 0,
            tmp: [0; 2],
            hdma_wait: 0,
            phase: 0,
        }
    }

    /// Register state the boot ROM hands over at 0x0100.
    pub fn new_post_boot(model: Model) -> Self {
        Self {
            a: if model.is_cgb() { CGB_BOOT_A } else { DMG_BOOT_A },
            f: BOOT_F,
            b: BOOT_B,
            c: BOOT_C,
            d: BOOT_D,
            e: BOOT_E,
            h: BOOT_H,
            l: BOOT_L,
            pc: BOOT_PC,
            sp: BOOT_SP,
            ..Self::new()
        }
    }

    pub fn get_af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f as u16
    }

    fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = val as u8 & 0xF0;
    }

    pub fn get_bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn get_de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn get_hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    #[inline]
    fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    #[inline]
    fn set_flag(&mut self, mask: u8, on: bool) {
        if on {
            self.f |= mask;
        } else {
            self.f &= !mask;
        }
    }

    /// Whether an instruction is mid-execution.
    pub fn busy(&self) -> bool {
        self.instr.is_some()
    }

    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X}",
            self.get_af(),
            self.get_bc(),
            self.get_de(),
            self.get_hl(),
            self.pc,
            self.sp,
        )
    }

    /// Advance by one master tick. A CPU step runs on the first tick of
    /// every 4 (2 in double speed).
    pub fn tick(&mut self, mmu: &mut Mmu) {
        if self.phase == 0 {
            self.step(mmu);
        }
        let period = if mmu.double_speed {
            TICKS_PER_STEP_DOUBLE
        } else {
            TICKS_PER_STEP
        };
        self.phase = (self.phase + 1) % period;
    }

    /// Run one machine cycle.
    pub fn step(&mut self, mmu: &mut Mmu) {
        self.hdma_wait += mmu.take_hdma_stall();
        if self.hdma_wait > 0 {
            self.hdma_wait -= 1;
            return;
        }

        match self.state {
            CpuState::Stop => return,
            CpuState::Halt => {
                if mmu.reg(io::IF) & mmu.reg(io::IE) & 0x1F == 0 {
                    return;
                }
                self.state = CpuState::Running;
            }
            CpuState::Running => {}
        }

        let instr = match self.instr {
            Some(instr) => instr,
            None => {
                let instr = self.decode(mmu);
                self.instr = Some(instr);
                self.step = 0;
                instr
            }
        };

        if instr.exec(self, mmu) {
            self.instr = None;
            if self.ei_delay > 0 {
                self.ei_delay -= 1;
                if self.ei_delay == 0 {
                    self.ime = true;
                }
            }
        } else {
            self.step += 1;
        }
    }

    /// Pick the next descriptor: a pending enabled interrupt when IME is set,
    /// otherwise the opcode at PC.
    fn decode(&mut self, mmu: &mut Mmu) -> &'static Instr {
        let pending = mmu.reg(io::IF) & mmu.reg(io::IE) & 0x1F;
        if self.ime && pending != 0 {
            let index = pending.trailing_zeros() as usize;
            let if_reg = mmu.reg(io::IF) & !(1 << index);
            mmu.set_reg(io::IF, if_reg);
            #[cfg(feature = "cpu-trace")]
            trace!("{:04X}: int ${:02X}", self.pc, 0x40 + index * 8);
            return &INTERRUPTS[index];
        }

        let opcode = mmu.read_byte(self.pc);
        let instr = if opcode == 0xCB {
            &EXTENDED[mmu.read_byte(self.pc.wrapping_add(1)) as usize]
        } else {
            &PRIMARY[opcode as usize]
        };
        #[cfg(feature = "cpu-trace")]
        trace!(
            "{:04X}: {:<24} {}",
            self.pc,
            instr.disasm(mmu, self.pc),
            self.debug_state()
        );
        instr
    }

    // ALU helpers shared by the register, (hl) and immediate forms.

    fn inc8(&mut self, v: u8) -> u8 {
        let res = v.wrapping_add(1);
        self.set_flag(FLAG_Z, res == 0);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, v & 0x0F == 0x0F);
        res
    }

    fn dec8(&mut self, v: u8) -> u8 {
        let res = v.wrapping_sub(1);
        self.set_flag(FLAG_Z, res == 0);
        self.set_flag(FLAG_N, true);
        self.set_flag(FLAG_H, v & 0x0F == 0);
        res
    }

    fn alu(&mut self, op: instr::AluOp, v: u8) {
        use instr::AluOp;

        let a = self.a;
        let carry = self.flag(FLAG_C) as u8;
        match op {
            AluOp::Add | AluOp::Adc => {
                let c = if op == AluOp::Adc { carry } else { 0 };
                let sum = a as u16 + v as u16 + c as u16;
                self.a = sum as u8;
                self.f = 0;
                self.set_flag(FLAG_Z, self.a == 0);
                self.set_flag(FLAG_H, (a & 0x0F) + (v & 0x0F) + c > 0x0F);
                self.set_flag(FLAG_C, sum > 0xFF);
            }
            AluOp::Sub | AluOp::Sbc | AluOp::Cp => {
                let c = if op == AluOp::Sbc { carry } else { 0 };
                let res = a.wrapping_sub(v).wrapping_sub(c);
                self.f = FLAG_N;
                self.set_flag(FLAG_Z, res == 0);
                self.set_flag(FLAG_H, (a & 0x0F) < (v & 0x0F) + c);
                self.set_flag(FLAG_C, (a as u16) < v as u16 + c as u16);
                if op != AluOp::Cp {
                    self.a = res;
                }
            }
            AluOp::And => {
                self.a &= v;
                self.f = FLAG_H | if self.a == 0 { FLAG_Z } else { 0 };
            }
            AluOp::Xor => {
                self.a ^= v;
                self.f = if self.a == 0 { FLAG_Z } else { 0 };
            }
            AluOp::Or => {
                self.a |= v;
                self.f = if self.a == 0 { FLAG_Z } else { 0 };
            }
        }
    }

    fn add_hl(&mut self, v: u16) {
        let hl = self.get_hl();
        let res = hl.wrapping_add(v);
        self.set_hl(res);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, (res & 0x0FFF) < (hl & 0x0FFF));
        self.set_flag(FLAG_C, res < hl);
    }

    /// SP plus a signed offset; flags come from the unsigned low-byte add.
    fn sp_offset(&mut self, offset: u8) -> u16 {
        let sp = self.sp;
        let res = sp.wrapping_add(offset as i8 as u16);
        self.f = 0;
        self.set_flag(FLAG_H, (res & 0x0F) < (sp & 0x0F));
        self.set_flag(FLAG_C, (res & 0xFF) < (sp & 0xFF));
        res
    }

    fn daa(&mut self) {
        if self.flag(FLAG_N) {
            if self.flag(FLAG_H) {
                self.a = self.a.wrapping_sub(0x06);
            }
            if self.flag(FLAG_C) {
                self.a = self.a.wrapping_sub(0x60);
            }
        } else {
            let mut v = self.a as u16;
            if self.flag(FLAG_H) || (v & 0x0F) > 0x09 {
                v += 0x06;
            }
            if self.flag(FLAG_C) || v > 0x9F {
                v += 0x60;
            }
            if v & 0x100 != 0 {
                self.set_flag(FLAG_C, true);
            }
            self.a = v as u8;
        }
        self.set_flag(FLAG_Z, self.a == 0);
        self.set_flag(FLAG_H, false);
    }

    /// CB-prefixed rotate/shift/swap. Sets Z from the result.
    fn rotate(&mut self, op: instr::RotOp, v: u8) -> u8 {
        use instr::RotOp;

        let carry_in = self.flag(FLAG_C) as u8;
        let (res, carry) = match op {
            RotOp::Rlc => (v.rotate_left(1), v & 0x80 != 0),
            RotOp::Rrc => (v.rotate_right(1), v & 0x01 != 0),
            RotOp::Rl => ((v << 1) | carry_in, v & 0x80 != 0),
            RotOp::Rr => ((v >> 1) | (carry_in << 7), v & 0x01 != 0),
            RotOp::Sla => (v << 1, v & 0x80 != 0),
            RotOp::Sra => ((v >> 1) | (v & 0x80), v & 0x01 != 0),
            RotOp::Swap => (v.rotate_left(4), false),
            RotOp::Srl => (v >> 1, v & 0x01 != 0),
        };
        self.f = if res == 0 { FLAG_Z } else { 0 } | if carry { FLAG_C } else { 0 };
        res
    }

    fn bit(&mut self, n: u8, v: u8) {
        self.set_flag(FLAG_Z, v & (1 << n) == 0);
        self.set_flag(FLAG_N, false);
        self.set_flag(FLAG_H, true);
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
