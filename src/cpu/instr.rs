//! Instruction descriptors.
//!
//! Each opcode maps to one [`Instr`] value in a static table. A descriptor
//! knows how to run one micro-step of itself (`exec`) and how to print itself
//! (`disasm`). Operands are read relative to PC, and PC only moves when the
//! final step completes.

use std::fmt;

use super::{Cpu, CpuState, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};
use crate::mmu::Mmu;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R8 {
    B,
    C,
    D,
    E,
    H,
    L,
    A,
}

impl R8 {
    fn get(self, cpu: &Cpu) -> u8 {
        match self {
            R8::B => cpu.b,
            R8::C => cpu.c,
            R8::D => cpu.d,
            R8::E => cpu.e,
            R8::H => cpu.h,
            R8::L => cpu.l,
            R8::A => cpu.a,
        }
    }

    fn set(self, cpu: &mut Cpu, val: u8) {
        match self {
            R8::B => cpu.b = val,
            R8::C => cpu.c = val,
            R8::D => cpu.d = val,
            R8::E => cpu.e = val,
            R8::H => cpu.h = val,
            R8::L => cpu.l = val,
            R8::A => cpu.a = val,
        }
    }
}

/// Register pairs addressed by the 16-bit load and arithmetic forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R16 {
    Bc,
    De,
    Hl,
    Sp,
}

impl R16 {
    fn get(self, cpu: &Cpu) -> u16 {
        match self {
            R16::Bc => cpu.get_bc(),
            R16::De => cpu.get_de(),
            R16::Hl => cpu.get_hl(),
            R16::Sp => cpu.sp,
        }
    }

    fn set(self, cpu: &mut Cpu, val: u16) {
        match self {
            R16::Bc => cpu.set_bc(val),
            R16::De => cpu.set_de(val),
            R16::Hl => cpu.set_hl(val),
            R16::Sp => cpu.sp = val,
        }
    }
}

/// Register pairs addressed by PUSH/POP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stack16 {
    Bc,
    De,
    Hl,
    Af,
}

impl Stack16 {
    fn get(self, cpu: &Cpu) -> u16 {
        match self {
            Stack16::Bc => cpu.get_bc(),
            Stack16::De => cpu.get_de(),
            Stack16::Hl => cpu.get_hl(),
            Stack16::Af => cpu.get_af(),
        }
    }

    fn set(self, cpu: &mut Cpu, val: u16) {
        match self {
            Stack16::Bc => cpu.set_bc(val),
            Stack16::De => cpu.set_de(val),
            Stack16::Hl => cpu.set_hl(val),
            Stack16::Af => cpu.set_af(val),
        }
    }
}

/// Pointer operands of `ld (rr), a` and `ld a, (rr)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indirect {
    Bc,
    De,
    HlInc,
    HlDec,
}

impl Indirect {
    /// Resolve the address, applying the HL post-increment/decrement.
    fn addr(self, cpu: &mut Cpu) -> u16 {
        match self {
            Indirect::Bc => cpu.get_bc(),
            Indirect::De => cpu.get_de(),
            Indirect::HlInc => {
                let hl = cpu.get_hl();
                cpu.set_hl(hl.wrapping_add(1));
                hl
            }
            Indirect::HlDec => {
                let hl = cpu.get_hl();
                cpu.set_hl(hl.wrapping_sub(1));
                hl
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Always,
    Nz,
    Z,
    Nc,
    C,
}

impl Cond {
    fn check(self, cpu: &Cpu) -> bool {
        match self {
            Cond::Always => true,
            Cond::Nz => !cpu.flag(FLAG_Z),
            Cond::Z => cpu.flag(FLAG_Z),
            Cond::Nc => !cpu.flag(FLAG_C),
            Cond::C => cpu.flag(FLAG_C),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

/// One instruction form. `(hl)` operands get their own variants because
/// they take extra memory steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    Nop,
    Stop,
    Halt,
    Ei,
    Di,
    Daa,
    Cpl,
    Scf,
    Ccf,
    /// Accumulator rotates (`rlca`, `rrca`, `rla`, `rra`); Z is always cleared.
    RotA(RotOp),
    IncR(R8),
    DecR(R8),
    IncHl,
    DecHl,
    IncRr(R16),
    DecRr(R16),
    AddHl(R16),
    AddSpN,
    LdHlSpN,
    AluR(AluOp, R8),
    AluHl(AluOp),
    AluN(AluOp),
    Jr(Cond),
    Jp(Cond),
    JpHl,
    Call(Cond),
    RetCc(Cond),
    Ret,
    Reti,
    Rst(u8),
    /// Hardware interrupt dispatch to the given vector.
    Int(u8),
    LdRrNn(R16),
    LdNnSp,
    Push(Stack16),
    Pop(Stack16),
    LdSpHl,
    LdIndA(Indirect),
    LdAInd(Indirect),
    LdRN(R8),
    LdRR(R8, R8),
    LdRHl(R8),
    LdHlR(R8),
    LdHlN,
    LdhNA,
    LdhCA,
    LdhAN,
    LdhAC,
    LdANn,
    LdNnA,
    Rot(RotOp, R8),
    RotHl(RotOp),
    Bit(u8, R8),
    BitHl(u8),
    Res(u8, R8),
    ResHl(u8),
    Set(u8, R8),
    SetHl(u8),
    /// Opcodes with no defined behaviour; skipped as one-byte no-ops.
    Unset,
}

pub static PRIMARY: [Instr; 256] = build(false);
pub static EXTENDED: [Instr; 256] = build(true);
pub static INTERRUPTS: [Instr; 5] = [
    Instr::Int(0x40),
    Instr::Int(0x48),
    Instr::Int(0x50),
    Instr::Int(0x58),
    Instr::Int(0x60),
];

/// Decode every opcode of the primary table, or of the 0xCB-prefixed one.
const fn build(prefixed: bool) -> [Instr; 256] {
    let mut table = [Instr::Unset; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = if prefixed {
            extended(i as u8)
        } else {
            primary(i as u8)
        };
        i += 1;
    }
    table
}

const fn reg(bits: u8) -> R8 {
    match bits & 0x07 {
        0 => R8::B,
        1 => R8::C,
        2 => R8::D,
        3 => R8::E,
        4 => R8::H,
        5 => R8::L,
        _ => R8::A,
    }
}

const fn pair(bits: u8) -> R16 {
    match bits & 0x03 {
        0 => R16::Bc,
        1 => R16::De,
        2 => R16::Hl,
        _ => R16::Sp,
    }
}

const fn stack_pair(bits: u8) -> Stack16 {
    match bits & 0x03 {
        0 => Stack16::Bc,
        1 => Stack16::De,
        2 => Stack16::Hl,
        _ => Stack16::Af,
    }
}

const fn cond(bits: u8) -> Cond {
    match bits & 0x03 {
        0 => Cond::Nz,
        1 => Cond::Z,
        2 => Cond::Nc,
        _ => Cond::C,
    }
}

const fn alu_op(bits: u8) -> AluOp {
    match bits & 0x07 {
        0 => AluOp::Add,
        1 => AluOp::Adc,
        2 => AluOp::Sub,
        3 => AluOp::Sbc,
        4 => AluOp::And,
        5 => AluOp::Xor,
        6 => AluOp::Or,
        _ => AluOp::Cp,
    }
}

const fn rot_op(bits: u8) -> RotOp {
    match bits & 0x07 {
        0 => RotOp::Rlc,
        1 => RotOp::Rrc,
        2 => RotOp::Rl,
        3 => RotOp::Rr,
        4 => RotOp::Sla,
        5 => RotOp::Sra,
        6 => RotOp::Swap,
        _ => RotOp::Srl,
    }
}

const fn primary(op: u8) -> Instr {
    let y = (op >> 3) & 0x07;
    let z = op & 0x07;
    match op {
        0x00 => Instr::Nop,
        0x08 => Instr::LdNnSp,
        0x10 => Instr::Stop,
        0x18 => Instr::Jr(Cond::Always),
        0x20 | 0x28 | 0x30 | 0x38 => Instr::Jr(cond(y)),
        0x01 | 0x11 | 0x21 | 0x31 => Instr::LdRrNn(pair(op >> 4)),
        0x09 | 0x19 | 0x29 | 0x39 => Instr::AddHl(pair(op >> 4)),
        0x03 | 0x13 | 0x23 | 0x33 => Instr::IncRr(pair(op >> 4)),
        0x0B | 0x1B | 0x2B | 0x3B => Instr::DecRr(pair(op >> 4)),
        0x02 => Instr::LdIndA(Indirect::Bc),
        0x12 => Instr::LdIndA(Indirect::De),
        0x22 => Instr::LdIndA(Indirect::HlInc),
        0x32 => Instr::LdIndA(Indirect::HlDec),
        0x0A => Instr::LdAInd(Indirect::Bc),
        0x1A => Instr::LdAInd(Indirect::De),
        0x2A => Instr::LdAInd(Indirect::HlInc),
        0x3A => Instr::LdAInd(Indirect::HlDec),
        0x34 => Instr::IncHl,
        0x35 => Instr::DecHl,
        0x36 => Instr::LdHlN,
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => Instr::IncR(reg(y)),
        0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => Instr::DecR(reg(y)),
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => Instr::LdRN(reg(y)),
        0x07 => Instr::RotA(RotOp::Rlc),
        0x0F => Instr::RotA(RotOp::Rrc),
        0x17 => Instr::RotA(RotOp::Rl),
        0x1F => Instr::RotA(RotOp::Rr),
        0x27 => Instr::Daa,
        0x2F => Instr::Cpl,
        0x37 => Instr::Scf,
        0x3F => Instr::Ccf,
        0x76 => Instr::Halt,
        0x70..=0x77 => Instr::LdHlR(reg(z)),
        0x46 | 0x4E | 0x56 | 0x5E | 0x66 | 0x6E | 0x7E => Instr::LdRHl(reg(y)),
        0x40..=0x7F => Instr::LdRR(reg(y), reg(z)),
        0x86 | 0x8E | 0x96 | 0x9E | 0xA6 | 0xAE | 0xB6 | 0xBE => Instr::AluHl(alu_op(y)),
        0x80..=0xBF => Instr::AluR(alu_op(y), reg(z)),
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => Instr::AluN(alu_op(y)),
        0xC0 | 0xC8 | 0xD0 | 0xD8 => Instr::RetCc(cond(y)),
        0xC2 | 0xCA | 0xD2 | 0xDA => Instr::Jp(cond(y)),
        0xC4 | 0xCC | 0xD4 | 0xDC => Instr::Call(cond(y)),
        0xC1 | 0xD1 | 0xE1 | 0xF1 => Instr::Pop(stack_pair(op >> 4)),
        0xC5 | 0xD5 | 0xE5 | 0xF5 => Instr::Push(stack_pair(op >> 4)),
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => Instr::Rst(op & 0x38),
        0xC3 => Instr::Jp(Cond::Always),
        0xC9 => Instr::Ret,
        0xCD => Instr::Call(Cond::Always),
        0xD9 => Instr::Reti,
        0xE0 => Instr::LdhNA,
        0xE2 => Instr::LdhCA,
        0xE8 => Instr::AddSpN,
        0xE9 => Instr::JpHl,
        0xEA => Instr::LdNnA,
        0xF0 => Instr::LdhAN,
        0xF2 => Instr::LdhAC,
        0xF3 => Instr::Di,
        0xF8 => Instr::LdHlSpN,
        0xF9 => Instr::LdSpHl,
        0xFA => Instr::LdANn,
        0xFB => Instr::Ei,
        // 0xCB is resolved through EXTENDED before this table is consulted.
        _ => Instr::Unset,
    }
}

const fn extended(op: u8) -> Instr {
    let y = (op >> 3) & 0x07;
    let z = op & 0x07;
    match (op >> 6, z) {
        (0, 6) => Instr::RotHl(rot_op(y)),
        (0, _) => Instr::Rot(rot_op(y), reg(z)),
        (1, 6) => Instr::BitHl(y),
        (1, _) => Instr::Bit(y, reg(z)),
        (2, 6) => Instr::ResHl(y),
        (2, _) => Instr::Res(y, reg(z)),
        (_, 6) => Instr::SetHl(y),
        (_, _) => Instr::Set(y, reg(z)),
    }
}

fn done(cpu: &mut Cpu, len: u16) -> bool {
    cpu.pc = cpu.pc.wrapping_add(len);
    true
}

fn operand(cpu: &Cpu, mmu: &Mmu, offset: u16) -> u8 {
    mmu.read_byte(cpu.pc.wrapping_add(offset))
}

fn push(cpu: &mut Cpu, mmu: &mut Mmu, val: u8) {
    cpu.sp = cpu.sp.wrapping_sub(1);
    mmu.write_byte(cpu.sp, val);
}

fn pop(cpu: &mut Cpu, mmu: &Mmu) -> u8 {
    let val = mmu.read_byte(cpu.sp);
    cpu.sp = cpu.sp.wrapping_add(1);
    val
}

impl Instr {
    /// Run micro-step `cpu.step` of this instruction. Returns true when the
    /// instruction has completed.
    pub fn exec(&self, cpu: &mut Cpu, mmu: &mut Mmu) -> bool {
        let step = cpu.step;
        match *self {
            Instr::Nop | Instr::Unset => done(cpu, 1),
            Instr::Stop => {
                mmu.reset_div();
                if !mmu.switch_speed() {
                    cpu.state = CpuState::Stop;
                }
                done(cpu, 2)
            }
            Instr::Halt => {
                cpu.state = CpuState::Halt;
                done(cpu, 1)
            }
            Instr::Ei => {
                cpu.ei_delay = 2;
                done(cpu, 1)
            }
            Instr::Di => {
                cpu.ime = false;
                cpu.ei_delay = 0;
                done(cpu, 1)
            }
            Instr::Daa => {
                cpu.daa();
                done(cpu, 1)
            }
            Instr::Cpl => {
                cpu.a ^= 0xFF;
                cpu.f |= FLAG_N | FLAG_H;
                done(cpu, 1)
            }
            Instr::Scf => {
                cpu.f = (cpu.f & FLAG_Z) | FLAG_C;
                done(cpu, 1)
            }
            Instr::Ccf => {
                cpu.f = (cpu.f & (FLAG_Z | FLAG_C)) ^ FLAG_C;
                done(cpu, 1)
            }
            Instr::RotA(op) => {
                cpu.a = cpu.rotate(op, cpu.a);
                cpu.f &= !FLAG_Z;
                done(cpu, 1)
            }
            Instr::IncR(r) => {
                let v = cpu.inc8(r.get(cpu));
                r.set(cpu, v);
                done(cpu, 1)
            }
            Instr::DecR(r) => {
                let v = cpu.dec8(r.get(cpu));
                r.set(cpu, v);
                done(cpu, 1)
            }
            Instr::IncHl | Instr::DecHl => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = mmu.read_byte(cpu.get_hl()) as u16;
                    false
                }
                _ => {
                    let v = cpu.tmp[0] as u8;
                    let v = if *self == Instr::IncHl {
                        cpu.inc8(v)
                    } else {
                        cpu.dec8(v)
                    };
                    mmu.write_byte(cpu.get_hl(), v);
                    done(cpu, 1)
                }
            },
            Instr::IncRr(rr) => match step {
                0 => false,
                _ => {
                    rr.set(cpu, rr.get(cpu).wrapping_add(1));
                    done(cpu, 1)
                }
            },
            Instr::DecRr(rr) => match step {
                0 => false,
                _ => {
                    rr.set(cpu, rr.get(cpu).wrapping_sub(1));
                    done(cpu, 1)
                }
            },
            Instr::AddHl(rr) => match step {
                0 => false,
                _ => {
                    cpu.add_hl(rr.get(cpu));
                    done(cpu, 1)
                }
            },
            Instr::AddSpN => match step {
                0 | 2 => false,
                1 => {
                    cpu.tmp[0] = operand(cpu, mmu, 1) as u16;
                    false
                }
                _ => {
                    cpu.sp = cpu.sp_offset(cpu.tmp[0] as u8);
                    done(cpu, 2)
                }
            },
            Instr::LdHlSpN => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = operand(cpu, mmu, 1) as u16;
                    false
                }
                _ => {
                    let v = cpu.sp_offset(cpu.tmp[0] as u8);
                    cpu.set_hl(v);
                    done(cpu, 2)
                }
            },
            Instr::AluR(op, r) => {
                cpu.alu(op, r.get(cpu));
                done(cpu, 1)
            }
            Instr::AluHl(op) => match step {
                0 => false,
                _ => {
                    cpu.alu(op, mmu.read_byte(cpu.get_hl()));
                    done(cpu, 1)
                }
            },
            Instr::AluN(op) => match step {
                0 => false,
                _ => {
                    cpu.alu(op, operand(cpu, mmu, 1));
                    done(cpu, 2)
                }
            },
            Instr::Jr(cc) => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = operand(cpu, mmu, 1) as u16;
                    if cc.check(cpu) { false } else { done(cpu, 2) }
                }
                _ => {
                    let offset = cpu.tmp[0] as u8 as i8 as u16;
                    cpu.pc = cpu.pc.wrapping_add(2).wrapping_add(offset);
                    true
                }
            },
            Instr::Jp(cc) => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = operand(cpu, mmu, 1) as u16;
                    false
                }
                2 => {
                    cpu.tmp[0] |= (operand(cpu, mmu, 2) as u16) << 8;
                    if cc.check(cpu) { false } else { done(cpu, 3) }
                }
                _ => {
                    cpu.pc = cpu.tmp[0];
                    true
                }
            },
            Instr::JpHl => {
                cpu.pc = cpu.get_hl();
                true
            }
            Instr::Call(cc) => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = operand(cpu, mmu, 1) as u16;
                    false
                }
                2 => {
                    cpu.tmp[0] |= (operand(cpu, mmu, 2) as u16) << 8;
                    if cc.check(cpu) { false } else { done(cpu, 3) }
                }
                3 => {
                    cpu.tmp[1] = cpu.pc.wrapping_add(3);
                    false
                }
                4 => {
                    push(cpu, mmu, (cpu.tmp[1] >> 8) as u8);
                    false
                }
                _ => {
                    push(cpu, mmu, cpu.tmp[1] as u8);
                    cpu.pc = cpu.tmp[0];
                    true
                }
            },
            Instr::RetCc(cc) => match step {
                0 => false,
                1 => {
                    if cc.check(cpu) { false } else { done(cpu, 1) }
                }
                2 => {
                    cpu.tmp[0] = pop(cpu, mmu) as u16;
                    false
                }
                3 => {
                    cpu.tmp[0] |= (pop(cpu, mmu) as u16) << 8;
                    false
                }
                _ => {
                    cpu.pc = cpu.tmp[0];
                    true
                }
            },
            Instr::Ret | Instr::Reti => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = pop(cpu, mmu) as u16;
                    false
                }
                2 => {
                    cpu.tmp[0] |= (pop(cpu, mmu) as u16) << 8;
                    false
                }
                _ => {
                    if *self == Instr::Reti {
                        cpu.ime = true;
                    }
                    cpu.pc = cpu.tmp[0];
                    true
                }
            },
            Instr::Rst(vector) => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = cpu.pc.wrapping_add(1);
                    false
                }
                2 => {
                    push(cpu, mmu, (cpu.tmp[0] >> 8) as u8);
                    false
                }
                _ => {
                    push(cpu, mmu, cpu.tmp[0] as u8);
                    cpu.pc = vector as u16;
                    true
                }
            },
            Instr::Int(vector) => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = cpu.pc;
                    false
                }
                2 => {
                    push(cpu, mmu, (cpu.tmp[0] >> 8) as u8);
                    false
                }
                3 => {
                    push(cpu, mmu, cpu.tmp[0] as u8);
                    false
                }
                _ => {
                    cpu.pc = vector as u16;
                    cpu.ime = false;
                    true
                }
            },
            Instr::LdRrNn(rr) => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = operand(cpu, mmu, 1) as u16;
                    false
                }
                _ => {
                    let v = cpu.tmp[0] | (operand(cpu, mmu, 2) as u16) << 8;
                    rr.set(cpu, v);
                    done(cpu, 3)
                }
            },
            Instr::LdNnSp => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = operand(cpu, mmu, 1) as u16;
                    false
                }
                2 => {
                    cpu.tmp[0] |= (operand(cpu, mmu, 2) as u16) << 8;
                    false
                }
                3 => {
                    mmu.write_byte(cpu.tmp[0], cpu.sp as u8);
                    false
                }
                _ => {
                    mmu.write_byte(cpu.tmp[0].wrapping_add(1), (cpu.sp >> 8) as u8);
                    done(cpu, 3)
                }
            },
            Instr::Push(rr) => match step {
                0 | 1 => false,
                2 => {
                    push(cpu, mmu, (rr.get(cpu) >> 8) as u8);
                    false
                }
                _ => {
                    push(cpu, mmu, rr.get(cpu) as u8);
                    done(cpu, 1)
                }
            },
            Instr::Pop(rr) => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = pop(cpu, mmu) as u16;
                    false
                }
                _ => {
                    let v = cpu.tmp[0] | (pop(cpu, mmu) as u16) << 8;
                    rr.set(cpu, v);
                    done(cpu, 1)
                }
            },
            Instr::LdSpHl => match step {
                0 => false,
                _ => {
                    cpu.sp = cpu.get_hl();
                    done(cpu, 1)
                }
            },
            Instr::LdIndA(ind) => match step {
                0 => false,
                _ => {
                    let addr = ind.addr(cpu);
                    mmu.write_byte(addr, cpu.a);
                    done(cpu, 1)
                }
            },
            Instr::LdAInd(ind) => match step {
                0 => false,
                _ => {
                    let addr = ind.addr(cpu);
                    cpu.a = mmu.read_byte(addr);
                    done(cpu, 1)
                }
            },
            Instr::LdRN(r) => match step {
                0 => false,
                _ => {
                    r.set(cpu, operand(cpu, mmu, 1));
                    done(cpu, 2)
                }
            },
            Instr::LdRR(dst, src) => {
                dst.set(cpu, src.get(cpu));
                done(cpu, 1)
            }
            Instr::LdRHl(r) => match step {
                0 => false,
                _ => {
                    r.set(cpu, mmu.read_byte(cpu.get_hl()));
                    done(cpu, 1)
                }
            },
            Instr::LdHlR(r) => match step {
                0 => false,
                _ => {
                    mmu.write_byte(cpu.get_hl(), r.get(cpu));
                    done(cpu, 1)
                }
            },
            Instr::LdHlN => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = operand(cpu, mmu, 1) as u16;
                    false
                }
                _ => {
                    mmu.write_byte(cpu.get_hl(), cpu.tmp[0] as u8);
                    done(cpu, 2)
                }
            },
            Instr::LdhNA | Instr::LdhAN => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = operand(cpu, mmu, 1) as u16;
                    false
                }
                _ => {
                    let addr = 0xFF00 | cpu.tmp[0];
                    if *self == Instr::LdhNA {
                        mmu.write_byte(addr, cpu.a);
                    } else {
                        cpu.a = mmu.read_byte(addr);
                    }
                    done(cpu, 2)
                }
            },
            Instr::LdhCA => match step {
                0 => false,
                _ => {
                    mmu.write_byte(0xFF00 | cpu.c as u16, cpu.a);
                    done(cpu, 1)
                }
            },
            Instr::LdhAC => match step {
                0 => false,
                _ => {
                    cpu.a = mmu.read_byte(0xFF00 | cpu.c as u16);
                    done(cpu, 1)
                }
            },
            Instr::LdANn | Instr::LdNnA => match step {
                0 => false,
                1 => {
                    cpu.tmp[0] = operand(cpu, mmu, 1) as u16;
                    false
                }
                2 => {
                    cpu.tmp[0] |= (operand(cpu, mmu, 2) as u16) << 8;
                    false
                }
                _ => {
                    if *self == Instr::LdNnA {
                        mmu.write_byte(cpu.tmp[0], cpu.a);
                    } else {
                        cpu.a = mmu.read_byte(cpu.tmp[0]);
                    }
                    done(cpu, 3)
                }
            },
            Instr::Rot(op, r) => match step {
                0 => false,
                _ => {
                    let v = cpu.rotate(op, r.get(cpu));
                    r.set(cpu, v);
                    done(cpu, 2)
                }
            },
            Instr::Bit(n, r) => match step {
                0 => false,
                _ => {
                    cpu.bit(n, r.get(cpu));
                    done(cpu, 2)
                }
            },
            Instr::BitHl(n) => match step {
                0 | 1 => false,
                _ => {
                    cpu.bit(n, mmu.read_byte(cpu.get_hl()));
                    done(cpu, 2)
                }
            },
            Instr::Res(n, r) => match step {
                0 => false,
                _ => {
                    r.set(cpu, r.get(cpu) & !(1 << n));
                    done(cpu, 2)
                }
            },
            Instr::Set(n, r) => match step {
                0 => false,
                _ => {
                    r.set(cpu, r.get(cpu) | (1 << n));
                    done(cpu, 2)
                }
            },
            Instr::RotHl(_) | Instr::ResHl(_) | Instr::SetHl(_) => match step {
                0 | 1 => false,
                2 => {
                    cpu.tmp[0] = mmu.read_byte(cpu.get_hl()) as u16;
                    false
                }
                _ => {
                    let v = cpu.tmp[0] as u8;
                    let v = match *self {
                        Instr::RotHl(op) => cpu.rotate(op, v),
                        Instr::ResHl(n) => v & !(1 << n),
                        Instr::SetHl(n) => v | (1 << n),
                        _ => v,
                    };
                    mmu.write_byte(cpu.get_hl(), v);
                    done(cpu, 2)
                }
            },
        }
    }

    /// Format the instruction located at `pc`. Operand bytes are read
    /// without side effects.
    pub fn disasm(&self, mmu: &Mmu, pc: u16) -> String {
        let n = mmu.peek(pc.wrapping_add(1));
        let nn = || format!("${:02X}{:02X}", mmu.peek(pc.wrapping_add(2)), n);
        match *self {
            Instr::Nop => "nop".into(),
            Instr::Stop => "stop".into(),
            Instr::Halt => "halt".into(),
            Instr::Ei => "ei".into(),
            Instr::Di => "di".into(),
            Instr::Daa => "daa".into(),
            Instr::Cpl => "cpl".into(),
            Instr::Scf => "scf".into(),
            Instr::Ccf => "ccf".into(),
            Instr::RotA(op) => format!("{op}a"),
            Instr::IncR(r) => format!("inc {r}"),
            Instr::DecR(r) => format!("dec {r}"),
            Instr::IncHl => "inc (hl)".into(),
            Instr::DecHl => "dec (hl)".into(),
            Instr::IncRr(rr) => format!("inc {rr}"),
            Instr::DecRr(rr) => format!("dec {rr}"),
            Instr::AddHl(rr) => format!("add hl, {rr}"),
            Instr::AddSpN => format!("add sp, ${n:02X}"),
            Instr::LdHlSpN => format!("ld hl, sp + ${n:02X}"),
            Instr::AluR(op, r) => format!("{op} a, {r}"),
            Instr::AluHl(op) => format!("{op} a, (hl)"),
            Instr::AluN(op) => format!("{op} a, ${n:02X}"),
            Instr::Jr(Cond::Always) => format!("jr {}", n as i8),
            Instr::Jr(cc) => format!("jr {cc}, {}", n as i8),
            Instr::Jp(Cond::Always) => format!("jp {}", nn()),
            Instr::Jp(cc) => format!("jp {cc}, {}", nn()),
            Instr::JpHl => "jp hl".into(),
            Instr::Call(Cond::Always) => format!("call {}", nn()),
            Instr::Call(cc) => format!("call {cc}, {}", nn()),
            Instr::RetCc(cc) => format!("ret {cc}"),
            Instr::Ret => "ret".into(),
            Instr::Reti => "reti".into(),
            Instr::Rst(v) => format!("rst ${v:02X}"),
            Instr::Int(v) => format!("int ${v:02X}"),
            Instr::LdRrNn(rr) => format!("ld {rr}, {}", nn()),
            Instr::LdNnSp => format!("ld ({}), sp", nn()),
            Instr::Push(rr) => format!("push {rr}"),
            Instr::Pop(rr) => format!("pop {rr}"),
            Instr::LdSpHl => "ld sp, hl".into(),
            Instr::LdIndA(ind) => match ind {
                Indirect::HlInc => "ldi (hl), a".into(),
                Indirect::HlDec => "ldd (hl), a".into(),
                _ => format!("ld ({ind}), a"),
            },
            Instr::LdAInd(ind) => match ind {
                Indirect::HlInc => "ldi a, (hl)".into(),
                Indirect::HlDec => "ldd a, (hl)".into(),
                _ => format!("ld a, ({ind})"),
            },
            Instr::LdRN(r) => format!("ld {r}, ${n:02X}"),
            Instr::LdRR(dst, src) => format!("ld {dst}, {src}"),
            Instr::LdRHl(r) => format!("ld {r}, (hl)"),
            Instr::LdHlR(r) => format!("ld (hl), {r}"),
            Instr::LdHlN => format!("ld (hl), ${n:02X}"),
            Instr::LdhNA => format!("ld ($FF00 + ${n:02X}), a"),
            Instr::LdhCA => "ld ($FF00 + c), a".into(),
            Instr::LdhAN => format!("ld a, ($FF00 + ${n:02X})"),
            Instr::LdhAC => "ld a, ($FF00 + c)".into(),
            Instr::LdANn => format!("ld a, ({})", nn()),
            Instr::LdNnA => format!("ld ({}), a", nn()),
            Instr::Rot(op, r) => format!("{op} {r}"),
            Instr::RotHl(op) => format!("{op} (hl)"),
            Instr::Bit(b, r) => format!("bit {b}, {r}"),
            Instr::BitHl(b) => format!("bit {b}, (hl)"),
            Instr::Res(b, r) => format!("res {b}, {r}"),
            Instr::ResHl(b) => format!("res {b}, (hl)"),
            Instr::Set(b, r) => format!("set {b}, {r}"),
            Instr::SetHl(b) => format!("set {b}, (hl)"),
            Instr::Unset => "UNSET".into(),
        }
    }
}

impl fmt::Display for R8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            R8::B => "b",
            R8::C => "c",
            R8::D => "d",
            R8::E => "e",
            R8::H => "h",
            R8::L => "l",
            R8::A => "a",
        };
        f.write_str(name)
    }
}

impl fmt::Display for R16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            R16::Bc => "bc",
            R16::De => "de",
            R16::Hl => "hl",
            R16::Sp => "sp",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Stack16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stack16::Bc => "bc",
            Stack16::De => "de",
            Stack16::Hl => "hl",
            Stack16::Af => "af",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Indirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Indirect::Bc => "bc",
            Indirect::De => "de",
            Indirect::HlInc => "hl+",
            Indirect::HlDec => "hl-",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cond::Always => "",
            Cond::Nz => "nz",
            Cond::Z => "z",
            Cond::Nc => "nc",
            Cond::C => "c",
        };
        f.write_str(name)
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AluOp::Add => "add",
            AluOp::Adc => "adc",
            AluOp::Sub => "sub",
            AluOp::Sbc => "sbc",
            AluOp::And => "and",
            AluOp::Xor => "xor",
            AluOp::Or => "or",
            AluOp::Cp => "cp",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RotOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotOp::Rlc => "rlc",
            RotOp::Rrc => "rrc",
            RotOp::Rl => "rl",
            RotOp::Rr => "rr",
            RotOp::Sla => "sla",
            RotOp::Sra => "sra",
            RotOp::Swap => "swap",
            RotOp::Srl => "srl",
        };
        f.write_str(name)
    }
}
