//! Tick-stepped Game Boy / Game Boy Color emulation core.
//!
//! A [`GameBoy`] session owns the CPU, bus, video and audio units and advances
//! them in lock-step, one master tick at a time. Front ends drive it one frame
//! at a time through [`GameBoy::run_frame`] and persist cartridge state through
//! the battery RAM and RTC accessors.

/// Audio Processing Unit (APU) emulation.
pub mod apu;

/// Cartridge header parsing and memory bank controllers.
pub mod cartridge;

/// LR35902 CPU core.
pub mod cpu;

/// Error type for session construction and state restore.
pub mod error;

/// High-level facade that wires every unit into a single machine.
pub mod gameboy;

/// Console models and frame geometry.
pub mod hardware;

/// Memory-mapped register addresses and interrupt bits.
pub mod io;

/// Joypad button bits and the JOYP select matrix.
pub mod joypad;

/// Memory map and hardware plumbing.
pub mod mmu;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// MBC3 real-time clock and the host time source behind it.
pub mod rtc;

/// Divider/timer unit.
pub mod timer;

pub use error::{Error, Result};
pub use gameboy::{BootRoms, GameBoy};
pub use hardware::{AudioFrame, Frame, Model};
pub use rtc::{Clock, ManualClock, SystemClock};
