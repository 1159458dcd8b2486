use thiserror::Error;

/// Failures reported while building a session or restoring persisted state.
///
/// Nothing inside a running frame returns this type: per-tick work always
/// produces a value and degrades to sentinel bytes instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("cartridge image is too short: {len} bytes")]
    RomTooShort { len: usize },

    #[error("cartridge image has {len} bytes but the header declares {expected}")]
    RomSizeMismatch { len: usize, expected: usize },

    #[error("unknown ROM size code {0:#04x}")]
    UnknownRomSize(u8),

    #[error("unsupported RAM size code {0:#04x}")]
    UnsupportedRamSize(u8),

    #[error("unsupported cartridge type {0:#04x}")]
    UnsupportedCartridge(u8),

    #[error("{model} boot ROM must be {expected} bytes, got {len}")]
    BootRomSize {
        model: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("cartridge has no battery-backed RAM")]
    NoBattery,

    #[error("save data must be {expected} bytes, got {len}")]
    SaveSize { len: usize, expected: usize },

    #[error("cartridge has no real-time clock")]
    NoRtc,

    #[error("RTC state must be {expected} bytes, got {len}")]
    RtcStateSize { len: usize, expected: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
