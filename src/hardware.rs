/// Console generation being emulated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Model {
    #[default]
    Dmg,
    Cgb,
}

impl Model {
    #[inline]
    pub const fn is_cgb(self) -> bool {
        matches!(self, Model::Cgb)
    }

    /// Size in bytes of this model's boot ROM image.
    pub const fn boot_rom_len(self) -> usize {
        match self {
            Model::Dmg => DMG_BOOT_ROM_LEN,
            Model::Cgb => CGB_BOOT_ROM_LEN,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Model::Dmg => "DMG",
            Model::Cgb => "CGB",
        }
    }
}

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

/// RGBA bytes in one rendered frame.
pub const FRAME_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 4;

pub const DOTS_PER_LINE: u16 = 456;
pub const LINES_PER_FRAME: u8 = 154;

/// Master ticks (dots) in one video frame.
pub const TICKS_PER_FRAME: u32 = DOTS_PER_LINE as u32 * LINES_PER_FRAME as u32;

/// Stereo samples produced per video frame.
pub const FRAME_SAMPLES: usize = 800;

/// Interleaved left/right entries in one frame's audio buffer.
pub const AUDIO_FRAME_LEN: usize = FRAME_SAMPLES * 2;

pub const DMG_BOOT_ROM_LEN: usize = 0x100;
pub const CGB_BOOT_ROM_LEN: usize = 0x900;

pub type Frame = [u8; FRAME_BYTES];
pub type AudioFrame = [u16; AUDIO_FRAME_LEN];
