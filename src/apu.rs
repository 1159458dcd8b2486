#[cfg(feature = "apu-trace")]
use log::trace;

use crate::{
    hardware::{AUDIO_FRAME_LEN, AudioFrame, FRAME_SAMPLES, TICKS_PER_FRAME},
    io,
    mmu::Mmu,
};

// Square wave duty patterns. Each entry represents the 8 step
// waveform. Index (0..3) corresponds to duty selector in NRx1:
// 0 -> 00000001 (12.5%)
// 1 -> 10000001 (25%)
// 2 -> 10000111 (50%)
// 3 -> 01111110 (75%)
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1], // 12.5% -> 00000001
    [1, 0, 0, 0, 0, 0, 0, 1], // 25%   -> 10000001
    [1, 0, 0, 0, 0, 1, 1, 1], // 50%   -> 10000111
    [0, 1, 1, 1, 1, 1, 1, 0], // 75%   -> 01111110
];

// Divider bit whose falling edge advances the frame sequencer (512 Hz)
const SEQUENCER_DIV_BIT: u16 = 12;

const MAX_FREQUENCY: u16 = 2047;

/// Register addresses and NR52 status bit of one channel.
struct ChannelRegs {
    nrx1: u16,
    nrx2: u16,
    nrx3: u16,
    nrx4: u16,
    bit: u8,
}

const CH1: ChannelRegs = ChannelRegs {
    nrx1: io::NR11,
    nrx2: io::NR12,
    nrx3: io::NR13,
    nrx4: io::NR14,
    bit: 0x01,
};
const CH2: ChannelRegs = ChannelRegs {
    nrx1: io::NR21,
    nrx2: io::NR22,
    nrx3: io::NR23,
    nrx4: io::NR24,
    bit: 0x02,
};
const CH3: ChannelRegs = ChannelRegs {
    nrx1: io::NR31,
    nrx2: io::NR32,
    nrx3: io::NR33,
    nrx4: io::NR34,
    bit: 0x04,
};
const CH4: ChannelRegs = ChannelRegs {
    nrx1: io::NR41,
    nrx2: io::NR42,
    nrx3: io::NR43,
    nrx4: io::NR44,
    bit: 0x08,
};

fn frequency(mmu: &Mmu, regs: &ChannelRegs) -> u16 {
    mmu.reg(regs.nrx3) as u16 | ((mmu.reg(regs.nrx4) & 0x07) as u16) << 8
}

fn channel_on(mmu: &Mmu, regs: &ChannelRegs) -> bool {
    mmu.reg(io::NR52) & regs.bit != 0
}

fn disable(mmu: &mut Mmu, regs: &ChannelRegs) {
    let nr52 = mmu.reg(io::NR52) & !regs.bit;
    mmu.set_reg(io::NR52, nr52);
}

#[derive(Default, Clone, Copy)]
struct Envelope {
    period: u8,
    add: bool,
    volume: u8,
    timer: u8,
}

impl Envelope {
    fn reset(&mut self, val: u8) {
        self.volume = val >> 4;
        self.period = val & 0x07;
        self.add = val & 0x08 != 0;
        self.timer = 0;
    }

    /// Returns true when a decreasing envelope has just reached zero.
    fn clock(&mut self) -> bool {
        if self.period == 0 {
            return false;
        }
        self.timer += 1;
        if self.timer < self.period {
            return false;
        }
        self.timer = 0;
        if self.add {
            if self.volume < 15 {
                self.volume += 1;
            }
            false
        } else if self.volume > 0 {
            self.volume -= 1;
            self.volume == 0
        } else {
            false
        }
    }
}

#[derive(Default)]
// Channel 1 frequency sweep
struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    shadow: u16,
    enabled: bool,
}

impl Sweep {
    fn calculate(&self) -> u16 {
        let delta = self.shadow >> self.shift;
        if self.negate {
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow.wrapping_add(delta)
        }
    }

    fn reload(&mut self, nr10: u8, freq: u16) {
        self.period = (nr10 >> 4) & 0x07;
        self.negate = nr10 & 0x08 != 0;
        self.shift = nr10 & 0x07;
        self.shadow = freq;
        self.timer = self.reload_timer();
        self.enabled = self.period != 0 || self.shift != 0;
    }

    fn reload_timer(&self) -> u8 {
        if self.period == 0 { 8 } else { self.period }
    }
}

#[derive(Default)]
struct SquareChannel {
    envelope: Envelope,
    length: u16,
    counter: u32,
    duty_pos: u8,
}

impl SquareChannel {
    fn trigger(&mut self, mmu: &Mmu, regs: &ChannelRegs) {
        self.envelope.reset(mmu.reg(regs.nrx2));
        self.length = 64 - (mmu.reg(regs.nrx1) & 0x3F) as u16;
        self.counter = 0;
    }

    fn step(&mut self, freq: u16) {
        self.counter += 1;
        if self.counter >= 4 * (2048 - freq as u32) {
            self.counter = 0;
            self.duty_pos = (self.duty_pos + 1) & 0x07;
        }
    }

    fn output(&self, nrx1: u8) -> u8 {
        DUTY_TABLE[(nrx1 >> 6) as usize][self.duty_pos as usize] * self.envelope.volume
    }
}

#[derive(Default)]
struct WaveChannel {
    length: u16,
    counter: u32,
    position: u8,
    last_sample: u8,
}

impl WaveChannel {
    fn step(&mut self, mmu: &Mmu, freq: u16) {
        self.counter += 1;
        if self.counter >= 2 * (2048 - freq as u32) {
            self.counter = 0;
            self.position = (self.position + 1) & 0x1F;
            let byte = mmu.reg(io::WAVE_RAM + (self.position / 2) as u16);
            self.last_sample = if self.position & 1 == 0 {
                byte >> 4
            } else {
                byte & 0x0F
            };
        }
    }

    fn output(&self, nr32: u8) -> u8 {
        match (nr32 >> 5) & 0x03 {
            0 => 0,
            1 => self.last_sample,
            2 => self.last_sample >> 1,
            _ => self.last_sample >> 2,
        }
    }
}

#[derive(Default)]
struct NoiseChannel {
    envelope: Envelope,
    length: u16,
    counter: u32,
    lfsr: u16,
}

impl NoiseChannel {
    fn period(nr43: u8) -> u32 {
        let divisor = match nr43 & 0x07 {
            0 => 8,
            r => r as u32 * 16,
        };
        divisor << (nr43 >> 4)
    }

    fn step(&mut self, nr43: u8) {
        self.counter += 1;
        if self.counter < Self::period(nr43) {
            return;
        }
        self.counter = 0;
        let bit0 = self.lfsr & 1;
        let bit1 = (self.lfsr >> 1) & 1;
        // feedback is the XNOR of the two low bits
        let bit = !(bit0 ^ bit1) & 1;
        self.lfsr >>= 1;
        self.lfsr |= bit << 14;
        if nr43 & 0x08 != 0 {
            self.lfsr = (self.lfsr & !0x40) | (bit << 6);
        }
    }

    fn output(&self) -> u8 {
        if self.lfsr & 1 == 0 {
            self.envelope.volume
        } else {
            0
        }
    }
}

struct FrameSequencer {
    step: u8,
}

impl FrameSequencer {
    fn new() -> Self {
        Self { step: 0 }
    }

    fn advance(&mut self) -> u8 {
        let s = self.step;
        self.step = (self.step + 1) & 7;
        s
    }
}

/// Four-channel sound unit. Channel registers and the NR52 status bits live
/// in the [`Mmu`]; this keeps the oscillator and modulation state and the
/// current frame's sample buffer.
pub struct Apu {
    ch1: SquareChannel,
    sweep: Sweep,
    ch2: SquareChannel,
    ch3: WaveChannel,
    ch4: NoiseChannel,
    sequencer: FrameSequencer,
    last_div_bit: bool,
    samples: Box<AudioFrame>,
    /// Next stereo slot in `samples`.
    sample: usize,
    clock: u64,
}

impl Apu {
    pub fn new() -> Self {
        Self {
            ch1: SquareChannel::default(),
            sweep: Sweep::default(),
            ch2: SquareChannel::default(),
            ch3: WaveChannel::default(),
            ch4: NoiseChannel::default(),
            sequencer: FrameSequencer::new(),
            last_div_bit: false,
            samples: Box::new([0; AUDIO_FRAME_LEN]),
            sample: 0,
            clock: 0,
        }
    }

    /// Interleaved left/right samples of the current frame.
    pub fn samples(&self) -> &AudioFrame {
        &self.samples
    }

    pub fn tick(&mut self, mmu: &mut Mmu) {
        let triggers = mmu.take_apu_triggers();
        if triggers & CH1.bit != 0 {
            self.trigger_ch1(mmu);
        }
        if triggers & CH2.bit != 0 {
            self.ch2.trigger(mmu, &CH2);
            check_dac(mmu, &CH2);
        }
        if triggers & CH3.bit != 0 {
            self.trigger_ch3(mmu);
        }
        if triggers & CH4.bit != 0 {
            self.trigger_ch4(mmu);
        }

        // the divider runs twice as fast in double speed
        let bit = SEQUENCER_DIV_BIT + u16::from(mmu.double_speed);
        let div_bit = (mmu.timer.div >> bit) & 1 != 0;
        if self.last_div_bit && !div_bit {
            let step = self.sequencer.advance();
            if step & 1 == 0 {
                self.clock_lengths(mmu);
            }
            if step == 2 || step == 6 {
                self.clock_sweep(mmu);
            }
            if step == 7 {
                self.clock_envelopes(mmu);
            }
        }
        self.last_div_bit = div_bit;

        if channel_on(mmu, &CH1) {
            self.ch1.step(frequency(mmu, &CH1));
        }
        if channel_on(mmu, &CH2) {
            self.ch2.step(frequency(mmu, &CH2));
        }
        if channel_on(mmu, &CH3) {
            self.ch3.step(mmu, frequency(mmu, &CH3));
        }
        if channel_on(mmu, &CH4) {
            self.ch4.step(mmu.reg(io::NR43));
        }

        let outputs = self.channel_outputs(mmu);
        mmu.set_reg(io::PCM12, outputs[0] | (outputs[1] << 4));
        mmu.set_reg(io::PCM34, outputs[2] | (outputs[3] << 4));

        let frame = TICKS_PER_FRAME as u64;
        if self.clock % frame == self.sample as u64 * frame / FRAME_SAMPLES as u64 {
            let (left, right) = mix(mmu, outputs);
            self.samples[self.sample * 2] = left;
            self.samples[self.sample * 2 + 1] = right;
            self.sample = (self.sample + 1) % FRAME_SAMPLES;
        }
        self.clock += 1;
    }

    fn trigger_ch1(&mut self, mmu: &mut Mmu) {
        self.ch1.trigger(mmu, &CH1);
        let freq = frequency(mmu, &CH1);
        self.sweep.reload(mmu.reg(io::NR10), freq);
        if self.sweep.shift != 0 && self.sweep.calculate() > MAX_FREQUENCY {
            disable(mmu, &CH1);
        }
        check_dac(mmu, &CH1);
        #[cfg(feature = "apu-trace")]
        trace!("ch1 trigger freq={freq:03X} nr10={:02X}", mmu.reg(io::NR10));
    }

    fn trigger_ch3(&mut self, mmu: &mut Mmu) {
        self.ch3.length = 256 - mmu.reg(CH3.nrx1) as u16;
        self.ch3.counter = 0;
        self.ch3.position = 0;
        if mmu.reg(io::NR30) & 0x80 == 0 {
            disable(mmu, &CH3);
        }
        #[cfg(feature = "apu-trace")]
        trace!("ch3 trigger freq={:03X}", frequency(mmu, &CH3));
    }

    fn trigger_ch4(&mut self, mmu: &mut Mmu) {
        self.ch4.envelope.reset(mmu.reg(CH4.nrx2));
        self.ch4.length = 64 - (mmu.reg(CH4.nrx1) & 0x3F) as u16;
        self.ch4.counter = 0;
        self.ch4.lfsr = 0;
        check_dac(mmu, &CH4);
        #[cfg(feature = "apu-trace")]
        trace!("ch4 trigger nr43={:02X}", mmu.reg(io::NR43));
    }

    /// Length counters only run while NRx4 bit 6 is set.
    fn clock_lengths(&mut self, mmu: &mut Mmu) {
        let lengths = [
            (&mut self.ch1.length, &CH1),
            (&mut self.ch2.length, &CH2),
            (&mut self.ch3.length, &CH3),
            (&mut self.ch4.length, &CH4),
        ];
        for (length, regs) in lengths {
            if !channel_on(mmu, regs) || mmu.reg(regs.nrx4) & 0x40 == 0 || *length == 0 {
                continue;
            }
            *length -= 1;
            if *length == 0 {
                disable(mmu, regs);
            }
        }
    }

    fn clock_sweep(&mut self, mmu: &mut Mmu) {
        if self.sweep.timer > 0 {
            self.sweep.timer -= 1;
        }
        if self.sweep.timer != 0 {
            return;
        }
        self.sweep.timer = self.sweep.reload_timer();
        if !self.sweep.enabled || self.sweep.period == 0 || !channel_on(mmu, &CH1) {
            return;
        }
        let freq = self.sweep.calculate();
        if freq > MAX_FREQUENCY {
            disable(mmu, &CH1);
            return;
        }
        if self.sweep.shift != 0 {
            self.sweep.shadow = freq;
            mmu.set_reg(io::NR13, freq as u8);
            let nr14 = (mmu.reg(io::NR14) & !0x07) | ((freq >> 8) as u8 & 0x07);
            mmu.set_reg(io::NR14, nr14);
            // overflow is checked again against the new shadow value
            if self.sweep.calculate() > MAX_FREQUENCY {
                disable(mmu, &CH1);
            }
        }
    }

    fn clock_envelopes(&mut self, mmu: &mut Mmu) {
        let envelopes = [
            (&mut self.ch1.envelope, &CH1),
            (&mut self.ch2.envelope, &CH2),
            (&mut self.ch4.envelope, &CH4),
        ];
        for (envelope, regs) in envelopes {
            if channel_on(mmu, regs) && envelope.clock() {
                disable(mmu, regs);
            }
        }
    }

    /// Current 4-bit output of each channel; silent channels read 0.
    fn channel_outputs(&self, mmu: &Mmu) -> [u8; 4] {
        let mut out = [0; 4];
        if channel_on(mmu, &CH1) {
            out[0] = self.ch1.output(mmu.reg(io::NR11));
        }
        if channel_on(mmu, &CH2) {
            out[1] = self.ch2.output(mmu.reg(io::NR21));
        }
        if channel_on(mmu, &CH3) && mmu.reg(io::NR30) & 0x80 != 0 {
            out[2] = self.ch3.output(mmu.reg(io::NR32));
        }
        if channel_on(mmu, &CH4) {
            out[3] = self.ch4.output();
        }
        out
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

/// A channel whose DAC is off (NRx2 upper five bits clear) cannot start.
fn check_dac(mmu: &mut Mmu, regs: &ChannelRegs) {
    if mmu.reg(regs.nrx2) & 0xF8 == 0 {
        disable(mmu, regs);
    }
}

/// Pan with NR51 and scale with NR50. Each channel contributes up to 63 per
/// side before the master volume.
fn mix(mmu: &Mmu, outputs: [u8; 4]) -> (u16, u16) {
    let nr52 = mmu.reg(io::NR52);
    if nr52 & 0x80 == 0 {
        return (0, 0);
    }
    let nr50 = mmu.reg(io::NR50);
    let nr51 = mmu.reg(io::NR51);
    let mut left = 0u16;
    let mut right = 0u16;
    for (ch, &out) in outputs.iter().enumerate() {
        let level = (out as u16 * 17) >> 2;
        if nr51 & (0x10 << ch) != 0 {
            left += level;
        }
        if nr51 & (0x01 << ch) != 0 {
            right += level;
        }
    }
    let left = left * ((nr50 & 0x70) >> 4) as u16 / 7;
    let right = right * (nr50 & 0x07) as u16 / 7;
    (left, right)
}
