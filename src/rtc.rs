//! MBC3 real-time clock.
//!
//! The clock never ticks on its own. Every register read is computed from the
//! host wall clock plus a stored offset, and every register write rewrites
//! that offset so the written value reads back relative to the current time.
//! The wall clock itself sits behind [`Clock`] so tests can drive it by hand.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

const SECONDS_PER_DAY: i64 = 60 * 60 * 24;

/// Bytes produced by [`Rtc::to_bytes`].
pub const RTC_STATE_LEN: usize = 16;

/// Source of wall-clock time for the RTC, in seconds since the Unix epoch.
pub trait Clock: Send + std::fmt::Debug {
    fn now(&self) -> i64;
}

/// The host system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self(Arc::new(AtomicI64::new(start)))
    }

    pub fn set(&self, secs: i64) {
        self.0.store(secs, Ordering::Relaxed);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// RTC registers 0x08-0x0C expressed as offsets from wall-clock time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rtc {
    /// Added to the wall clock before splitting into hours/minutes/seconds.
    offset: i64,
    /// Wall-clock second at which the day counter read zero.
    day_base: i64,
}

impl Rtc {
    /// A clock reading 00:00:00 on day 0 at `now`'s time of day.
    pub fn new(now: i64) -> Self {
        Self {
            offset: 0,
            day_base: start_of_day(now),
        }
    }

    fn days(&self, now: i64) -> i64 {
        let delta = now - self.day_base;
        if delta < 0 { 0 } else { delta / SECONDS_PER_DAY }
    }

    fn set_days(&mut self, now: i64, days: i64) {
        self.day_base = start_of_day(now) - days * SECONDS_PER_DAY;
    }

    pub fn read(&self, reg: u8, now: i64) -> u8 {
        let time_of_day = (now + self.offset).rem_euclid(SECONDS_PER_DAY);
        match reg {
            0x08 => (time_of_day % 60) as u8,
            0x09 => (time_of_day / 60 % 60) as u8,
            0x0A => (time_of_day / 3600) as u8,
            0x0B => (self.days(now) & 0xFF) as u8,
            0x0C => {
                let days = self.days(now);
                let mut out = (((days % 512) >> 8) & 1) as u8;
                if days > 511 {
                    out |= 0x80;
                }
                out
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, reg: u8, val: u8, now: i64) {
        match reg {
            0x08..=0x0A => {
                let t = now + self.offset;
                let time_of_day = t.rem_euclid(SECONDS_PER_DAY);
                let mut hours = time_of_day / 3600;
                let mut minutes = time_of_day / 60 % 60;
                let mut seconds = time_of_day % 60;
                match reg {
                    0x08 => seconds = val as i64,
                    0x09 => minutes = val as i64,
                    _ => hours = val as i64,
                }
                let rebuilt = t - time_of_day + hours * 3600 + minutes * 60 + seconds;
                self.offset = rebuilt - now;
            }
            0x0B => {
                let days = self.days(now);
                self.set_days(now, days - days % 256 + val as i64);
            }
            0x0C => {
                let mut days = self.days(now);
                if val & 0x80 == 0 {
                    days %= 512;
                }
                days = (days & !0x100) | (((val & 1) as i64) << 8);
                self.set_days(now, days);
            }
            _ => {}
        }
    }

    pub fn to_bytes(&self) -> [u8; RTC_STATE_LEN] {
        let mut out = [0u8; RTC_STATE_LEN];
        out[..8].copy_from_slice(&self.offset.to_le_bytes());
        out[8..].copy_from_slice(&self.day_base.to_le_bytes());
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let bytes: &[u8; RTC_STATE_LEN] = data.try_into().map_err(|_| Error::RtcStateSize {
            len: data.len(),
            expected: RTC_STATE_LEN,
        })?;
        let mut offset = [0u8; 8];
        let mut day_base = [0u8; 8];
        offset.copy_from_slice(&bytes[..8]);
        day_base.copy_from_slice(&bytes[8..]);
        Ok(Self {
            offset: i64::from_le_bytes(offset),
            day_base: i64::from_le_bytes(day_base),
        })
    }
}

fn start_of_day(now: i64) -> i64 {
    now - now.rem_euclid(SECONDS_PER_DAY)
}
