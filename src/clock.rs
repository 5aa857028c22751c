use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use crate::config::TimeConfig;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Coarse monotonic millisecond clock. Wraps at `u32::MAX` like the device
/// timer; consumers compare with `wrapping_sub`.
pub trait Clock {
    fn millis(&self) -> u32;
}

/// Wall-clock source for reading timestamps
pub trait WallClock {
    /// Local time formatted for the payload, or `None` if not yet synchronized
    fn local_timestamp(&self) -> Option<String>;
}

/// Blocking pause used between delivery attempts
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// Sleeps the calling thread; on ESP-IDF this yields to FreeRTOS
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

/// Convert an `esp_timer` microsecond reading to the wrapping millisecond
/// clock. The sensor interrupt and the poller both go through this so pulse
/// times and poll times share one origin.
pub fn millis_from_micros(now_us: i64) -> u32 {
    (now_us / 1_000) as u32
}

/// Milliseconds since boot from the ESP-IDF high resolution timer
#[cfg(target_os = "espidf")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BootClock;

#[cfg(target_os = "espidf")]
impl Clock for BootClock {
    fn millis(&self) -> u32 {
        // SAFETY: esp_timer is started by the runtime before main
        millis_from_micros(unsafe { esp_idf_sys::esp_timer_get_time() })
    }
}

/// System time interpreted at a fixed offset. The system clock is set by
/// SNTP on the device; before that it reads 1970 and counts as unsynced.
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    pub fn new(config: &TimeConfig) -> Self {
        let secs = config.gmt_offset_secs + config.daylight_offset_secs;
        let offset = FixedOffset::east_opt(secs).unwrap_or_else(|| {
            log::warn!("Clock: offset {}s out of range, using UTC", secs);
            Utc.fix()
        });
        Self { offset }
    }

    pub fn is_synced(&self) -> bool {
        is_plausible(&Utc::now())
    }
}

impl WallClock for LocalClock {
    fn local_timestamp(&self) -> Option<String> {
        format_local(&Utc::now(), self.offset)
    }
}

fn is_plausible(now: &DateTime<Utc>) -> bool {
    now.year() > 2020
}

/// Format `now` at `offset`, refusing times from an unsynchronized clock
pub fn format_local(now: &DateTime<Utc>, offset: FixedOffset) -> Option<String> {
    if !is_plausible(now) {
        return None;
    }
    Some(now.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string())
}

/// Timestamp for a reading, degrading to the configured fallback
pub fn reading_timestamp(clock: &dyn WallClock, fallback: &str) -> String {
    match clock.local_timestamp() {
        Some(ts) => ts,
        None => {
            log::warn!("Clock: time not available, using fallback {}", fallback);
            fallback.to_string()
        }
    }
}
