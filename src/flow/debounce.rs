use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Pulse state shared between the sensor edge interrupt and the polling loop.
///
/// Every field is an independent atomic. The poller may observe `flow_active`
/// and `last_pulse_ms` slightly out of step; nothing relies on them changing
/// together. Counters are 32-bit because the ESP32 has no native 64-bit
/// atomics, and the clocks wrap the same way the ESP-IDF timer readings do.
pub struct PulseDebouncer {
    window_us: AtomicU32,
    pulses: AtomicU32,
    last_edge_us: AtomicU32,
    last_pulse_ms: AtomicU32,
    flow_active: AtomicBool,
}

/// Point-in-time copy of the shared pulse state as seen by the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSnapshot {
    pub pulses: u32,
    pub last_pulse_ms: u32,
    pub flow_active: bool,
}

impl PulseDebouncer {
    pub const fn new(window_us: u32) -> Self {
        Self {
            window_us: AtomicU32::new(window_us),
            pulses: AtomicU32::new(0),
            last_edge_us: AtomicU32::new(0),
            last_pulse_ms: AtomicU32::new(0),
            flow_active: AtomicBool::new(false),
        }
    }

    pub fn set_window_us(&self, window_us: u32) {
        self.window_us.store(window_us, Ordering::Relaxed);
    }

    pub fn window_us(&self) -> u32 {
        self.window_us.load(Ordering::Relaxed)
    }

    /// Handle one rising edge. Runs in interrupt context: no blocking, no
    /// logging, constant time.
    ///
    /// `now_us` is the fine clock used for the debounce gate, `now_ms` the
    /// coarse clock the inactivity timeout is measured against. Returns
    /// whether the edge was counted; edges inside the window are dropped.
    #[inline]
    pub fn on_edge(&self, now_us: u32, now_ms: u32) -> bool {
        let last = self.last_edge_us.load(Ordering::Relaxed);
        if now_us.wrapping_sub(last) <= self.window_us.load(Ordering::Relaxed) {
            return false;
        }

        self.last_edge_us.store(now_us, Ordering::Relaxed);
        self.last_pulse_ms.store(now_ms, Ordering::Relaxed);
        self.flow_active.store(true, Ordering::Relaxed);
        // Release pairs with the poller's Acquire so a snapshot that sees the
        // new count also sees the timestamp written above.
        self.pulses.fetch_add(1, Ordering::Release);
        true
    }

    pub fn pulses(&self) -> u32 {
        self.pulses.load(Ordering::Acquire)
    }

    pub fn last_pulse_ms(&self) -> u32 {
        self.last_pulse_ms.load(Ordering::Relaxed)
    }

    pub fn flow_active(&self) -> bool {
        self.flow_active.load(Ordering::Relaxed)
    }

    /// Called by the poller once the inactivity timeout has elapsed
    pub fn clear_flow_active(&self) {
        self.flow_active.store(false, Ordering::Relaxed);
    }

    pub fn mark_flow_resumed(&self) {
        self.flow_active.store(true, Ordering::Relaxed);
    }

    /// Seed the coarse pulse clock at startup so the first inactivity check
    /// measures from boot rather than from zero.
    pub fn mark_start(&self, now_ms: u32) {
        self.last_pulse_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PulseSnapshot {
        let pulses = self.pulses();
        PulseSnapshot {
            pulses,
            last_pulse_ms: self.last_pulse_ms(),
            flow_active: self.flow_active(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WINDOW: u32 = 5_000;

    fn feed(debouncer: &PulseDebouncer, edges_us: &[u32]) {
        for &t in edges_us {
            debouncer.on_edge(t, t / 1_000);
        }
    }

    #[test]
    fn accepts_edges_spaced_beyond_window() {
        let debouncer = PulseDebouncer::new(WINDOW);
        let edges: Vec<u32> = (1..=100).map(|i| i * 10_000).collect();
        feed(&debouncer, &edges);

        assert_eq!(debouncer.pulses(), 100);
        assert!(debouncer.flow_active());
        assert_eq!(debouncer.last_pulse_ms(), 1_000);
    }

    #[test]
    fn drops_bounce_inside_window() {
        let debouncer = PulseDebouncer::new(WINDOW);
        assert!(debouncer.on_edge(10_000, 10));
        assert!(!debouncer.on_edge(10_100, 10));
        assert!(!debouncer.on_edge(14_999, 14));
        // Exactly at the window boundary is still bounce
        assert!(!debouncer.on_edge(15_000, 15));
        assert!(debouncer.on_edge(15_001, 15));
        assert_eq!(debouncer.pulses(), 2);
        assert_eq!(debouncer.last_pulse_ms(), 15);
    }

    #[test]
    fn rejected_edge_does_not_move_window() {
        let debouncer = PulseDebouncer::new(WINDOW);
        debouncer.on_edge(10_000, 10);
        debouncer.on_edge(13_000, 13);
        // 6 ms after the accepted edge, 3 ms after the rejected one
        assert!(debouncer.on_edge(16_000, 16));
    }

    #[test]
    fn survives_microsecond_clock_wrap() {
        let debouncer = PulseDebouncer::new(WINDOW);
        assert!(debouncer.on_edge(u32::MAX - 1_000, 0));
        assert!(!debouncer.on_edge(2_000, 0));
        assert!(debouncer.on_edge(5_000, 0));
        assert_eq!(debouncer.pulses(), 2);
    }

    #[test]
    fn poller_clears_flow_flag_without_touching_count() {
        let debouncer = PulseDebouncer::new(WINDOW);
        debouncer.on_edge(10_000, 10);
        debouncer.clear_flow_active();

        let snapshot = debouncer.snapshot();
        assert!(!snapshot.flow_active);
        assert_eq!(snapshot.pulses, 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: the count equals the number of edges that open a new
        /// window, and never decreases.
        #[test]
        fn prop_counts_one_pulse_per_window(gaps in prop::collection::vec(1u32..20_000, 1..200)) {
            let debouncer = PulseDebouncer::new(WINDOW);
            let mut now = WINDOW + 1;
            let mut last_accepted: Option<u32> = None;
            let mut expected = 0u32;
            let mut previous = 0u32;

            for gap in gaps {
                now += gap;
                let opens_window = last_accepted.map_or(true, |t| now - t > WINDOW);
                let accepted = debouncer.on_edge(now, now / 1_000);
                prop_assert_eq!(accepted, opens_window);
                if accepted {
                    expected += 1;
                    last_accepted = Some(now);
                }
                let count = debouncer.pulses();
                prop_assert!(count >= previous);
                previous = count;
            }
            prop_assert_eq!(debouncer.pulses(), expected);
        }
    }
}
