use crate::cli::CodeParser;
use crate::clock::{reading_timestamp, Clock, Delay, WallClock};
use crate::delivery::{DeliveryClient, HttpTransport};
use crate::flow::{AuthOutcome, FlowState, FlowTracker, PulseDebouncer, SessionEvent};
use std::fmt;

/// Something the operator console should hear about
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    PulsesCounted { total_pulses: u32, volume_m3: f64 },
    FlowEnded { volume_m3: f64 },
    AuthorizationRequested { volume_m3: f64, code: i64 },
    Authorized,
    AuthorizationRejected,
    AttemptFailed { attempt: u32, max_attempts: u32, reason: String },
    Delivered { volume_m3: f64, timestamp: String },
    DeliveryFailed { volume_m3: f64 },
    WaitingForFlow,
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MonitorEvent::PulsesCounted {
                total_pulses,
                volume_m3,
            } => write!(
                f,
                "Pulses: {} | Accumulated volume: {:.6} m³",
                total_pulses, volume_m3
            ),
            MonitorEvent::FlowEnded { volume_m3 } => write!(
                f,
                "\r\n--- Flow ended ---\r\nTotal accumulated volume: {:.6} m³",
                volume_m3
            ),
            MonitorEvent::AuthorizationRequested { code, .. } => {
                write!(f, "Type {} to authorize sending the reading.", code)
            }
            MonitorEvent::Authorized => write!(f, "Authorized! The next POST will be sent."),
            MonitorEvent::AuthorizationRejected => write!(f, "Incorrect code. Try again."),
            MonitorEvent::AttemptFailed {
                attempt,
                max_attempts,
                reason,
            } => write!(f, "Attempt {} of {} failed: {}", attempt, max_attempts, reason),
            MonitorEvent::Delivered { volume_m3, timestamp } => write!(
                f,
                "POST sent successfully! ({:.6} m³ at {})",
                volume_m3, timestamp
            ),
            MonitorEvent::DeliveryFailed { volume_m3 } => write!(
                f,
                "ERROR sending POST after multiple attempts.\r\n{:.6} m³ kept for a later send.",
                volume_m3
            ),
            MonitorEvent::WaitingForFlow => write!(f, "\r\nWaiting for new flow..."),
        }
    }
}

impl MonitorEvent {
    /// Whether the console should show the code prompt after this line
    pub fn wants_prompt(&self) -> bool {
        matches!(
            self,
            MonitorEvent::AuthorizationRequested { .. } | MonitorEvent::AuthorizationRejected
        )
    }

    fn from_session(event: SessionEvent, code: i64) -> Self {
        match event {
            SessionEvent::PulsesCounted {
                total_pulses,
                volume_m3,
            } => MonitorEvent::PulsesCounted {
                total_pulses,
                volume_m3,
            },
            SessionEvent::FlowEnded { volume_m3 } => MonitorEvent::FlowEnded { volume_m3 },
            SessionEvent::AuthorizationRequested { volume_m3 } => {
                MonitorEvent::AuthorizationRequested { volume_m3, code }
            }
        }
    }
}

/// The polling loop body: operator input, pulse accounting, session end
/// detection and gated delivery, in that order, once per tick.
pub struct FlowMonitor<'a, T: HttpTransport, D: Delay, C: Clock, W: WallClock> {
    debouncer: &'a PulseDebouncer,
    tracker: FlowTracker,
    delivery: DeliveryClient<T, D>,
    clock: C,
    wall_clock: W,
    fallback_timestamp: String,
}

impl<'a, T: HttpTransport, D: Delay, C: Clock, W: WallClock> FlowMonitor<'a, T, D, C, W> {
    pub fn new(
        debouncer: &'a PulseDebouncer,
        tracker: FlowTracker,
        delivery: DeliveryClient<T, D>,
        clock: C,
        wall_clock: W,
        fallback_timestamp: &str,
    ) -> Self {
        debouncer.mark_start(clock.millis());
        Self {
            debouncer,
            tracker,
            delivery,
            clock,
            wall_clock,
            fallback_timestamp: fallback_timestamp.to_string(),
        }
    }

    pub fn tracker(&self) -> &FlowTracker {
        &self.tracker
    }

    pub fn delivery(&self) -> &DeliveryClient<T, D> {
        &self.delivery
    }

    pub fn delivery_mut(&mut self) -> &mut DeliveryClient<T, D> {
        &mut self.delivery
    }

    pub fn state(&self) -> FlowState {
        self.tracker.state()
    }

    /// Run one poll. `input` is a complete operator line, if one arrived.
    pub fn tick(&mut self, input: Option<&str>) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        let code = self.tracker.authorization_code();

        if let Some(line) = input {
            match self.tracker.submit_code(CodeParser::parse_code(line)) {
                AuthOutcome::Accepted => events.push(MonitorEvent::Authorized),
                AuthOutcome::Rejected => events.push(MonitorEvent::AuthorizationRejected),
            }
        }

        let now_ms = self.clock.millis();
        events.extend(
            self.tracker
                .sample(self.debouncer, now_ms)
                .into_iter()
                .map(|e| MonitorEvent::from_session(e, code)),
        );

        if let Some(volume_m3) = self.tracker.ready_for_delivery(self.debouncer) {
            self.deliver(volume_m3, &mut events);
        }

        if let Some(event) = self.tracker.rearm(self.debouncer) {
            events.push(MonitorEvent::from_session(event, code));
        }

        events
    }

    fn deliver(&mut self, volume_m3: f64, events: &mut Vec<MonitorEvent>) {
        let timestamp = reading_timestamp(&self.wall_clock, &self.fallback_timestamp);
        log::info!("Flow: Delivering {:.6} m³ at {}", volume_m3, timestamp);

        self.tracker.begin_delivery();
        let delivered = self.delivery.deliver_with(volume_m3, &timestamp, |report| {
            if let Err(e) = &report.result {
                events.push(MonitorEvent::AttemptFailed {
                    attempt: report.attempt,
                    max_attempts: report.max_attempts,
                    reason: e.to_string(),
                });
            }
        });
        self.tracker.finish_delivery(delivered, self.debouncer);

        if delivered {
            events.push(MonitorEvent::Delivered {
                volume_m3,
                timestamp,
            });
        } else {
            events.push(MonitorEvent::DeliveryFailed { volume_m3 });
        }
        events.push(MonitorEvent::WaitingForFlow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_lines_carry_six_decimals() {
        let line = MonitorEvent::PulsesCounted {
            total_pulses: 100,
            volume_m3: 0.007989,
        }
        .to_string();
        assert_eq!(line, "Pulses: 100 | Accumulated volume: 0.007989 m³");

        let prompt = MonitorEvent::AuthorizationRequested {
            volume_m3: 0.1,
            code: 1234,
        }
        .to_string();
        assert!(prompt.contains("1234"));
    }

    #[test]
    fn prompt_follows_request_and_rejection() {
        assert!(MonitorEvent::AuthorizationRequested {
            volume_m3: 0.1,
            code: 1234
        }
        .wants_prompt());
        assert!(MonitorEvent::AuthorizationRejected.wants_prompt());
        assert!(!MonitorEvent::Authorized.wants_prompt());
        assert!(!MonitorEvent::DeliveryFailed { volume_m3: 0.1 }.wants_prompt());
    }
}
