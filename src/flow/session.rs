use super::debounce::PulseDebouncer;
use crate::config::FlowConfig;

/// Conceptual session state, derived from the tracker's flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    FlowActive,
    AwaitingAuthorization,
    Authorized,
    Delivering,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// New pulses were credited while flow is running
    PulsesCounted { total_pulses: u32, volume_m3: f64 },
    /// Inactivity timeout closed the session
    FlowEnded { volume_m3: f64 },
    /// A reading is pending and needs the operator code
    AuthorizationRequested { volume_m3: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorizationGate {
    pub awaiting: bool,
    pub authorized: bool,
}

impl AuthorizationGate {
    fn clear(&mut self) {
        self.awaiting = false;
        self.authorized = false;
    }
}

/// Turns pulse counter deltas into an accumulated volume and decides when a
/// session ends and when its reading may be delivered.
///
/// Owned by the polling loop; the only shared input is the debouncer.
#[derive(Debug)]
pub struct FlowTracker {
    calibration_constant: f64,
    sample_interval_ms: u32,
    inactivity_timeout_ms: u32,
    authorization_code: i64,
    volume_m3: f64,
    last_pulse_count: u32,
    flow_active: bool,
    gate: AuthorizationGate,
    delivering: bool,
}

impl FlowTracker {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            calibration_constant: config.calibration_constant,
            sample_interval_ms: config.sample_interval_ms,
            inactivity_timeout_ms: config.inactivity_timeout_ms,
            authorization_code: config.authorization_code,
            volume_m3: 0.0,
            last_pulse_count: 0,
            flow_active: false,
            gate: AuthorizationGate::default(),
            delivering: false,
        }
    }

    /// Volume in m³ credited for `pulses` sensor pulses
    pub fn volume_for_pulses(&self, pulses: u32) -> f64 {
        self.calibration_constant * f64::from(pulses) / 1000.0 * f64::from(self.sample_interval_ms)
            / 1000.0
    }

    pub fn volume_m3(&self) -> f64 {
        self.volume_m3
    }

    pub fn gate(&self) -> AuthorizationGate {
        self.gate
    }

    pub fn authorization_code(&self) -> i64 {
        self.authorization_code
    }

    pub fn state(&self) -> FlowState {
        if self.delivering {
            FlowState::Delivering
        } else if self.flow_active {
            FlowState::FlowActive
        } else if self.gate.authorized {
            FlowState::Authorized
        } else if self.gate.awaiting {
            FlowState::AwaitingAuthorization
        } else {
            FlowState::Idle
        }
    }

    /// Check an operator-entered code. A match authorizes the next delivery
    /// whether or not a reading is pending yet.
    pub fn submit_code(&mut self, code: i64) -> AuthOutcome {
        if code == self.authorization_code {
            self.gate.authorized = true;
            log::info!("Flow: Authorization accepted");
            AuthOutcome::Accepted
        } else {
            log::warn!("Flow: Authorization rejected");
            AuthOutcome::Rejected
        }
    }

    /// One poll: credit new pulses, then end the session if the sensor has
    /// been silent longer than the inactivity timeout.
    pub fn sample(&mut self, debouncer: &PulseDebouncer, now_ms: u32) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        let current = debouncer.pulses();
        // The counter only grows; a smaller reading is an anomaly and credits nothing
        let delta = current.saturating_sub(self.last_pulse_count);
        if delta > 0 {
            self.volume_m3 += self.volume_for_pulses(delta);
            self.last_pulse_count = current;

            if debouncer.flow_active() {
                events.push(SessionEvent::PulsesCounted {
                    total_pulses: current,
                    volume_m3: self.volume_m3,
                });
            }
        }

        let last_pulse_ms = debouncer.last_pulse_ms();
        if debouncer.flow_active()
            && silence_ms(now_ms, last_pulse_ms) > self.inactivity_timeout_ms
            && self.close_flow(debouncer, last_pulse_ms)
        {
            log::info!("Flow: Session ended, {:.6} m³ accumulated", self.volume_m3);
            events.push(SessionEvent::FlowEnded {
                volume_m3: self.volume_m3,
            });
            if self.volume_m3 > 0.0 {
                self.gate.awaiting = true;
                events.push(SessionEvent::AuthorizationRequested {
                    volume_m3: self.volume_m3,
                });
            }
        }

        self.flow_active = debouncer.flow_active();
        events
    }

    /// Clear the shared flow flag unless an edge newer than `observed_last_ms`
    /// arrived meanwhile, in which case the flow is marked running again.
    /// Returns whether the session actually closed.
    fn close_flow(&self, debouncer: &PulseDebouncer, observed_last_ms: u32) -> bool {
        debouncer.clear_flow_active();
        if debouncer.last_pulse_ms() != observed_last_ms {
            debouncer.mark_flow_resumed();
            return false;
        }
        true
    }

    /// Volume to deliver, if flow is stopped, something is pending and the
    /// operator has authorized it.
    pub fn ready_for_delivery(&self, debouncer: &PulseDebouncer) -> Option<f64> {
        if !debouncer.flow_active() && self.volume_m3 > 0.0 && self.gate.authorized {
            Some(self.volume_m3)
        } else {
            None
        }
    }

    pub fn begin_delivery(&mut self) {
        self.delivering = true;
    }

    /// Close an attempt cycle. The gate is cleared either way; only a
    /// successful delivery consumes the reading, and pulses that arrived while
    /// it was in flight are absorbed rather than credited to the next session.
    pub fn finish_delivery(&mut self, delivered: bool, debouncer: &PulseDebouncer) {
        self.delivering = false;
        if delivered {
            self.volume_m3 = 0.0;
            self.last_pulse_count = debouncer.pulses();
        }
        self.gate.clear();
        self.flow_active = debouncer.flow_active();
    }

    /// Re-open the gate for a reading that survived a failed delivery cycle
    pub fn rearm(&mut self, debouncer: &PulseDebouncer) -> Option<SessionEvent> {
        if !debouncer.flow_active()
            && self.volume_m3 > 0.0
            && !self.gate.authorized
            && !self.gate.awaiting
        {
            self.gate.awaiting = true;
            Some(SessionEvent::AuthorizationRequested {
                volume_m3: self.volume_m3,
            })
        } else {
            None
        }
    }
}

/// Milliseconds since `last_ms` on the wrapping clock. A pulse stamped after
/// `now_ms` (it raced the clock read) has age zero.
fn silence_ms(now_ms: u32, last_ms: u32) -> u32 {
    let age = now_ms.wrapping_sub(last_ms);
    if age > i32::MAX as u32 {
        0
    } else {
        age
    }
}
