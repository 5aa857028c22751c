pub mod debounce;
#[cfg(target_os = "espidf")]
pub mod edge_isr;
pub mod session;

pub use debounce::{PulseDebouncer, PulseSnapshot};
#[cfg(target_os = "espidf")]
pub use edge_isr::PulseInput;
pub use session::{AuthOutcome, AuthorizationGate, FlowState, FlowTracker, SessionEvent};
