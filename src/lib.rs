//! ESP32 Flow Meter Library
//!
//! Pulse debouncing, flow session tracking and operator-authorized delivery
//! of volume readings to an HTTP collection endpoint. The ESP-IDF glue is
//! only built for the device target; everything else runs on the host.

pub mod cli;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod flow;
pub mod monitor;
#[cfg(target_os = "espidf")]
pub mod wifi;

pub use cli::{CliError, CodeParser, ConsolePort, Terminal};
pub use clock::{millis_from_micros, Clock, Delay, LocalClock, ThreadDelay, WallClock};
#[cfg(target_os = "espidf")]
pub use clock::BootClock;
pub use config::{
    AppConfig, ConfigError, DeliveryConfig, EndpointConfig, FlowConfig, TimeConfig, WifiConfig,
};
pub use delivery::{
    DeliveryClient, DeliveryError, HttpResponse, HttpTransport, Reading, TransportError,
};
pub use flow::{AuthOutcome, FlowState, FlowTracker, PulseDebouncer, SessionEvent};
pub use monitor::{FlowMonitor, MonitorEvent};
#[cfg(target_os = "espidf")]
pub use wifi::WifiManager;
