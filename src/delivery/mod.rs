pub mod client;
pub mod error;
#[cfg(target_os = "espidf")]
pub mod esp_http;
pub mod payload;
pub mod transport;

pub use client::{AttemptReport, DeliveryClient};
pub use error::{DeliveryError, DeliveryResult, TransportError};
#[cfg(target_os = "espidf")]
pub use esp_http::EspHttpTransport;
pub use payload::Reading;
pub use transport::{HttpResponse, HttpTransport};
