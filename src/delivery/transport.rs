use super::error::TransportError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            location: None,
            body: String::new(),
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }
}

/// HTTP-capable network link used by the delivery client.
///
/// Implementations must not follow redirects themselves; the client decides
/// how many hops to chase.
pub trait HttpTransport {
    /// Whether the network link is currently associated
    fn is_connected(&self) -> bool;

    /// POST `body` with `Content-Type: application/json`
    fn post_json(
        &mut self,
        url: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;

    fn get(&mut self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError>;
}
