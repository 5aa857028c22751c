#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be opened (DNS, TCP, TLS)
    Connect(String),
    /// No response within the request timeout
    Timeout,
    /// Failure while writing the request or reading the response
    Io(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TransportError::Connect(e) => write!(f, "connection failed: {}", e),
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// No network association at attempt time
    NotConnected,
    Transport(TransportError),
    /// Endpoint answered with a non-success status
    Status { status: u16, body: String },
    /// Redirect status without a usable Location header
    RedirectWithoutLocation(u16),
    /// The single redirect hop answered with an error status
    RedirectFailed { status: u16, body: String },
    /// Reading could not be serialized
    Payload(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DeliveryError::NotConnected => write!(f, "WiFi not connected"),
            DeliveryError::Transport(e) => write!(f, "HTTP request failed: {}", e),
            DeliveryError::Status { status, .. } => write!(f, "HTTP status {}", status),
            DeliveryError::RedirectWithoutLocation(status) => {
                write!(f, "HTTP {} redirect without Location", status)
            }
            DeliveryError::RedirectFailed { status, .. } => {
                write!(f, "redirect target answered HTTP {}", status)
            }
            DeliveryError::Payload(e) => write!(f, "cannot encode payload: {}", e),
        }
    }
}

impl std::error::Error for DeliveryError {}

impl From<TransportError> for DeliveryError {
    fn from(e: TransportError) -> Self {
        DeliveryError::Transport(e)
    }
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;
