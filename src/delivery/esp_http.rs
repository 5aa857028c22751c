use super::error::TransportError;
use super::transport::{HttpResponse, HttpTransport};
use crate::wifi::WifiManager;
use embedded_svc::http::client::Client;
use embedded_svc::http::{Headers, Status};
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::client::{Configuration, EspHttpConnection, FollowRedirectsPolicy};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MAX_BODY_LEN: usize = 1024;

/// HTTP(S) transport on the ESP-IDF client. A fresh connection is opened per
/// request so a stuck socket never outlives its timeout.
pub struct EspHttpTransport {
    wifi: Arc<Mutex<WifiManager>>,
}

impl EspHttpTransport {
    pub fn new(wifi: Arc<Mutex<WifiManager>>) -> Self {
        Self { wifi }
    }

    fn client(timeout: Duration) -> Result<Client<EspHttpConnection>, TransportError> {
        let connection = EspHttpConnection::new(&Configuration {
            timeout: Some(timeout),
            follow_redirects_policy: FollowRedirectsPolicy::FollowNone,
            crt_bundle_attach: Some(esp_idf_sys::esp_crt_bundle_attach),
            ..Default::default()
        })
        .map_err(|e| TransportError::Connect(format!("{:?}", e)))?;
        Ok(Client::wrap(connection))
    }

    fn read_response<R>(response: &mut R) -> Result<HttpResponse, TransportError>
    where
        R: Read + Headers + Status,
    {
        let status = response.status();
        let location = response.header("Location").map(|l| l.to_string());

        let mut body = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = response
                .read(&mut buf)
                .map_err(|e| TransportError::Io(format!("{:?}", e)))?;
            if n == 0 {
                break;
            }
            // Body is diagnostic only; keep the head of it
            let room = MAX_BODY_LEN.saturating_sub(body.len());
            body.extend_from_slice(&buf[..n.min(room)]);
        }

        Ok(HttpResponse {
            status,
            location,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

impl HttpTransport for EspHttpTransport {
    fn is_connected(&self) -> bool {
        match self.wifi.lock() {
            Ok(wifi) => wifi.is_connected().unwrap_or(false),
            Err(_) => false,
        }
    }

    fn post_json(
        &mut self,
        url: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        log::info!("[HTTP] Opening connection to {}", url);
        let mut client = Self::client(timeout)?;
        let content_length = body.len().to_string();
        let headers = [
            ("Content-Type", "application/json"),
            ("Content-Length", content_length.as_str()),
        ];

        let mut request = client
            .post(url, &headers)
            .map_err(|e| TransportError::Connect(format!("{:?}", e)))?;
        request
            .write_all(body.as_bytes())
            .map_err(|e| TransportError::Io(format!("{:?}", e)))?;
        request
            .flush()
            .map_err(|e| TransportError::Io(format!("{:?}", e)))?;
        let mut response = request
            .submit()
            .map_err(|e| TransportError::Io(format!("{:?}", e)))?;

        Self::read_response(&mut response)
    }

    fn get(&mut self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let mut client = Self::client(timeout)?;
        let request = client
            .get(url)
            .map_err(|e| TransportError::Connect(format!("{:?}", e)))?;
        let mut response = request
            .submit()
            .map_err(|e| TransportError::Io(format!("{:?}", e)))?;

        Self::read_response(&mut response)
    }
}
