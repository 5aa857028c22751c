use super::error::{DeliveryError, DeliveryResult};
use super::payload::Reading;
use super::transport::HttpTransport;
use crate::clock::Delay;
use crate::config::{DeliveryConfig, EndpointConfig};
use std::time::Duration;

const SUCCESS_STATUSES: [u16; 3] = [200, 201, 202];
const REDIRECT_STATUSES: [u16; 4] = [301, 302, 307, 308];

/// Outcome of one attempt, passed to the progress callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    pub attempt: u32,
    pub max_attempts: u32,
    /// Final HTTP status on success
    pub result: DeliveryResult<u16>,
}

/// Delivers readings to the collection endpoint with bounded retries.
///
/// Runs on the polling loop and blocks it for the whole attempt cycle.
pub struct DeliveryClient<T: HttpTransport, D: Delay> {
    transport: T,
    delay: D,
    endpoint: EndpointConfig,
    config: DeliveryConfig,
}

impl<T: HttpTransport, D: Delay> DeliveryClient<T, D> {
    pub fn new(transport: T, delay: D, endpoint: EndpointConfig, config: DeliveryConfig) -> Self {
        Self {
            transport,
            delay,
            endpoint,
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn device_id(&self) -> u32 {
        self.endpoint.device_id
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Deliver one reading. True on the first successful attempt; false once
    /// the attempt budget is spent.
    pub fn deliver(&mut self, volume_m3: f64, timestamp: &str) -> bool {
        self.deliver_with(volume_m3, timestamp, |_| {})
    }

    /// As [`deliver`](Self::deliver), reporting every attempt to `on_attempt`
    pub fn deliver_with<F>(&mut self, volume_m3: f64, timestamp: &str, mut on_attempt: F) -> bool
    where
        F: FnMut(&AttemptReport),
    {
        let reading = Reading::new(self.endpoint.device_id, volume_m3, timestamp);
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                log::info!("HTTP: Delivery attempt {} of {}", attempt, max_attempts);
                self.delay.delay_ms(self.config.retry_delay_ms);
            }

            let result = self.attempt(&reading);
            let delivered = result.is_ok();
            match &result {
                Ok(status) => log::info!("✅ HTTP: Reading delivered (HTTP {})", status),
                Err(e) => log::warn!("❌ HTTP: Attempt {} failed: {}", attempt, e),
            }
            on_attempt(&AttemptReport {
                attempt,
                max_attempts,
                result,
            });
            if delivered {
                return true;
            }
        }

        log::error!(
            "❌ HTTP: Delivery failed after {} attempts, reading kept",
            max_attempts
        );
        false
    }

    /// One end-to-end attempt, following at most one redirect hop
    pub fn attempt(&mut self, reading: &Reading) -> DeliveryResult<u16> {
        if !self.transport.is_connected() {
            return Err(DeliveryError::NotConnected);
        }

        let payload = reading.to_json()?;
        let timeout = Duration::from_millis(u64::from(self.config.request_timeout_ms));
        log::info!("HTTP: POST {} {}", self.endpoint.url, payload);

        let response = self
            .transport
            .post_json(&self.endpoint.url, &payload, timeout)?;
        log::info!("HTTP: Response code {}", response.status);

        if SUCCESS_STATUSES.contains(&response.status) {
            if !response.body.is_empty() {
                log::info!("HTTP: Server response: {}", response.body);
            }
            return Ok(response.status);
        }

        if REDIRECT_STATUSES.contains(&response.status) {
            let location = match response.location.as_deref().map(str::trim) {
                Some(location) if !location.is_empty() => location.to_string(),
                _ => return Err(DeliveryError::RedirectWithoutLocation(response.status)),
            };
            log::info!("HTTP: Redirected to {}", location);

            let redirected = self.transport.post_json(&location, &payload, timeout)?;
            log::info!("HTTP: Redirect response code {}", redirected.status);
            // Any non-error answer ends the chase, including a second redirect
            return if redirected.status > 0 && redirected.status < 400 {
                Ok(redirected.status)
            } else {
                Err(DeliveryError::RedirectFailed {
                    status: redirected.status,
                    body: redirected.body,
                })
            };
        }

        if !response.body.is_empty() {
            log::warn!("HTTP: Server response: {}", response.body);
        }
        Err(DeliveryError::Status {
            status: response.status,
            body: response.body,
        })
    }

    /// Startup reachability check: any HTTP answer counts as reachable
    pub fn probe(&mut self) -> bool {
        if !self.transport.is_connected() {
            return false;
        }
        let timeout = Duration::from_millis(u64::from(self.config.probe_timeout_ms));
        match self.transport.get(&self.endpoint.url, timeout) {
            Ok(response) => response.status > 0,
            Err(e) => {
                log::warn!("HTTP: Endpoint probe failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::error::TransportError;
    use crate::delivery::transport::HttpResponse;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedTransport {
        offline: bool,
        replies: VecDeque<Result<HttpResponse, TransportError>>,
        posts: Vec<(String, String)>,
    }

    impl ScriptedTransport {
        fn replying(replies: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                replies: replies.into(),
                ..Default::default()
            }
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn is_connected(&self) -> bool {
            !self.offline
        }

        fn post_json(
            &mut self,
            url: &str,
            body: &str,
            _timeout: Duration,
        ) -> Result<HttpResponse, TransportError> {
            self.posts.push((url.to_string(), body.to_string()));
            self.replies
                .pop_front()
                .unwrap_or(Err(TransportError::Timeout))
        }

        fn get(&mut self, _url: &str, _timeout: Duration) -> Result<HttpResponse, TransportError> {
            self.replies
                .pop_front()
                .unwrap_or(Err(TransportError::Timeout))
        }
    }

    #[derive(Default)]
    struct RecordingDelay(Vec<u32>);

    impl Delay for RecordingDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.0.push(ms);
        }
    }

    fn client(transport: ScriptedTransport) -> DeliveryClient<ScriptedTransport, RecordingDelay> {
        let endpoint = EndpointConfig {
            url: "http://collector.test/api".into(),
            device_id: 1,
        };
        DeliveryClient::new(
            transport,
            RecordingDelay::default(),
            endpoint,
            DeliveryConfig::default(),
        )
    }

    #[test]
    fn accepts_each_success_status() {
        for status in [200, 201, 202] {
            let mut client = client(ScriptedTransport::replying(vec![Ok(HttpResponse::new(status))]));
            assert!(client.deliver(0.5, "2025-06-01T12:00:00"));
            assert_eq!(client.transport().posts.len(), 1);
            assert!(client.delay.0.is_empty());
        }
    }

    #[test]
    fn three_transport_failures_exhaust_budget() {
        let mut client = client(ScriptedTransport::replying(vec![
            Err(TransportError::Connect("refused".into())),
            Err(TransportError::Timeout),
            Err(TransportError::Io("reset".into())),
        ]));
        let mut reports = Vec::new();
        let delivered = client.deliver_with(0.5, "t", |r| reports.push(r.clone()));

        assert!(!delivered);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[2].attempt, 3);
        assert_eq!(client.delay.0, vec![2_000, 2_000]);
    }

    #[test]
    fn recovers_on_second_attempt() {
        let mut client = client(ScriptedTransport::replying(vec![
            Ok(HttpResponse::new(503).with_body("busy")),
            Ok(HttpResponse::new(201)),
        ]));
        assert!(client.deliver(0.5, "t"));
        assert_eq!(client.transport().posts.len(), 2);
        assert_eq!(client.delay.0, vec![2_000]);
    }

    #[test]
    fn follows_one_redirect_with_same_payload() {
        let mut client = client(ScriptedTransport::replying(vec![
            Ok(HttpResponse::new(301).with_location("https://collector.test/api/")),
            Ok(HttpResponse::new(200)),
        ]));
        assert!(client.deliver(0.007989, "2025-06-01T12:00:00"));

        let posts = &client.transport().posts;
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].0, "https://collector.test/api/");
        assert_eq!(posts[0].1, posts[1].1);
    }

    #[test]
    fn redirect_chain_is_not_chased() {
        let mut client = client(ScriptedTransport::replying(vec![
            Ok(HttpResponse::new(302).with_location("http://a.test/")),
            Ok(HttpResponse::new(307).with_location("http://b.test/")),
        ]));
        let reading = Reading::new(1, 0.5, "t");
        assert_eq!(client.attempt(&reading), Ok(307));
        assert_eq!(client.transport().posts.len(), 2);
    }

    #[test]
    fn redirect_without_location_fails_attempt() {
        let mut client = client(ScriptedTransport::replying(vec![Ok(HttpResponse::new(308))]));
        let reading = Reading::new(1, 0.5, "t");
        assert_eq!(
            client.attempt(&reading),
            Err(DeliveryError::RedirectWithoutLocation(308))
        );
    }

    #[test]
    fn redirect_target_error_fails_attempt() {
        let mut client = client(ScriptedTransport::replying(vec![
            Ok(HttpResponse::new(301).with_location("http://a.test/")),
            Ok(HttpResponse::new(404).with_body("missing")),
        ]));
        let reading = Reading::new(1, 0.5, "t");
        assert_eq!(
            client.attempt(&reading),
            Err(DeliveryError::RedirectFailed {
                status: 404,
                body: "missing".into()
            })
        );
    }

    #[test]
    fn other_statuses_fail_with_body_surfaced() {
        let mut client = client(ScriptedTransport::replying(vec![Ok(
            HttpResponse::new(204).with_body("")
        )]));
        let reading = Reading::new(1, 0.5, "t");
        assert!(matches!(
            client.attempt(&reading),
            Err(DeliveryError::Status { status: 204, .. })
        ));
    }

    #[test]
    fn offline_attempts_consume_budget_without_requests() {
        let transport = ScriptedTransport {
            offline: true,
            ..Default::default()
        };
        let mut client = client(transport);
        let mut errors = Vec::new();
        assert!(!client.deliver_with(0.5, "t", |r| errors.push(r.result.clone())));

        assert_eq!(errors, vec![Err(DeliveryError::NotConnected); 3]);
        assert!(client.transport().posts.is_empty());
    }

    #[test]
    fn probe_treats_any_status_as_reachable() {
        let mut reachable = client(ScriptedTransport::replying(vec![Ok(HttpResponse::new(405))]));
        assert!(reachable.probe());

        let mut unreachable =
            client(ScriptedTransport::replying(vec![Err(TransportError::Timeout)]));
        assert!(!unreachable.probe());
    }
}
