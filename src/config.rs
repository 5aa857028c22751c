use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiConfig {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Collection endpoint receiving the JSON POST
    pub url: String,

    /// Static device identifier sent as `id_device_vinc`
    pub device_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    pub ntp_server: String,

    /// Local time offset from UTC (seconds, negative west of Greenwich)
    pub gmt_offset_secs: i32,

    pub daylight_offset_secs: i32,

    /// Timestamp reported while the wall clock has not been synchronized
    pub fallback_timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// GPIO number the sensor output is wired to
    pub sensor_pin: i32,

    /// Sensor-specific liters-per-pulse factor
    pub calibration_constant: f64,

    /// Sample period used in the volume conversion (ms)
    pub sample_interval_ms: u32,

    /// Minimum spacing between accepted edges (us)
    pub debounce_window_us: u32,

    /// Silence after the last accepted pulse that ends a session (ms)
    pub inactivity_timeout_ms: u32,

    /// Polling loop cadence (ms)
    pub poll_interval_ms: u32,

    /// Operator code that authorizes the next delivery
    pub authorization_code: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub max_attempts: u32,

    /// Pause between failed attempts (ms)
    pub retry_delay_ms: u32,

    pub request_timeout_ms: u32,

    /// Timeout for the startup reachability check (ms)
    pub probe_timeout_ms: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub wifi: WifiConfig,
    pub endpoint: EndpointConfig,
    pub time: TimeConfig,
    pub flow: FlowConfig,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    EmptyEndpoint,
    InvalidCalibration,
    ZeroSampleInterval,
    ZeroAttempts,
    ZeroPollInterval,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::EmptyEndpoint => write!(f, "Endpoint URL is empty"),
            ConfigError::InvalidCalibration => {
                write!(f, "Calibration constant must be a positive finite number")
            }
            ConfigError::ZeroSampleInterval => write!(f, "Sample interval must be non-zero"),
            ConfigError::ZeroAttempts => write!(f, "At least one delivery attempt is required"),
            ConfigError::ZeroPollInterval => write!(f, "Poll interval must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.url.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        let k = self.flow.calibration_constant;
        if !k.is_finite() || k <= 0.0 {
            return Err(ConfigError::InvalidCalibration);
        }
        if self.flow.sample_interval_ms == 0 {
            return Err(ConfigError::ZeroSampleInterval);
        }
        if self.flow.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.delivery.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        let mut ssid = heapless::String::new();
        let mut password = heapless::String::new();
        let _ = ssid.push_str(option_env!("WIFI_SSID").unwrap_or("YOUR_SSID"));
        let _ = password.push_str(option_env!("WIFI_PASS").unwrap_or("YOUR_PASSWORD"));

        Self { ssid, password }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: option_env!("FLOW_ENDPOINT_URL")
                .unwrap_or("http://collector.local/api/consumo")
                .into(),
            device_id: 1,
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            ntp_server: "pool.ntp.org".into(),
            gmt_offset_secs: -3 * 3600,
            daylight_offset_secs: 0,
            fallback_timestamp: "2025-05-21T12:00:00".into(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            sensor_pin: 13,
            calibration_constant: 2.663,
            sample_interval_ms: 30,
            debounce_window_us: 5_000,
            inactivity_timeout_ms: 2_000,
            poll_interval_ms: 100,
            authorization_code: 1234,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2_000,
            request_timeout_ms: 15_000,
            probe_timeout_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployed_firmware() {
        let config = AppConfig::default();
        assert_eq!(config.flow.authorization_code, 1234);
        assert_eq!(config.flow.debounce_window_us, 5_000);
        assert_eq!(config.flow.inactivity_timeout_ms, 2_000);
        assert_eq!(config.delivery.max_attempts, 3);
        assert_eq!(config.delivery.request_timeout_ms, 15_000);
        assert_eq!(config.endpoint.device_id, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unusable_values() {
        let mut config = AppConfig::default();
        config.endpoint.url = "  ".into();
        assert_eq!(config.validate(), Err(ConfigError::EmptyEndpoint));

        let mut config = AppConfig::default();
        config.flow.calibration_constant = f64::NAN;
        assert_eq!(config.validate(), Err(ConfigError::InvalidCalibration));

        let mut config = AppConfig::default();
        config.delivery.max_attempts = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroAttempts));
    }

    #[test]
    fn round_trips_through_json() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.wifi.ssid, config.wifi.ssid);
        assert_eq!(parsed.flow.sample_interval_ms, 30);
    }
}
