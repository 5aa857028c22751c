use super::error::{DeliveryError, DeliveryResult};
use serde::Serialize;
use serde_json::value::RawValue;

/// Wire shape accepted by the collection endpoint
#[derive(Debug, Serialize)]
struct ReadingPayload<'a> {
    id_device_vinc: u32,
    /// Pre-rendered with six decimals
    consumo_pontos: Box<RawValue>,
    datetime: &'a str,
}

/// A session total waiting to be delivered
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device_id: u32,
    pub volume_m3: f64,
    pub timestamp: String,
}

impl Reading {
    pub fn new(device_id: u32, volume_m3: f64, timestamp: &str) -> Self {
        Self {
            device_id,
            volume_m3,
            timestamp: timestamp.to_string(),
        }
    }

    pub fn to_json(&self) -> DeliveryResult<String> {
        if !self.volume_m3.is_finite() {
            return Err(DeliveryError::Payload(format!(
                "volume is not a number: {}",
                self.volume_m3
            )));
        }
        let volume = RawValue::from_string(format!("{:.6}", self.volume_m3))
            .map_err(|e| DeliveryError::Payload(e.to_string()))?;
        let payload = ReadingPayload {
            id_device_vinc: self.device_id,
            consumo_pontos: volume,
            datetime: &self.timestamp,
        };
        serde_json::to_string(&payload).map_err(|e| DeliveryError::Payload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fixed_shape_with_six_decimals() {
        let reading = Reading::new(1, 0.007989, "2025-06-01T12:04:05");
        assert_eq!(
            reading.to_json().unwrap(),
            r#"{"id_device_vinc":1,"consumo_pontos":0.007989,"datetime":"2025-06-01T12:04:05"}"#
        );
    }

    #[test]
    fn pads_and_rounds_volume() {
        let json = Reading::new(7, 1.5, "t").to_json().unwrap();
        assert!(json.contains(r#""consumo_pontos":1.500000"#));

        let json = Reading::new(7, 0.123_456_789, "t").to_json().unwrap();
        assert!(json.contains(r#""consumo_pontos":0.123457"#));
    }

    #[test]
    fn payload_parses_back_as_json() {
        let json = Reading::new(3, 2.25, "2025-05-21T12:00:00").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["id_device_vinc"], 3);
        assert_eq!(value["consumo_pontos"].as_f64(), Some(2.25));
        assert_eq!(value["datetime"], "2025-05-21T12:00:00");
    }

    #[test]
    fn rejects_non_finite_volume() {
        assert!(matches!(
            Reading::new(1, f64::INFINITY, "t").to_json(),
            Err(DeliveryError::Payload(_))
        ));
    }
}
