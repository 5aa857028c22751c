use crate::config::WifiConfig;
use anyhow::Result;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::info;
use std::net::Ipv4Addr;

// SAFETY: WifiManager wraps ESP-IDF WiFi which is thread-safe
unsafe impl Send for WifiManager {}
unsafe impl Sync for WifiManager {}

pub struct WifiManager {
    wifi: Box<BlockingWifi<EspWifi<'static>>>,
    ssid: heapless::String<32>,
}

impl WifiManager {
    /// Bring the station up and block until it has an address
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        config: &WifiConfig,
    ) -> Result<Self> {
        info!("🌐 WiFi: Creating EspWifi instance...");
        let mut esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;

        info!("🌐 WiFi: Configuring for SSID '{}'...", config.ssid);
        esp_wifi.set_configuration(&Self::client_configuration(config))?;

        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        info!("🌐 WiFi: Starting...");
        wifi.start()?;

        let mut manager = Self {
            wifi: Box::new(wifi),
            ssid: config.ssid.clone(),
        };
        manager.connect()?;
        Ok(manager)
    }

    fn client_configuration(config: &WifiConfig) -> Configuration {
        Configuration::Client(ClientConfiguration {
            ssid: config.ssid.clone(),
            auth_method: AuthMethod::WPA2Personal,
            password: config.password.clone(),
            ..Default::default()
        })
    }

    fn connect(&mut self) -> Result<()> {
        info!("🌐 WiFi: Connecting to '{}'...", self.ssid);
        self.wifi.connect()?;
        info!("🌐 WiFi: Waiting for network interface...");
        self.wifi.wait_netif_up()?;

        let ip_info = self.wifi.wifi().sta_netif().get_ip_info()?;
        info!("✅ WiFi: Connected, IP address: {}", ip_info.ip);
        Ok(())
    }

    /// Re-associate with the configured network after a drop
    pub fn reconnect(&mut self) -> Result<()> {
        info!("WiFi reconnect requested");
        if self.wifi.is_connected().unwrap_or(false) {
            let _ = self.wifi.disconnect();
        }
        self.connect()
    }

    pub fn is_connected(&self) -> Result<bool> {
        Ok(self.wifi.is_connected()?)
    }

    pub fn get_ip(&self) -> Result<Ipv4Addr> {
        let ip_info = self.wifi.wifi().sta_netif().get_ip_info()?;
        Ok(ip_info.ip)
    }
}
