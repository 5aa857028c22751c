#[cfg(target_os = "espidf")]
use esp32_flow_meter::{
    cli::UartPort,
    delivery::EspHttpTransport,
    flow::PulseInput,
    AppConfig, BootClock, DeliveryClient, FlowMonitor, FlowTracker, LocalClock, PulseDebouncer,
    Terminal, ThreadDelay, WallClock, WifiManager,
};
#[cfg(target_os = "espidf")]
use esp_idf_hal::delay::FreeRtos;
#[cfg(target_os = "espidf")]
use esp_idf_hal::gpio::AnyInputPin;
#[cfg(target_os = "espidf")]
use esp_idf_hal::peripherals::Peripherals;
#[cfg(target_os = "espidf")]
use esp_idf_hal::uart::{config::Config as UartConfig, UartDriver};
#[cfg(target_os = "espidf")]
use esp_idf_svc::eventloop::EspSystemEventLoop;
#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::EspDefaultNvsPartition;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys;
#[cfg(target_os = "espidf")]
use std::sync::{Arc, Mutex};

/// Shared with the sensor interrupt for the whole program lifetime
#[cfg(target_os = "espidf")]
static DEBOUNCER: PulseDebouncer = PulseDebouncer::new(5_000);

#[cfg(target_os = "espidf")]
const NTP_SYNC_ATTEMPTS: u32 = 20;
#[cfg(target_os = "espidf")]
const NTP_SYNC_DELAY_MS: u32 = 500;
/// Poll ticks between Wi-Fi link checks (~30 s at the default cadence)
#[cfg(target_os = "espidf")]
const WIFI_CHECK_TICKS: u32 = 300;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF system services
    sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("ESP32 Flow Meter");
    log::info!("Initializing...");

    let config = AppConfig::default();
    config.validate()?;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // Initialize UART0 for the operator console (USB-C connection)
    let uart_config = UartConfig::new().baudrate(115200.into());
    let mut uart = UartDriver::new(
        peripherals.uart0,
        peripherals.pins.gpio1, // TX (U0TXD)
        peripherals.pins.gpio3, // RX (U0RXD)
        Option::<esp_idf_hal::gpio::Gpio0>::None,
        Option::<esp_idf_hal::gpio::Gpio0>::None,
        &uart_config,
    )?;
    let (uart_tx, uart_rx) = uart.split();
    let mut terminal = Terminal::new(UartPort::new(uart_tx, uart_rx));
    log::info!("✅ UART0 initialized (115200 baud)");

    // Arm the sensor interrupt before anything slow so no pulse is missed
    DEBOUNCER.set_window_us(config.flow.debounce_window_us);
    // SAFETY: the sensor GPIO is not claimed by any other driver in this
    // firmware; UART0 uses GPIO1/GPIO3.
    let sensor_pin = unsafe { AnyInputPin::new(config.flow.sensor_pin) };
    let _pulse_input = PulseInput::attach(sensor_pin, &DEBOUNCER)?;

    let _ = terminal.write_line("");
    let _ = terminal.write_line("Starting WiFi connection...");
    let wifi = WifiManager::new(peripherals.modem, sysloop, nvs, &config.wifi)?;
    if let Ok(ip) = wifi.get_ip() {
        let _ = terminal.write_line(&format!("WiFi connected, IP: {}", ip));
    }
    let wifi = Arc::new(Mutex::new(wifi));

    let _ = terminal.write_line("Configuring time server...");
    let mut sntp_conf = SntpConf::default();
    sntp_conf.servers[0] = config.time.ntp_server.as_str();
    let sntp = EspSntp::new(&sntp_conf)?;
    let wall_clock = LocalClock::new(&config.time);
    wait_for_time_sync(&sntp, &wall_clock, &mut terminal);

    let transport = EspHttpTransport::new(Arc::clone(&wifi));
    let mut delivery = DeliveryClient::new(
        transport,
        ThreadDelay,
        config.endpoint.clone(),
        config.delivery.clone(),
    );

    let _ = terminal.write_line("Checking API server...");
    if delivery.probe() {
        log::info!("✅ API server reachable");
        let _ = terminal.write_line("API server reachable!");
    } else {
        log::warn!("❌ API server not reachable");
        let _ = terminal.write_line("WARNING: Could not reach the API server.");
        let _ = terminal.write_line("Monitoring will continue, but deliveries may fail.");
    }

    let tracker = FlowTracker::new(&config.flow);
    let mut monitor = FlowMonitor::new(
        &DEBOUNCER,
        tracker,
        delivery,
        BootClock,
        wall_clock,
        &config.time.fallback_timestamp,
    );

    let _ = terminal.write_line("Flow monitoring started!");
    let _ = terminal.write_line("Waiting for flow detection...");
    log::info!("Entering polling loop...");

    let mut ticks: u32 = 0;
    loop {
        let input = match terminal.poll_line() {
            Ok(line) => line,
            Err(_) => {
                log::warn!("Terminal input error");
                None
            }
        };

        for event in monitor.tick(input.as_deref()) {
            let _ = terminal.write_line(&event.to_string());
            if event.wants_prompt() {
                let _ = terminal.print_prompt();
            }
        }

        ticks = ticks.wrapping_add(1);
        if ticks % WIFI_CHECK_TICKS == 0 {
            check_wifi(&wifi);
        }

        FreeRtos::delay_ms(config.flow.poll_interval_ms);
    }
}

#[cfg(target_os = "espidf")]
fn wait_for_time_sync(
    sntp: &EspSntp<'_>,
    clock: &LocalClock,
    terminal: &mut Terminal<UartPort<'_>>,
) {
    for _ in 0..NTP_SYNC_ATTEMPTS {
        if sntp.get_sync_status() == SyncStatus::Completed && clock.is_synced() {
            if let Some(now) = clock.local_timestamp() {
                log::info!("✅ NTP synchronized: {}", now);
                let _ = terminal.write_line(&format!("Current date and time: {}", now));
            }
            return;
        }
        let _ = terminal.write_line("Waiting for NTP synchronization...");
        FreeRtos::delay_ms(NTP_SYNC_DELAY_MS);
    }
    log::warn!("❌ NTP synchronization failed, readings use the fallback timestamp");
    let _ = terminal.write_line("Failed to synchronize with NTP!");
}

#[cfg(target_os = "espidf")]
fn check_wifi(wifi: &Arc<Mutex<WifiManager>>) {
    let Ok(mut wifi) = wifi.lock() else {
        log::warn!("WiFi manager lock error");
        return;
    };
    if wifi.is_connected().unwrap_or(false) {
        return;
    }
    log::warn!("WiFi link down, reconnecting...");
    if let Err(e) = wifi.reconnect() {
        log::warn!("❌ WiFi reconnect failed: {:?}", e);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("flow_app is ESP32 firmware; build it for an ESP-IDF target.");
    std::process::exit(1);
}
