use super::debounce::PulseDebouncer;
use crate::clock::millis_from_micros;
use core::ffi::c_void;
use esp_idf_hal::gpio::{AnyInputPin, Input, InterruptType, Pin, PinDriver, Pull};
use esp_idf_sys::{self as sys, esp, EspError};

/// Flow sensor input with a rising-edge interrupt feeding a debouncer.
///
/// The handler is registered directly with the GPIO ISR service instead of
/// `PinDriver::subscribe`, which disarms the interrupt after every edge and
/// would drop pulses between polls.
pub struct PulseInput {
    _pin: PinDriver<'static, AnyInputPin, Input>,
    gpio: i32,
}

impl PulseInput {
    pub fn attach(pin: AnyInputPin, debouncer: &'static PulseDebouncer) -> Result<Self, EspError> {
        let gpio = pin.pin();
        let mut driver = PinDriver::input(pin)?;
        driver.set_pull(Pull::Floating)?;
        driver.set_interrupt_type(InterruptType::PosEdge)?;

        // SAFETY: the handler only touches the debouncer's atomics, and the
        // debouncer is 'static so the context pointer never dangles.
        unsafe {
            let err = sys::gpio_install_isr_service(0);
            // Already installed by another driver is fine
            if err != sys::ESP_ERR_INVALID_STATE as sys::esp_err_t {
                esp!(err)?;
            }
            esp!(sys::gpio_isr_handler_add(
                gpio,
                Some(on_sensor_edge),
                debouncer as *const PulseDebouncer as *mut c_void,
            ))?;
            esp!(sys::gpio_intr_enable(gpio))?;
        }

        log::info!("✅ Flow sensor interrupt armed on GPIO{}", gpio);
        Ok(Self { _pin: driver, gpio })
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}

impl Drop for PulseInput {
    fn drop(&mut self) {
        unsafe {
            sys::gpio_isr_handler_remove(self.gpio);
        }
    }
}

unsafe extern "C" fn on_sensor_edge(arg: *mut c_void) {
    let debouncer = &*(arg as *const PulseDebouncer);
    // Same origin as BootClock, which the poller measures the timeout with
    let now_us = sys::esp_timer_get_time();
    debouncer.on_edge(now_us as u32, millis_from_micros(now_us));
}
