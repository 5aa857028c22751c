use super::{CliError, ConsolePort};
use esp_idf_hal::uart::{UartRxDriver, UartTxDriver};

/// Operator console over UART0 (USB-C)
pub struct UartPort<'d> {
    pub uart_tx: UartTxDriver<'d>,
    pub uart_rx: UartRxDriver<'d>,
}

impl<'d> UartPort<'d> {
    pub fn new(uart_tx: UartTxDriver<'d>, uart_rx: UartRxDriver<'d>) -> Self {
        Self { uart_tx, uart_rx }
    }
}

impl ConsolePort for UartPort<'_> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), CliError> {
        self.uart_tx.write(bytes).map_err(|_| CliError::UartError)?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, CliError> {
        let mut buf = [0u8; 1];
        match self.uart_rx.read(&mut buf, 0) {
            Ok(1) => Ok(Some(buf[0])),
            Ok(_) => Ok(None),
            Err(_) => Err(CliError::UartError),
        }
    }
}
