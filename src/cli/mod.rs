pub mod parser;
pub mod terminal;
#[cfg(target_os = "espidf")]
pub mod uart;

pub use parser::CodeParser;
pub use terminal::Terminal;
#[cfg(target_os = "espidf")]
pub use uart::UartPort;

pub const CLI_BUFFER_SIZE: usize = 128;

/// Byte-level console link the operator terminal runs over
pub trait ConsolePort {
    fn write(&mut self, bytes: &[u8]) -> Result<(), CliError>;

    /// Next received byte, or `None` when nothing is waiting
    fn read_byte(&mut self) -> Result<Option<u8>, CliError>;
}

#[derive(Debug)]
pub enum CliError {
    UartError,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CliError::UartError => write!(f, "UART error"),
        }
    }
}

impl std::error::Error for CliError {}
