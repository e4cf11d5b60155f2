use crate::hardware::HardwareError;
use rppal::uart::{Parity, Uart};
use std::io;
use std::time::Duration;
use tracing::{debug, info};

/// Byte transport underneath the command channel
///
/// Implementations must never block in [`SerialPort::read_available`]; the
/// controller link polls it from a loop that also has to stay responsive to
/// parameter writes.
pub trait SerialPort: Send + 'static {
    /// Copies whatever bytes are pending into `buf` and returns the count.
    /// Returns `Ok(0)` when nothing is pending.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes one line. The implementation appends the trailing newline.
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// UART-backed serial port on the Raspberry Pi
pub struct UartPort {
    uart: Uart,
}

impl UartPort {
    /// Opens `device` (e.g. `/dev/serial0`) at `baud_rate`, 8N1, with a
    /// non-blocking read mode.
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, HardwareError> {
        info!("Opening UART {} at {} baud", device, baud_rate);
        let mut uart = Uart::with_path(device, baud_rate, Parity::None, 8, 1)?;

        // min_length 0 + zero timeout: read returns immediately with what is buffered
        uart.set_read_mode(0, Duration::ZERO)?;
        uart.set_write_mode(true)?;
        debug!("UART {} configured for non-blocking reads", device);

        Ok(Self { uart })
    }
}

impl SerialPort for UartPort {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.uart.read(buf).map_err(to_io_error)
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        let mut written = 0;
        while written < bytes.len() {
            written += self.uart.write(&bytes[written..]).map_err(to_io_error)?;
        }
        Ok(())
    }
}

fn to_io_error(e: rppal::uart::Error) -> io::Error {
    match e {
        rppal::uart::Error::Io(e) => e,
        other => io::Error::other(other.to_string()),
    }
}
