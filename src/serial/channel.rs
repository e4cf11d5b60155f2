//! Line framing for the serial command protocol
//!
//! Bytes are accumulated until a newline arrives. Each complete line is split
//! at its first `:` into a command name and a payload. A single call to
//! [`CommandChannel::read_command`] yields at most one command, so callers
//! that want to drain a backlog keep calling until it returns `Ok(None)`.

use super::port::SerialPort;
use super::{FIELD_DELIMITER, NAME_DELIMITER};
use std::fmt;
use std::io;
use tracing::{debug, warn};

/// Default cap on bytes held while waiting for a newline.
pub const DEFAULT_MAX_LINE_BYTES: usize = 256;

const READ_CHUNK: usize = 64;

/// One parsed `NAME:payload` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialCommand {
    pub name: String,
    pub payload: String,
}

impl SerialCommand {
    /// Splits a raw line at its first colon. Returns `None` when the colon is
    /// missing, leads the line or ends it.
    pub fn parse(line: &str) -> Option<Self> {
        let colon = line.find(NAME_DELIMITER)?;
        if colon == 0 || colon + NAME_DELIMITER.len_utf8() >= line.len() {
            return None;
        }

        Some(Self {
            name: line[..colon].to_string(),
            payload: line[colon + NAME_DELIMITER.len_utf8()..].to_string(),
        })
    }
}

/// Messages sent from the main board to the peer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutboundMessage {
    ControllerParams { max_angle: f32, update_rate_ms: u16 },
    ControllerEnabled(bool),
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundMessage::ControllerParams {
                max_angle,
                update_rate_ms,
            } => write!(
                f,
                "SET_CTRL_PARAMS:{:.3}{}{}",
                max_angle, FIELD_DELIMITER, update_rate_ms
            ),
            OutboundMessage::ControllerEnabled(enabled) => {
                write!(f, "ENAB_CTRL:{}", u8::from(*enabled))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Serial I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Receive buffer overflow: {len} bytes without newline (limit {limit})")]
    Overflow { len: usize, limit: usize },
}

/// Non-blocking command reader/writer over a [`SerialPort`]
pub struct CommandChannel {
    port: Box<dyn SerialPort>,
    receive_buffer: Vec<u8>,
    max_line_bytes: usize,
}

impl CommandChannel {
    pub fn new(port: Box<dyn SerialPort>, max_line_bytes: usize) -> Self {
        Self {
            port,
            receive_buffer: Vec::with_capacity(max_line_bytes),
            max_line_bytes,
        }
    }

    /// Number of bytes waiting for a newline.
    pub fn pending_bytes(&self) -> usize {
        self.receive_buffer.len()
    }

    /// Drains the port and extracts at most one complete line.
    ///
    /// `Ok(None)` means either that no complete line is buffered or that the
    /// extracted line was malformed; a malformed line is logged and consumed.
    /// When the buffer outgrows `max_line_bytes` without a newline it is
    /// discarded and [`ChannelError::Overflow`] is returned.
    pub fn read_command(&mut self) -> Result<Option<SerialCommand>, ChannelError> {
        self.fill_buffer()?;

        let Some(newline) = self.receive_buffer.iter().position(|&b| b == b'\n') else {
            if self.receive_buffer.len() > self.max_line_bytes {
                let len = self.receive_buffer.len();
                self.receive_buffer.clear();
                warn!(
                    "Discarding {} buffered bytes without newline (limit {})",
                    len, self.max_line_bytes
                );
                return Err(ChannelError::Overflow {
                    len,
                    limit: self.max_line_bytes,
                });
            }
            return Ok(None);
        };

        let raw: Vec<u8> = self.receive_buffer.drain(..=newline).collect();
        let line = String::from_utf8_lossy(&raw[..newline]);
        let line = line.trim_end_matches('\r');

        match SerialCommand::parse(line) {
            Some(command) => {
                debug!("Received command {} ({})", command.name, command.payload);
                Ok(Some(command))
            }
            None => {
                warn!("Invalid command format received: {:?}", line);
                Ok(None)
            }
        }
    }

    pub fn send(&mut self, message: OutboundMessage) -> Result<(), ChannelError> {
        let line = message.to_string();
        debug!("Sending {}", line);
        self.port.write_line(&line)?;
        Ok(())
    }

    fn fill_buffer(&mut self) -> Result<(), ChannelError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.port.read_available(&mut chunk)?;
            if n == 0 {
                return Ok(());
            }
            self.receive_buffer.extend_from_slice(&chunk[..n]);
        }
    }
}
