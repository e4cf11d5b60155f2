//! Serial line protocol shared with the remote hand controller
//!
//! The link carries newline-terminated `NAME:payload` lines in both directions:
//!
//! 1. [`port`] - Byte transport (UART backend and the [`port::SerialPort`] seam)
//! 2. [`channel`] - Line framing into [`channel::SerialCommand`]s
//! 3. [`reader`] - Typed field access over a command payload
//!
//! # Wire format
//!
//! ```text
//! main ──► peer   SET_CTRL_PARAMS:<max_angle %.3f>##<update_rate_ms>\n
//!                 ENAB_CTRL:<0|1>\n
//! peer ──► main   DATA:<x>##<y>##<button>\n
//! ```
//!
//! Payload fields are separated by a literal `##`; nothing is escaped.

pub mod channel;
#[cfg(test)]
pub mod memory;
pub mod port;
pub mod reader;

pub use channel::{ChannelError, CommandChannel, OutboundMessage, SerialCommand};
pub use port::{SerialPort, UartPort};
pub use reader::PayloadReader;

/// Separator between payload fields.
pub const FIELD_DELIMITER: &str = "##";

/// Separator between a command name and its payload.
pub const NAME_DELIMITER: char = ':';
