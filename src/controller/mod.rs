//! Remote hand-controller over the serial link
//!
//! 1. [`link`] - Handshake, parameter pushes and `DATA` ingestion
//! 2. [`controller_handle`] - Background drain task and shared access
//!
//! # Architecture
//!
//! ```text
//! UART ──► CommandChannel ──► ControllerLink ──► watch<LinkStatus>
//!                                   ▲                  │
//!                     SET_CTRL_PARAMS / ENAB_CTRL      ▼
//!                                              ControllerStatus (fresh only)
//! ```

pub mod controller_handle;
pub mod link;

pub use controller_handle::ControllerHandle;
pub use link::{ControllerLink, ControllerStatus, LinkError, LinkParams};

/// Anything the game task can read controller input from
pub trait InputSource: Send + Sync + 'static {
    /// Fresh input, or `None` when the controller is stale or disabled.
    fn status(&self) -> Option<ControllerStatus>;
}

impl InputSource for ControllerHandle {
    fn status(&self) -> Option<ControllerStatus> {
        ControllerHandle::status(self)
    }
}
