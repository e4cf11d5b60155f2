//! Host side of the remote hand-controller protocol
//!
//! The link starts in [`Connecting`]. [`ControllerLink::begin`] runs a bounded
//! handshake and, once the peer has streamed a `DATA` line, yields a
//! [`ControllerLink<Linked>`]. There is no partially-linked state: a failed
//! handshake consumes the link.
//!
//! ```text
//! Connecting ──begin()──► Linked ──run()──► (drain serial, store status)
//!      │
//!      └──► LinkError::HandshakeFailed
//! ```
//!
//! Status is published through a `watch` channel. The run loop is the only
//! writer; [`ControllerLink::status`] copies the whole snapshot under one
//! borrow so readers never see x, y and the button from different updates.

use crate::serial::{ChannelError, CommandChannel, OutboundMessage, PayloadReader, SerialCommand};
use statum::{machine, state};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Command name of the peer's input report.
pub const DATA_COMMAND: &str = "DATA";

/// Handshake attempts before [`ControllerLink::begin`] gives up.
pub const HANDSHAKE_ATTEMPTS: u32 = 10;

/// Parameters pushed to the peer
///
/// Sent as `SET_CTRL_PARAMS` during the handshake and again whenever one of
/// them changes. Out-of-range values are corrected before they are sent:
/// `max_angle` is clamped to [0, 1] and an update rate of 0 becomes 1.
///
/// # Performance Impact
///
/// - `update_rate_ms`: Sets the staleness window (two periods) and the drain
///   loop pause (a sixteenth of a period). Short periods make the maze more
///   responsive but keep the UART and the drain loop busier
/// - `max_angle`: Scales the tilt the peer reports; lower values give finer
///   control over a smaller range
///
/// # Examples
///
/// ```rust
/// use mazetilt::controller::LinkParams;
///
/// // Gentle tilt, faster reports
/// let params = LinkParams {
///     max_angle: 0.6,
///     update_rate_ms: 50,
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkParams {
    /// Maximum tilt the peer reports, as a fraction in [0, 1]
    pub max_angle: f32,

    /// Interval between the peer's `DATA` reports
    ///
    /// Input older than two intervals is treated as absent.
    pub update_rate_ms: u16,
}

impl Default for LinkParams {
    /// Full tilt range at 10 reports per second
    fn default() -> Self {
        Self {
            max_angle: 1.0,
            update_rate_ms: 100,
        }
    }
}

impl LinkParams {
    fn sanitized(self) -> Self {
        let max_angle = if self.max_angle.is_nan() {
            warn!("max_angle is NaN, using 1.0");
            1.0
        } else {
            self.max_angle.clamp(0.0, 1.0)
        };
        if max_angle != self.max_angle && !self.max_angle.is_nan() {
            warn!("max_angle {} clamped to {}", self.max_angle, max_angle);
        }
        let update_rate_ms = if self.update_rate_ms == 0 {
            warn!("update_rate_ms of 0 is not usable, using 1");
            1
        } else {
            self.update_rate_ms
        };
        Self {
            max_angle,
            update_rate_ms,
        }
    }
}

/// Last input report received from the peer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinkStatus {
    pub x: f32,
    pub y: f32,
    pub button_pressed: bool,
    pub last_update: Option<Instant>,
}

/// Fresh controller input handed out by [`ControllerLink::status`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerStatus {
    pub x: f32,
    pub y: f32,
    pub button_pressed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Controller did not answer after {attempts} handshake attempts")]
    HandshakeFailed { attempts: u32 },
}

#[state]
#[derive(Debug, Clone)]
pub enum LinkState {
    Connecting,
    Linked,
}

#[machine]
pub struct ControllerLink<S: LinkState> {
    // Serial channel, shared by the drain loop and parameter pushes
    channel: Mutex<CommandChannel>,

    // Parameters as last pushed to the peer
    params: watch::Sender<LinkParams>,

    // Latest input report; written only by the ingestion path
    status: watch::Sender<LinkStatus>,

    // Administrative enable flag
    enabled: AtomicBool,
}

// Methods available in every state
impl<S: LinkState> ControllerLink<S> {
    pub fn params(&self) -> LinkParams {
        *self.params.borrow()
    }

    pub fn max_angle(&self) -> f32 {
        self.params().max_angle
    }

    pub fn update_rate_ms(&self) -> u16 {
        self.params().update_rate_ms
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Subscribe to raw status snapshots, including stale ones.
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status.subscribe()
    }

    async fn push_params(&self) -> Result<(), LinkError> {
        let params = self.params();
        let mut channel = self.channel.lock().await;
        channel.send(OutboundMessage::ControllerParams {
            max_angle: params.max_angle,
            update_rate_ms: params.update_rate_ms,
        })?;
        Ok(())
    }

    async fn push_enabled(&self, enabled: bool) -> Result<(), LinkError> {
        let mut channel = self.channel.lock().await;
        channel.send(OutboundMessage::ControllerEnabled(enabled))?;
        Ok(())
    }

    // Applies one command; true when it refreshed the status
    fn ingest(&self, command: &SerialCommand) -> bool {
        if command.name != DATA_COMMAND {
            warn!("Unknown command received: {}", command.name);
            return false;
        }

        let mut reader = PayloadReader::new(&command.payload);
        match (reader.next_f32(), reader.next_f32(), reader.next_bool()) {
            (Some(x), Some(y), Some(button_pressed)) => {
                let now = Instant::now();
                self.status.send_modify(|status| {
                    status.x = x;
                    status.y = y;
                    status.button_pressed = button_pressed;
                    status.last_update = Some(now);
                });
                trace!("Controller x={:.3} y={:.3} button={}", x, y, button_pressed);
                true
            }
            (x, y, button) => {
                warn!(
                    "Invalid DATA command format: {:?} (x valid: {}, y valid: {}, button valid: {})",
                    command.payload,
                    x.is_some(),
                    y.is_some(),
                    button.is_some()
                );
                false
            }
        }
    }
}

impl ControllerLink<Connecting> {
    pub fn create(channel: CommandChannel, params: LinkParams) -> Self {
        let params = params.sanitized();
        debug!("Creating controller link with {:?}", params);

        let (params_sender, _) = watch::channel(params);
        let (status_sender, _) = watch::channel(LinkStatus::default());

        Self::new(
            Mutex::new(channel),
            params_sender,
            status_sender,
            AtomicBool::new(false),
        )
    }

    /// Handshake with the peer.
    ///
    /// Each attempt pushes the parameters and the enabled flag, waits two
    /// update periods and drains the channel looking for a `DATA` line.
    pub async fn begin(self) -> Result<ControllerLink<Linked>, LinkError> {
        self.enabled.store(true, Ordering::Release);
        let wait = Duration::from_millis(2 * u64::from(self.update_rate_ms()));
        info!(
            "Starting controller handshake ({} attempts, {:?} apart)",
            HANDSHAKE_ATTEMPTS, wait
        );

        for attempt in 1..=HANDSHAKE_ATTEMPTS {
            self.push_params().await?;
            self.push_enabled(true).await?;
            sleep(wait).await;

            if self.saw_data().await? {
                info!("Controller answered on attempt {}", attempt);
                self.push_params().await?;
                self.push_enabled(true).await?;
                return Ok(self.transition());
            }
            debug!("Handshake attempt {} got no DATA", attempt);
        }

        self.enabled.store(false, Ordering::Release);
        error!(
            "Controller handshake failed after {} attempts",
            HANDSHAKE_ATTEMPTS
        );
        Err(LinkError::HandshakeFailed {
            attempts: HANDSHAKE_ATTEMPTS,
        })
    }

    async fn saw_data(&self) -> Result<bool, LinkError> {
        let mut channel = self.channel.lock().await;
        loop {
            match channel.read_command() {
                Ok(Some(command)) if command.name == DATA_COMMAND => {
                    self.ingest(&command);
                    return Ok(true);
                }
                Ok(Some(command)) => {
                    debug!("Ignoring {} during handshake", command.name);
                }
                Ok(None) | Err(ChannelError::Overflow { .. }) => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl ControllerLink<Linked> {
    /// Latest input, or `None` when disabled or when the peer has been
    /// silent for more than two update periods.
    pub fn status(&self) -> Option<ControllerStatus> {
        if !self.is_enabled() {
            return None;
        }

        let window = Duration::from_millis(2 * u64::from(self.update_rate_ms()));
        let snapshot = *self.status.borrow();
        let last_update = snapshot.last_update?;
        if Instant::now().saturating_duration_since(last_update) > window {
            return None;
        }

        Some(ControllerStatus {
            x: snapshot.x,
            y: snapshot.y,
            button_pressed: snapshot.button_pressed,
        })
    }

    pub async fn set_max_angle(&self, max_angle: f32) -> Result<(), LinkError> {
        let params = LinkParams {
            max_angle,
            ..self.params()
        }
        .sanitized();
        self.params.send_replace(params);
        info!("Controller max angle set to {:.3}", params.max_angle);
        self.push_params().await
    }

    pub async fn set_update_rate(&self, update_rate_ms: u16) -> Result<(), LinkError> {
        let params = LinkParams {
            update_rate_ms,
            ..self.params()
        }
        .sanitized();
        self.params.send_replace(params);
        info!("Controller update rate set to {}ms", params.update_rate_ms);
        self.push_params().await
    }

    /// The peer is told before the local flag changes.
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), LinkError> {
        self.push_enabled(enabled).await?;
        self.enabled.store(enabled, Ordering::Release);
        info!("Controller {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// One drain pass over the channel. Returns the number of `DATA`
    /// reports applied.
    pub async fn poll(&self) -> Result<usize, LinkError> {
        let mut channel = self.channel.lock().await;
        let mut applied = 0;
        loop {
            match channel.read_command() {
                Ok(Some(command)) => {
                    if self.ingest(&command) {
                        applied += 1;
                    }
                }
                Ok(None) | Err(ChannelError::Overflow { .. }) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(applied)
    }

    /// Drains the channel forever, pausing a sixteenth of the update period
    /// between passes.
    pub async fn run(&self) {
        info!("Starting controller link loop");
        loop {
            if let Err(e) = self.poll().await {
                error!("Controller link poll failed: {}", e);
            }

            let pause = u64::from(self.update_rate_ms() >> 4).max(1);
            sleep(Duration::from_millis(pause)).await;
        }
    }
}
