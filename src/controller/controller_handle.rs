//! Controller Handle - task wrapper around the linked controller
//!
//! Runs the handshake, then moves the link into an `Arc` and spawns its
//! drain loop as a tokio task. Clones of the handle are what the game task
//! and anything else that needs controller input hold on to.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::link::{ControllerLink, ControllerStatus, LinkError, LinkParams, Linked};
use crate::serial::CommandChannel;

#[derive(Clone)]
pub struct ControllerHandle {
    link: Arc<ControllerLink<Linked>>,
    task: Arc<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Handshakes with the peer over `channel` and starts the drain loop.
    ///
    /// # Errors
    ///
    /// [`LinkError::HandshakeFailed`] when the peer never sends `DATA`
    /// within the retry budget. Callers treat this as fatal at boot.
    pub async fn connect(channel: CommandChannel, params: LinkParams) -> Result<Self, LinkError> {
        info!("Connecting to hand controller with {:?}", params);
        let link = ControllerLink::create(channel, params).begin().await?;
        Ok(Self::spawn(link))
    }

    /// Spawns the drain loop for an already linked controller.
    pub fn spawn(link: ControllerLink<Linked>) -> Self {
        let link = Arc::new(link);
        let task_link = link.clone();
        let task = tokio::spawn(async move {
            task_link.run().await;
        });
        debug!("Controller link task spawned: {:?}", task);
        info!("Controller link running");

        Self {
            link,
            task: Arc::new(task),
        }
    }

    /// See [`ControllerLink::status`].
    pub fn status(&self) -> Option<ControllerStatus> {
        self.link.status()
    }

    pub fn link(&self) -> &ControllerLink<Linked> {
        &self.link
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::channel::DEFAULT_MAX_LINE_BYTES;
    use crate::serial::memory::MemoryPort;
    use tokio::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn background_loop_keeps_status_fresh() {
        let port = MemoryPort::new();
        port.push_str("DATA:0##0##0\n");
        let channel = CommandChannel::new(Box::new(port.clone()), DEFAULT_MAX_LINE_BYTES);

        let handle = ControllerHandle::connect(channel, LinkParams::default())
            .await
            .unwrap();
        assert!(handle.is_running());

        for step in 1..=5 {
            tokio::time::sleep(Duration::from_millis(150)).await;
            port.push_str(&format!("DATA:0.{}##0##1\n", step));
            tokio::time::sleep(Duration::from_millis(20)).await;
            let status = handle.status().unwrap();
            assert!(status.button_pressed);
        }

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(handle.status().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_fails_without_peer() {
        let port = MemoryPort::new();
        let channel = CommandChannel::new(Box::new(port), DEFAULT_MAX_LINE_BYTES);

        let result = ControllerHandle::connect(channel, LinkParams::default()).await;
        assert!(matches!(result, Err(LinkError::HandshakeFailed { .. })));
    }
}
