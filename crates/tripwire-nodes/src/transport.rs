//! Outbound message transport
//!
//! Chat nodes never talk to the host directly; they hand their rendered text
//! to a [`MessageSink`]. Hosts plug in their own sink, the default one only
//! logs.

use tripwire_engine::Result;

/// Destination for messages produced by chat nodes
///
/// Called from worker threads; implementations may block.
pub trait MessageSink: Send + Sync {
    /// Broadcast a message to everyone
    fn send(&self, message: &str) -> Result<()>;

    /// Send a message to a single player
    fn send_to(&self, player: &str, message: &str) -> Result<()>;
}

/// Sink that writes every message to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessageSink;

impl MessageSink for LogMessageSink {
    fn send(&self, message: &str) -> Result<()> {
        log::info!("[chat] {}", message);
        Ok(())
    }

    fn send_to(&self, player: &str, message: &str) -> Result<()> {
        log::info!("[chat -> {}] {}", player, message);
        Ok(())
    }
}
