//! External WhatsApp client capability interface.
//!
//! The console core never touches the WhatsApp protocol itself; everything it
//! needs from the outside world is this narrow trait plus a stream of
//! lifecycle events. The production implementation is
//! [`bridge::BridgeClient`]; tests substitute their own.

pub mod bridge;

use anyhow::Result;
use async_trait::async_trait;

use crate::chats::ChatEntry;

/// Connection lifecycle notifications from the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A login QR code was issued; the session is not authenticated yet.
    Qr(String),
    /// The session is authenticated and ready for commands.
    Ready,
    /// The session dropped; the client will try to reconnect.
    Disconnected(String),
}

/// Capabilities the console requires from the WhatsApp client.
#[async_trait]
pub trait WhatsAppClient: Send + Sync {
    /// Fetch the full chat set, groups included, in the client's order.
    async fn list_chats(&self) -> Result<Vec<ChatEntry>>;

    /// Send a text message to `address` (`<digits>@c.us`).
    async fn send_message(&self, address: &str, text: &str) -> Result<()>;
}
