//! Domain error types for wabook.
//!
//! Typed errors at module boundaries replace string-encoded errors and
//! enable structured error handling via pattern matching.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Errors produced while parsing a console input line.
///
/// Both variants are recoverable: the REPL prints the message and returns to
/// the prompt. `Usage` carries the exact usage string for the command so the
/// dispatch boundary can print it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Error: Unknown command: {0}")]
    Unknown(String),

    #[error("  Use: {0}")]
    Usage(&'static str),
}

// ---------------------------------------------------------------------------
// Phone normalization errors
// ---------------------------------------------------------------------------

/// Errors resolving a `#n` chat-index reference during phone normalization.
///
/// Embedded in `anyhow::Error` by the command handlers; callers can
/// downcast: `e.downcast_ref::<PhoneError>()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("No chat listing available. Run `chats` or `groups` first.")]
    NoChatIndex,

    #[error("Invalid chat index: #{0}")]
    InvalidIndex(String),

    #[error("Chat index out of range: #{0}")]
    IndexOutOfRange(usize),
}

// ---------------------------------------------------------------------------
// Bridge transport errors
// ---------------------------------------------------------------------------

/// Errors from the WhatsApp bridge link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("WhatsApp bridge not connected")]
    NotConnected,

    #[error("Timed out waiting for the bridge to respond")]
    Timeout,

    #[error("{0}")]
    Rejected(String),
}
