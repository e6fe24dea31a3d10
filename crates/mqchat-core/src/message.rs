//! Chat message entity and wire codec
//!
//! On the wire a message is plain text, optionally prefixed with `[sender]: `.
//! Internally the sender is kept as a separate field so no hop has to re-parse
//! the prefix.

use std::fmt;

use crate::identity::Identity;

/// Bare text that tells the other side its peer is leaving
pub const EXIT_SENTINEL: &str = "exit";

/// Whether raw queue bytes carry the exit sentinel
pub fn is_exit_sentinel(bytes: &[u8]) -> bool {
    bytes.starts_with(EXIT_SENTINEL.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    sender: Option<String>,
    body: String,
}

impl ChatMessage {
    /// Message authored by `sender`
    pub fn from_identity(sender: &Identity, body: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.as_str().to_string()),
            body: body.into(),
        }
    }

    /// Message with no sender prefix
    pub fn bare(body: impl Into<String>) -> Self {
        Self {
            sender: None,
            body: body.into(),
        }
    }

    pub fn exit() -> Self {
        Self::bare(EXIT_SENTINEL)
    }

    /// Parse raw queue bytes; see [`payload_text`] for how the text is cut.
    pub fn decode(bytes: &[u8]) -> Self {
        let text = payload_text(bytes);
        if let Some((sender, body)) = split_prefix(&text) {
            return Self {
                sender: Some(sender.to_string()),
                body: body.to_string(),
            };
        }
        Self::bare(text)
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_exit(&self) -> bool {
        self.sender.is_none() && self.body.starts_with(EXIT_SENTINEL)
    }

    /// Fill in `fallback` as the sender if the wire text carried none
    pub fn attributed_to(mut self, fallback: &Identity) -> Self {
        if self.sender.is_none() {
            self.sender = Some(fallback.as_str().to_string());
        }
        self
    }

    /// Whether `identity` authored this message
    pub fn is_from(&self, identity: &Identity) -> bool {
        self.sender.as_deref() == Some(identity.as_str())
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sender {
            Some(sender) => write!(f, "[{}]: {}", sender, self.body),
            None => f.write_str(&self.body),
        }
    }
}

/// The text carried by a queue payload.
///
/// The payload ends at the first NUL, as a C string would, and trailing line
/// terminators are dropped. Invalid UTF-8 is replaced rather than rejected.
pub fn payload_text(bytes: &[u8]) -> String {
    let terminated = bytes
        .iter()
        .position(|&b| b == b'\0')
        .map_or(bytes, |nul| &bytes[..nul]);
    let end = terminated
        .iter()
        .rposition(|b| !matches!(b, b'\n' | b'\r'))
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&terminated[..end]).into_owned()
}

fn split_prefix(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('[')?;
    let end = rest.find("]: ")?;
    let sender = &rest[..end];
    if sender.is_empty() || sender.contains('[') {
        return None;
    }
    Some((sender, &rest[end + 3..]))
}
