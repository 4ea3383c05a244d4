//! Fetched message types.

use chrono::{DateTime, Utc};

/// One message as delivered by the mailbox fetch stream.
///
/// Transient: lives only within one harvest cycle. The body is the raw
/// RFC 5322 message; the envelope is derived from it during processing.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    /// Mailbox-assigned unique identifier (IMAP UID).
    pub uid: u32,

    /// Raw message bytes (headers + body). May be empty when the server
    /// returned no body section for this UID.
    pub body: Vec<u8>,
}

/// Decoded envelope data of one message, derived from its parsed body.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Decoded subject line (RFC 2047 encoded-words resolved).
    /// Empty if the header is missing.
    pub subject: String,

    /// Message date. Falls back to the current time when the `Date:`
    /// header is absent or unparseable.
    pub date: DateTime<Utc>,

    /// All recipient addresses from `To`, `Cc`, and `Bcc`, in header
    /// order, without display names.
    pub recipients: Vec<String>,
}
