//! Extracted attachment payloads.

/// One attachment extracted from a message, with its decoded content.
///
/// Produced and consumed within the processing of a single message.
#[derive(Debug, Clone)]
pub struct AttachmentRecord {
    /// Filename as declared by the part headers. Falls back to a fixed
    /// placeholder when the part declares none.
    pub filename: String,

    /// Extension derived from the filename: the text after the last `.`,
    /// lowercased. Empty when the filename carries no dot.
    pub extension: String,

    /// Decoded attachment bytes.
    pub data: Vec<u8>,
}

impl AttachmentRecord {
    /// The filename without its extension.
    pub fn base_name(&self) -> &str {
        match self.filename.rfind('.') {
            Some(idx) if !self.extension.is_empty() => &self.filename[..idx],
            _ => &self.filename,
        }
    }
}
