//! Attachment extraction and message-level filtering.
//!
//! The extractor walks a parsed message's parts as a lazy, finite,
//! non-restartable sequence: a part qualifies when its disposition marks
//! it as an attachment; a missing filename falls back to a placeholder;
//! parts whose derived extension is absent from a non-empty allow-list
//! are skipped silently. Recipient filtering is evaluated once per
//! message, against the decoded To/Cc/Bcc lists.

use std::collections::HashSet;

use chrono::Utc;
use mail_parser::{Address, Message, MessagePart, MessageParser, MimeHeaders};

use crate::model::attachment::AttachmentRecord;
use crate::model::message::Envelope;

/// Filename used when an attachment part declares none.
const FALLBACK_FILENAME: &str = "attachment.bin";

/// Parse a raw RFC 5322 message. Returns `None` on malformed input; the
/// caller abandons the message and moves on.
pub fn parse_message(raw: &[u8]) -> Option<Message<'_>> {
    MessageParser::default().parse(raw)
}

/// Derive the decoded envelope from a parsed message.
pub fn envelope_of(msg: &Message<'_>) -> Envelope {
    let mut recipients = Vec::new();
    collect_addresses(msg.to(), &mut recipients);
    collect_addresses(msg.cc(), &mut recipients);
    collect_addresses(msg.bcc(), &mut recipients);

    Envelope {
        subject: msg.subject().unwrap_or_default().to_string(),
        date: msg
            .date()
            .and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0))
            .unwrap_or_else(Utc::now),
        recipients,
    }
}

fn collect_addresses(header: Option<&Address<'_>>, out: &mut Vec<String>) {
    match header {
        Some(Address::List(list)) => {
            out.extend(
                list.iter()
                    .filter_map(|a| a.address.as_ref().map(|s| s.to_string())),
            );
        }
        Some(Address::Group(groups)) => {
            for group in groups {
                out.extend(
                    group
                        .addresses
                        .iter()
                        .filter_map(|a| a.address.as_ref().map(|s| s.to_string())),
                );
            }
        }
        None => {}
    }
}

/// Recipient allow-list. An empty list admits every message.
#[derive(Debug, Clone)]
pub struct RecipientFilter {
    wanted: HashSet<String>,
}

impl RecipientFilter {
    pub fn new(recipients: &[String]) -> Self {
        let wanted = recipients
            .iter()
            .map(|r| r.trim().to_lowercase())
            .filter(|r| !r.is_empty())
            .collect();
        Self { wanted }
    }

    /// Whether a message with the given recipient addresses qualifies.
    /// Pure: depends only on the configured list and the addresses.
    pub fn matches(&self, addresses: &[String]) -> bool {
        if self.wanted.is_empty() {
            return true;
        }
        addresses
            .iter()
            .any(|a| self.wanted.contains(&a.trim().to_lowercase()))
    }
}

/// Attachment extension allow-list. Entries are trimmed, lowercased, and
/// stripped of leading dots; empty entries are dropped. An empty list
/// admits every extension.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    allowed: HashSet<String>,
}

impl ExtensionFilter {
    pub fn new(extensions: &[String]) -> Self {
        let allowed = extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { allowed }
    }

    pub fn admits(&self, extension: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(extension)
    }
}

/// Extension derived from a filename: the text after the last `.`,
/// lowercased. Empty when there is no dot.
pub fn extension_of(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => filename[idx + 1..].to_lowercase(),
        None => String::new(),
    }
}

/// Lazily scan a parsed message for qualifying attachments.
pub fn scan_attachments<'a>(
    msg: &'a Message<'a>,
    filter: &'a ExtensionFilter,
) -> AttachmentScan<'a> {
    AttachmentScan {
        parts: Box::new(msg.attachments()),
        filter,
    }
}

/// Iterator over a message's qualifying attachment parts.
///
/// Finite and non-restartable; the consumer pulls one record at a time.
pub struct AttachmentScan<'a> {
    parts: Box<dyn Iterator<Item = &'a MessagePart<'a>> + 'a>,
    filter: &'a ExtensionFilter,
}

impl Iterator for AttachmentScan<'_> {
    type Item = AttachmentRecord;

    fn next(&mut self) -> Option<Self::Item> {
        for part in self.parts.by_ref() {
            if !is_attachment(part) {
                continue;
            }
            let filename = part
                .attachment_name()
                .filter(|n| !n.is_empty())
                .unwrap_or(FALLBACK_FILENAME)
                .to_string();
            let extension = extension_of(&filename);
            if !self.filter.admits(&extension) {
                continue;
            }
            return Some(AttachmentRecord {
                filename,
                extension,
                data: part.contents().to_vec(),
            });
        }
        None
    }
}

/// A part is an attachment only when its disposition says so.
fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_message() -> Vec<u8> {
        concat!(
            "From: sender@example.com\r\n",
            "To: Ops <ops@example.com>\r\n",
            "Cc: audit@example.com\r\n",
            "Subject: Invoice\r\n",
            "Date: Fri, 01 Mar 2024 10:00:00 +0000\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"frontier\"\r\n",
            "\r\n",
            "--frontier\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "See attached.\r\n",
            "--frontier\r\n",
            "Content-Type: application/pdf; name=\"invoice.pdf\"\r\n",
            "Content-Disposition: attachment; filename=\"invoice.pdf\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "JVBERi0=\r\n",
            "--frontier\r\n",
            "Content-Type: text/plain; name=\"notes.txt\"\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n",
            "\r\n",
            "some notes\r\n",
            "--frontier--\r\n",
        )
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn test_envelope_decoding() {
        let raw = raw_message();
        let msg = parse_message(&raw).expect("parse");
        let env = envelope_of(&msg);
        assert_eq!(env.subject, "Invoice");
        assert_eq!(
            env.recipients,
            vec!["ops@example.com".to_string(), "audit@example.com".to_string()]
        );
        assert_eq!(env.date.format("%Y%m%d-%H%M%S").to_string(), "20240301-100000");
    }

    #[test]
    fn test_scan_yields_all_without_filter() {
        let raw = raw_message();
        let msg = parse_message(&raw).expect("parse");
        let filter = ExtensionFilter::new(&[]);
        let names: Vec<String> = scan_attachments(&msg, &filter)
            .map(|a| a.filename)
            .collect();
        assert_eq!(names, vec!["invoice.pdf", "notes.txt"]);
    }

    #[test]
    fn test_extension_filter_skips_silently() {
        let raw = raw_message();
        let msg = parse_message(&raw).expect("parse");
        let filter = ExtensionFilter::new(&[".PDF ".to_string()]);
        let records: Vec<AttachmentRecord> = scan_attachments(&msg, &filter).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "invoice.pdf");
        assert_eq!(records[0].extension, "pdf");
        assert_eq!(records[0].data, b"%PDF-");
    }

    #[test]
    fn test_non_attachment_parts_are_ignored() {
        // The text/plain body part has no attachment disposition.
        let raw = raw_message();
        let msg = parse_message(&raw).expect("parse");
        let filter = ExtensionFilter::new(&[]);
        assert_eq!(scan_attachments(&msg, &filter).count(), 2);
    }

    #[test]
    fn test_missing_filename_uses_placeholder() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "Subject: blob\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"b\"\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: application/octet-stream\r\n",
            "Content-Disposition: attachment\r\n",
            "\r\n",
            "payload\r\n",
            "--b--\r\n",
        )
        .as_bytes()
        .to_vec();
        let msg = parse_message(&raw).expect("parse");
        let filter = ExtensionFilter::new(&[]);
        let records: Vec<AttachmentRecord> = scan_attachments(&msg, &filter).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "attachment.bin");
        assert_eq!(records[0].extension, "bin");
    }

    #[test]
    fn test_recipient_filter() {
        let filter = RecipientFilter::new(&[" Ops@Example.com ".to_string()]);
        assert!(filter.matches(&["ops@example.com".to_string()]));
        assert!(!filter.matches(&["sales@example.com".to_string()]));
        assert!(!filter.matches(&[]));

        let open = RecipientFilter::new(&[]);
        assert!(open.matches(&[]));
        assert!(open.matches(&["anyone@example.com".to_string()]));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("invoice.PDF"), "pdf");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn test_unparseable_body_returns_none() {
        assert!(parse_message(b"").is_none());
    }
}
