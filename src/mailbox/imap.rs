//! IMAP implementation of the mailbox capability.
//!
//! Connects over implicit TLS, authenticates with plain login, and fetches
//! message bodies with `BODY.PEEK[]` so that the fetch itself never mutates
//! message flags; only the explicit mark-seen step does.

use std::net::TcpStream;

use native_tls::TlsStream;
use tracing::debug;

use super::{FetchStream, MailSession, Mailbox};
use crate::config::MailboxConfig;
use crate::error::{HarvestError, Result};
use crate::model::message::MessageRecord;

/// Messages fetched per UID FETCH round trip.
const FETCH_CHUNK: usize = 16;

type TlsSession = imap::Session<TlsStream<TcpStream>>;

/// Mailbox backed by an IMAP server. Cheap to construct; each [`open`]
/// dials a fresh connection.
///
/// [`open`]: Mailbox::open
pub struct ImapMailbox {
    config: MailboxConfig,
}

impl ImapMailbox {
    pub fn new(config: MailboxConfig) -> Self {
        Self { config }
    }
}

impl Mailbox for ImapMailbox {
    fn open(&self) -> Result<Box<dyn MailSession>> {
        let tls = native_tls::TlsConnector::builder()
            .build()
            .map_err(|e| HarvestError::Mailbox(format!("TLS setup failed: {e}")))?;
        let client = imap::connect(
            (self.config.host.as_str(), self.config.port),
            self.config.host.as_str(),
            &tls,
        )?;
        let session = client
            .login(&self.config.user, &self.config.pass)
            .map_err(|e| e.0)?;
        debug!(host = %self.config.host, user = %self.config.user, "mailbox session opened");
        Ok(Box::new(ImapSession {
            session: Some(session),
        }))
    }
}

struct ImapSession {
    // Taken by `fetch`, which moves the connection onto the producer
    // thread; `None` only after that hand-off.
    session: Option<TlsSession>,
}

impl ImapSession {
    fn session(&mut self) -> Result<&mut TlsSession> {
        self.session
            .as_mut()
            .ok_or_else(|| HarvestError::Mailbox("session already consumed".to_string()))
    }
}

impl MailSession for ImapSession {
    fn select(&mut self, folder: &str) -> Result<()> {
        self.session()?.select(folder)?;
        Ok(())
    }

    fn search(&mut self, seen: Option<bool>) -> Result<Vec<u32>> {
        let query = match seen {
            None => "ALL",
            Some(true) => "SEEN",
            Some(false) => "UNSEEN",
        };
        let mut uids: Vec<u32> = self.session()?.uid_search(query)?.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch(mut self: Box<Self>, uids: &[u32]) -> Result<FetchStream> {
        let uids = uids.to_vec();
        FetchStream::spawn(move |tx| {
            let session = self.session()?;
            for chunk in uids.chunks(FETCH_CHUNK) {
                let fetches = session.uid_fetch(uid_set(chunk), "(UID BODY.PEEK[])")?;
                for fetch in fetches.iter() {
                    let Some(uid) = fetch.uid else { continue };
                    let body = fetch.body().map(<[u8]>::to_vec).unwrap_or_default();
                    if tx.send(MessageRecord { uid, body }).is_err() {
                        // Consumer dropped the stream; stop fetching.
                        return Ok(());
                    }
                }
            }
            Ok(())
        })
    }

    fn mark_seen(&mut self, uids: &[u32]) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        self.session()?
            .uid_store(uid_set(uids), "+FLAGS (\\Seen)")?;
        Ok(())
    }
}

impl Drop for ImapSession {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            let _ = session.logout();
        }
    }
}

fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_set_formatting() {
        assert_eq!(uid_set(&[7]), "7");
        assert_eq!(uid_set(&[1, 2, 40]), "1,2,40");
    }
}
