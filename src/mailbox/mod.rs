//! Mailbox capability: session factory, session operations, and the
//! pipelined fetch stream.
//!
//! The harvest cycle consumes mailboxes only through these traits; the
//! IMAP implementation lives in [`imap`](self::imap), and tests substitute
//! in-memory fakes.

pub mod imap;

use std::sync::mpsc;
use std::thread;

use crate::error::{HarvestError, Result};
use crate::model::message::MessageRecord;

/// Depth of the fetch pipeline: how many fetched messages may be buffered
/// ahead of processing.
const PIPELINE_DEPTH: usize = 16;

/// Factory for mailbox sessions. One session is opened per harvest cycle,
/// and a separate one for the mark-seen step.
pub trait Mailbox: Send + Sync {
    /// Connect and authenticate, producing a fresh session.
    fn open(&self) -> Result<Box<dyn MailSession>>;
}

/// One authenticated mailbox session.
///
/// Sessions are single-use: `fetch` consumes the session, moving it onto
/// the producer side of the returned stream. Teardown happens on drop on
/// every exit path.
pub trait MailSession: Send {
    /// Select the folder subsequent operations act on.
    fn select(&mut self, folder: &str) -> Result<()>;

    /// Search for message UIDs matching the seen-state constraint:
    /// `None` = any, `Some(true)` = only seen, `Some(false)` = only unseen.
    /// Returned in ascending UID order.
    fn search(&mut self, seen: Option<bool>) -> Result<Vec<u32>>;

    /// Start fetching envelopes and bodies for `uids`, streaming them as
    /// they arrive. Fetching proceeds concurrently with the consumer.
    fn fetch(self: Box<Self>, uids: &[u32]) -> Result<FetchStream>;

    /// Add the seen flag to the given messages.
    fn mark_seen(&mut self, uids: &[u32]) -> Result<()>;
}

/// A stream of fetched messages backed by a producer thread.
///
/// Iterate with [`FetchStream::iter`], then call [`FetchStream::finish`]
/// to surface the fetch operation's terminal error. Dropping the stream
/// early (e.g. when the cycle aborts) unblocks and stops the producer.
pub struct FetchStream {
    rx: mpsc::Receiver<MessageRecord>,
    producer: thread::JoinHandle<Result<()>>,
}

impl FetchStream {
    /// Spawn a producer thread feeding a bounded channel.
    ///
    /// `produce` receives the sender; it should stop early when a send
    /// fails, which means the consumer is gone.
    pub fn spawn<F>(produce: F) -> Result<Self>
    where
        F: FnOnce(mpsc::SyncSender<MessageRecord>) -> Result<()> + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(PIPELINE_DEPTH);
        let producer = thread::Builder::new()
            .name("fetch".to_string())
            .spawn(move || produce(tx))
            .map_err(|e| HarvestError::Mailbox(format!("failed to start fetch thread: {e}")))?;
        Ok(Self { rx, producer })
    }

    /// Iterate over messages in arrival order. Ends when the producer is
    /// done (successfully or not).
    pub fn iter(&self) -> mpsc::Iter<'_, MessageRecord> {
        self.rx.iter()
    }

    /// Wait for the producer and return its terminal result.
    pub fn finish(self) -> Result<()> {
        drop(self.rx);
        match self.producer.join() {
            Ok(result) => result,
            Err(_) => Err(HarvestError::Mailbox("fetch thread panicked".to_string())),
        }
    }
}
