//! One harvest pass for one task: search, fetch, extract, name, upload.
//!
//! Error handling follows three tiers. Session-level failures (connect,
//! select, search, directory provisioning) abort the cycle; the next tick
//! retries from scratch. A broken naming template also aborts the cycle,
//! since it is a configuration defect rather than a per-item fault.
//! Per-item failures (one message failing to parse, one attachment failing
//! to upload) are logged and skipped without aborting anything else.

use humansize::{format_size, BINARY};
use tracing::{info, warn};

use crate::config::Task;
use crate::error::Result;
use crate::harvest::extract::{self, ExtensionFilter, RecipientFilter};
use crate::harvest::naming::{self, NameTemplate, NamingContext};
use crate::mailbox::Mailbox;
use crate::model::message::MessageRecord;
use crate::model::report::CycleReport;
use crate::store::Store;

/// Run one harvest cycle for `task`.
///
/// Messages are processed in fetch-stream arrival order; attachments
/// within one message in MIME part order. The fetch operation's terminal
/// error, if any, is surfaced after the stream has been drained, so
/// already-delivered messages are still processed.
pub fn run(task: &Task, mailbox: &dyn Mailbox, store: &dyn Store) -> Result<CycleReport> {
    let mut report = CycleReport::default();

    let mut session = mailbox.open()?;
    session.select(&task.source.mailbox)?;

    let uids = session.search(task.filter.seen)?;
    if uids.is_empty() {
        info!(task = %task.name, "no messages matched the search criteria");
        return Ok(report);
    }

    // Parse the template before any store I/O so a configuration defect
    // aborts the cycle without side effects.
    let template = NameTemplate::parse(&task.format)?;

    let dir = naming::remote_dir(&task.path, &task.tags);
    if !dir.is_empty() {
        store.ensure_dir(&dir)?;
    }

    let pipeline = Pipeline {
        task,
        template,
        dir,
        recipients: RecipientFilter::new(&task.filter.recipients),
        extensions: ExtensionFilter::new(&task.filter.extensions),
        store,
    };

    let stream = session.fetch(&uids)?;
    for message in stream.iter() {
        pipeline.process(&message, &mut report)?;
    }
    stream.finish()?;

    Ok(report)
}

/// Flag the given messages as seen, on a session of its own.
///
/// Called by the scheduler after a successful cycle; a failure here is
/// logged by the caller and never rolls back performed uploads.
pub fn mark_seen(mailbox: &dyn Mailbox, folder: &str, uids: &[u32]) -> Result<()> {
    if uids.is_empty() {
        return Ok(());
    }
    let mut session = mailbox.open()?;
    session.select(folder)?;
    session.mark_seen(uids)
}

/// Per-cycle processing state shared across messages.
struct Pipeline<'a> {
    task: &'a Task,
    template: NameTemplate,
    /// Relative remote directory prefix; empty for the store root.
    dir: String,
    recipients: RecipientFilter,
    extensions: ExtensionFilter,
    store: &'a dyn Store,
}

impl Pipeline<'_> {
    /// Process one fetched message. Returns an error only for conditions
    /// fatal to the whole cycle (template expansion failure).
    fn process(&self, message: &MessageRecord, report: &mut CycleReport) -> Result<()> {
        let Some(parsed) = extract::parse_message(&message.body) else {
            warn!(task = %self.task.name, uid = message.uid, "unparseable message body, skipping");
            report.processed += 1;
            return Ok(());
        };

        let envelope = extract::envelope_of(&parsed);
        if !self.recipients.matches(&envelope.recipients) {
            report.skipped_recipient += 1;
            return Ok(());
        }

        let mut parts = 0usize;
        let mut uploaded_here = 0usize;

        for record in extract::scan_attachments(&parsed, &self.extensions) {
            parts += 1;

            let ctx = NamingContext::new(&record, &envelope, message.uid);
            let name = self.template.expand(&ctx)?;
            let candidate = naming::join_remote(&self.dir, &name);
            // Single-rewrite collision policy; a failed probe counts as
            // absent, and a colliding rewritten name overwrites.
            let target = if self.store.exists(&candidate).unwrap_or(false) {
                naming::disambiguate(&candidate)
            } else {
                candidate
            };

            match self.store.put(&target, &record.data) {
                Ok(()) => {
                    info!(
                        task = %self.task.name,
                        uid = message.uid,
                        path = %target,
                        size = %format_size(record.data.len() as u64, BINARY),
                        "uploaded attachment"
                    );
                    uploaded_here += 1;
                    report.uploaded += 1;
                }
                Err(e) => {
                    warn!(
                        task = %self.task.name,
                        uid = message.uid,
                        path = %target,
                        error = %e,
                        "upload failed, skipping attachment"
                    );
                }
            }
        }

        if parts == 0 {
            report.msgs_no_attachments += 1;
        } else {
            report.msgs_with_attachments += 1;
            report.total_parts += parts;
        }
        if uploaded_here > 0 && self.task.mark_seen {
            report.seen_to_mark.push(message.uid);
        }
        report.processed += 1;
        Ok(())
    }
}
