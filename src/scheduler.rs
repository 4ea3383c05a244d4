//! Per-task scheduling loops.
//!
//! Every configured task owns one independent timer-driven loop; loops
//! share nothing but the process-wide shutdown signal. Cancellation is
//! cooperative: it is observed between ticks, so an in-flight cycle always
//! runs to completion before its loop exits.

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::{Config, Task};
use crate::harvest::cycle;
use crate::mailbox::imap::ImapMailbox;
use crate::store::webdav::WebdavStore;

/// Spawn one loop per configured task and wait for all of them to stop.
pub async fn run(config: Config, shutdown: watch::Receiver<bool>) {
    let mut handles = Vec::with_capacity(config.tasks.len());
    for task in config.tasks {
        handles.push(tokio::spawn(task_loop(task, shutdown.clone())));
    }
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "task loop aborted");
        }
    }
}

async fn task_loop(task: Task, mut shutdown: watch::Receiver<bool>) {
    if humantime::parse_duration(task.interval.trim()).is_err() {
        warn!(
            task = %task.name,
            interval = %task.interval,
            "unparseable interval, falling back to default"
        );
    }
    let interval = task.interval_or_default();
    info!(task = %task.name, every = %humantime::format_duration(interval), "task loop started");

    // First tick fires after one full interval, like a ticking timer.
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let tick_task = task.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || tick_once(&tick_task)).await {
                    error!(task = %task.name, error = %e, "harvest cycle panicked");
                }
            }
        }
    }
    info!(task = %task.name, "task loop stopped");
}

/// One scheduler tick: fresh store client, harvest cycle, mark-seen step.
fn tick_once(task: &Task) {
    let store = match WebdavStore::new(&task.destination) {
        Ok(store) => store,
        Err(e) => {
            warn!(task = %task.name, error = %e, "store client unavailable, skipping tick");
            return;
        }
    };
    let mailbox = ImapMailbox::new(task.source.clone());

    let report = match cycle::run(task, &mailbox, &store) {
        Ok(report) => report,
        Err(e) => {
            warn!(task = %task.name, error = %e, "harvest cycle failed");
            return;
        }
    };

    // Uploads and seen-marking are not transactional: a failure here is
    // logged and the uploads stand.
    if task.mark_seen && !report.seen_to_mark.is_empty() {
        if let Err(e) = cycle::mark_seen(&mailbox, &task.source.mailbox, &report.seen_to_mark) {
            warn!(task = %task.name, error = %e, "failed to mark messages seen");
        }
    }

    info!(
        task = %task.name,
        processed = report.processed,
        uploaded = report.uploaded,
        skipped_recipient = report.skipped_recipient,
        "cycle complete"
    );
}
