//! Per-cycle run summary.

/// Accumulated counters for one harvest cycle.
///
/// Owned by the cycle, returned to the scheduler, never persisted.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Messages that went through processing (including ones whose body
    /// failed to parse). Recipient-filtered messages are not counted here.
    pub processed: usize,

    /// Messages skipped because no recipient matched the allow-list.
    pub skipped_recipient: usize,

    /// Messages that yielded no attachment passing the filters.
    pub msgs_no_attachments: usize,

    /// Messages that yielded at least one attachment passing the filters.
    pub msgs_with_attachments: usize,

    /// Total attachment parts that passed the filters, across messages.
    pub total_parts: usize,

    /// Attachments uploaded successfully.
    pub uploaded: usize,

    /// UIDs of messages with at least one successful upload, eligible for
    /// the mark-seen step. Only populated when the task requests it.
    pub seen_to_mark: Vec<u32>,
}
