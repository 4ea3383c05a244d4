//! Core data model types for fetched messages, extracted attachments,
//! and per-cycle run summaries.

pub mod attachment;
pub mod message;
pub mod report;
