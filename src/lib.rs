//! `mailharvest` — an unattended mailbox attachment harvester.
//!
//! This crate provides the core library: per-task configuration, the
//! attachment-harvesting pipeline (extraction, naming, upload), and the
//! scheduling loops that run each task on its own interval.

pub mod config;
pub mod error;
pub mod harvest;
pub mod mailbox;
pub mod model;
pub mod scheduler;
pub mod store;
