//! The attachment-harvesting pipeline: message-part extraction, filename
//! templating, and the per-task harvest cycle.

pub mod cycle;
pub mod extract;
pub mod naming;
