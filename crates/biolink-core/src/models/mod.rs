//! Data models for the ingestion pipeline
//!
//! Every value here is created fresh per invocation and discarded when the call
//! returns; nothing is persisted locally.

mod ingestion;
mod upload;

pub use ingestion::*;
pub use upload::*;
