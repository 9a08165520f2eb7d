//! Core data model types for decoded multipart parts and tabular records.

pub mod part;
pub mod record;
