//! Export functionality: decoded parts to files, records to CSV or JSON.

pub mod csv;
pub mod json;
pub mod parts;
