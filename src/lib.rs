//! `retswire`: wire-format decoders for RETS real-estate data exchange.
//!
//! The crate turns raw response payloads into structured data:
//! multipart GetObject bodies become [`model::part::Part`]s, and
//! COMPACT / COMPACT-DECODED metadata and search payloads become
//! [`model::record::Record`]s. HTTP transport and XML envelope parsing are
//! left to the caller; every decoder here is a pure function of its input.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;

pub use error::{DecodeError, Result};
pub use model::part::{FieldPart, Multipart, Part};
pub use model::record::{MetadataTable, Record};
pub use parser::compact::{
    decode_compact, decode_compact_decoded, decode_compact_metadata, MetadataElement,
    MetadataKind,
};
pub use parser::delimiter::{decode_hex_string, Delimiter};
pub use parser::header::boundary_from_content_type;
pub use parser::multipart::{decode_multipart, DecodeOptions, MultipartDecoder};
