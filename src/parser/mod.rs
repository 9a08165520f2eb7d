//! Wire-format decoders: multipart bulk-object bodies and COMPACT tabular payloads.

pub mod compact;
pub mod delimiter;
pub mod header;
pub mod multipart;
