//! Decoded multipart units.
//!
//! A [`Part`] owns its payload outright once the decoder seals it; nothing
//! in the decoder keeps a reference to it afterwards.

use crate::parser::header::TransferEncoding;

/// One binary object recovered from a multipart body.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Part {
    /// Decoded payload bytes (transfer encoding already removed).
    #[serde(skip)]
    pub payload: Vec<u8>,

    /// Value of the part's `Content-Type` header.
    pub mime: Option<String>,

    /// `Content-Description` header, carried verbatim.
    pub content_description: Option<String>,

    /// `Content-ID` header, carried verbatim.
    pub content_id: Option<String>,

    /// `Object-ID` header, carried verbatim.
    pub object_id: Option<String>,

    /// Filename from `Content-Disposition`, reduced to its basename.
    pub filename: Option<String>,

    /// `name="..."` attribute from `Content-Disposition`.
    pub name: Option<String>,

    /// Transfer encoding the payload was decoded from.
    pub transfer_encoding: TransferEncoding,

    /// Headers with no dedicated field, in stream order (lower-cased names).
    pub extra_headers: Vec<(String, String)>,
}

impl Part {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Look up a passthrough header by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.extra_headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// MIME type without parameters, lower-cased (`"image/jpeg"`).
    pub fn essence(&self) -> Option<String> {
        self.mime
            .as_deref()
            .map(|m| m.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
    }
}

/// A form-style field part: `Content-Disposition` with a name but no filename.
///
/// Field parts carry text rather than an object, so they are returned apart
/// from the payload [`Part`] list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldPart {
    /// Field name (`name="..."`), empty if the disposition had none.
    pub name: String,
    /// Decoded text value.
    pub value: String,
}

/// Everything a single multipart decode call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Multipart {
    /// Payload-bearing parts, in stream order.
    pub parts: Vec<Part>,
    /// Field parts, in stream order.
    pub fields: Vec<FieldPart>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part_with(mime: Option<&str>, extra: Vec<(&str, &str)>) -> Part {
        Part {
            payload: vec![1, 2, 3],
            mime: mime.map(String::from),
            content_description: None,
            content_id: None,
            object_id: None,
            filename: None,
            name: None,
            transfer_encoding: TransferEncoding::Binary,
            extra_headers: extra
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_essence_strips_parameters() {
        let part = part_with(Some("Image/JPEG; name=photo.jpg"), vec![]);
        assert_eq!(part.essence().as_deref(), Some("image/jpeg"));
        assert_eq!(part.len(), 3);
    }

    #[test]
    fn test_essence_missing() {
        assert_eq!(part_with(None, vec![]).essence(), None);
        assert_eq!(part_with(Some("  "), vec![]).essence(), None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let part = part_with(None, vec![("location", "http://example.com/1.jpg")]);
        assert_eq!(part.header("Location"), Some("http://example.com/1.jpg"));
        assert_eq!(part.header("x-missing"), None);
    }
}
