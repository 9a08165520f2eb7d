//! Part header handling: the recognized-header table, transfer-encoding
//! lookup, and MIME parameter parsing (`name=`, `filename=`, `boundary=`).
//!
//! All lookups here are pure and stateless; names are compared lower-cased.

use crate::error::{DecodeError, Result};

/// Headers the multipart decoder interprets or carries into a [`Part`].
///
/// Anything else lands in the part's passthrough bag.
///
/// [`Part`]: crate::model::part::Part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderName {
    ContentDisposition,
    ContentType,
    ContentTransferEncoding,
    ContentDescription,
    ContentId,
    ObjectId,
    Other(String),
}

impl HeaderName {
    /// Classify a raw header name (case-insensitive, surrounding blanks ignored).
    pub fn from_name(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        match lower.as_str() {
            "content-disposition" => Self::ContentDisposition,
            "content-type" => Self::ContentType,
            "content-transfer-encoding" => Self::ContentTransferEncoding,
            "content-description" => Self::ContentDescription,
            "content-id" => Self::ContentId,
            "object-id" => Self::ObjectId,
            _ => Self::Other(lower),
        }
    }
}

/// Supported `Content-Transfer-Encoding` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferEncoding {
    #[default]
    Binary,
    #[serde(rename = "7bit")]
    SevenBit,
    #[serde(rename = "8bit")]
    EightBit,
    Base64,
}

impl TransferEncoding {
    /// Look up a header value. Unknown encodings (e.g. `quoted-printable`)
    /// are an error for the whole decode.
    pub fn from_header(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(Self::Binary),
            "7bit" => Ok(Self::SevenBit),
            "8bit" => Ok(Self::EightBit),
            "base64" => Ok(Self::Base64),
            other => Err(DecodeError::UnsupportedTransferEncoding(other.to_string())),
        }
    }

    /// Canonical header spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
        }
    }

    /// `true` when body bytes are copied through untouched.
    pub fn is_identity(&self) -> bool {
        !matches!(self, Self::Base64)
    }
}

impl std::fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Decode raw header or field bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Get a parameter from a structured header value such as
/// `form-data; name="photo"; filename="a.jpg"`.
///
/// Parameter names match case-insensitively. Quoted values are unquoted
/// (backslash escapes honored); bare values are trimmed.
pub fn header_param(value: &str, param: &str) -> Option<String> {
    split_params(value)
        .into_iter()
        .skip(1)
        .find_map(|segment| {
            let (key, val) = segment.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case(param) {
                return None;
            }
            Some(unquote(val.trim()))
        })
}

/// Extract `name="..."` from a `Content-Disposition` value.
pub fn disposition_name(value: &str) -> Option<String> {
    header_param(value, "name").filter(|n| !n.is_empty())
}

/// Extract the filename from a `Content-Disposition` value.
///
/// Directory components (`/` or `\`) are stripped and `&#NNN;` numeric
/// entities decoded, so `"C:\photos\a&#32;b.jpg"` becomes `"a b.jpg"`.
/// An explicitly empty filename still counts as "has a filename".
pub fn disposition_filename(value: &str) -> Option<String> {
    let raw = header_param(value, "filename")?;
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    Some(decode_numeric_entities(base))
}

/// Extract the multipart boundary from a `Content-Type` header value.
///
/// Accepts quoted and unquoted forms:
/// `multipart/parallel; boundary="simple boundary"` → `simple boundary`.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    header_param(content_type, "boundary").filter(|b| !b.is_empty())
}

/// Split a header value on `;`, ignoring separators inside quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, ch) in value.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                segments.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&value[start..]);
    segments
}

/// Strip surrounding double quotes and resolve backslash escapes.
fn unquote(s: &str) -> String {
    let Some(inner) = s.strip_prefix('"') else {
        return s.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => break,
            _ => out.push(ch),
        }
    }
    out
}

/// Replace `&#NNN;` sequences with the character they name.
fn decode_numeric_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("&#") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let decoded = after.find(';').and_then(|end| {
            let code: u32 = after[..end].parse().ok()?;
            Some((char::from_u32(code)?, end))
        });
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("&#");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_name_table() {
        assert_eq!(HeaderName::from_name("Content-ID"), HeaderName::ContentId);
        assert_eq!(HeaderName::from_name("OBJECT-ID"), HeaderName::ObjectId);
        assert_eq!(
            HeaderName::from_name(" Content-Transfer-Encoding "),
            HeaderName::ContentTransferEncoding
        );
        assert_eq!(
            HeaderName::from_name("Location"),
            HeaderName::Other("location".to_string())
        );
    }

    #[test]
    fn test_transfer_encoding_lookup() {
        assert_eq!(
            TransferEncoding::from_header("BASE64").unwrap(),
            TransferEncoding::Base64
        );
        assert_eq!(
            TransferEncoding::from_header(" 7bit ").unwrap(),
            TransferEncoding::SevenBit
        );
        assert!(TransferEncoding::from_header("8BIT").unwrap().is_identity());
        match TransferEncoding::from_header("quoted-printable") {
            Err(DecodeError::UnsupportedTransferEncoding(v)) => assert_eq!(v, "quoted-printable"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_disposition_name_and_filename() {
        let value = r#"form-data; name="photo"; filename="photo 1.jpg""#;
        assert_eq!(disposition_name(value).as_deref(), Some("photo"));
        assert_eq!(disposition_filename(value).as_deref(), Some("photo 1.jpg"));
    }

    #[test]
    fn test_name_does_not_match_filename() {
        let value = r#"attachment; filename="a.jpg""#;
        assert_eq!(disposition_name(value), None);
    }

    #[test]
    fn test_filename_basename_and_entities() {
        let value = r#"attachment; filename="C:\\photos\\a&#32;b.jpg""#;
        assert_eq!(disposition_filename(value).as_deref(), Some("a b.jpg"));
        let value = "attachment; filename=/tmp/x/report.pdf";
        assert_eq!(disposition_filename(value).as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_semicolon_inside_quotes() {
        let value = r#"form-data; name="a;b"; filename="c.txt""#;
        assert_eq!(disposition_name(value).as_deref(), Some("a;b"));
        assert_eq!(disposition_filename(value).as_deref(), Some("c.txt"));
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type(r#"multipart/parallel; boundary="simple boundary""#)
                .as_deref(),
            Some("simple boundary")
        );
        assert_eq!(
            boundary_from_content_type("multipart/parallel; BOUNDARY=abc123; charset=utf-8")
                .as_deref(),
            Some("abc123")
        );
        assert_eq!(boundary_from_content_type("image/jpeg"), None);
        assert_eq!(boundary_from_content_type("multipart/parallel; boundary="), None);
    }

    #[test]
    fn test_decode_text_fallback() {
        assert_eq!(decode_text(b"caf\xc3\xa9"), "café");
        assert_eq!(decode_text(b"caf\xe9"), "café");
        assert_eq!(decode_text(b"\xEF\xBB\xBFhi"), "hi");
    }
}
