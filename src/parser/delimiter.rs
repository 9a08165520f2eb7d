//! Column delimiters and hex-escaped wire values.

use crate::error::{DecodeError, Result};

/// How a tabular payload's column delimiter is supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delimiter {
    /// A literal delimiter character (COMPACT metadata uses a tab).
    Literal(char),
    /// A hex string, two digits per character (`<DELIMITER value="09"/>`).
    Hex(String),
}

impl Delimiter {
    /// The fixed COMPACT delimiter.
    pub const TAB: Delimiter = Delimiter::Literal('\t');

    /// Resolve to the string rows and columns are split on.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::Literal(ch) => Ok(ch.to_string()),
            Self::Hex(hex) => decode_hex_string(hex),
        }
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::TAB
    }
}

/// Decode a hex string into characters, one per two-digit group, each
/// group taken as a code point (`"09"` → `"\t"`, `"7C"` → `"|"`).
///
/// Empty, odd-length or non-hex input yields [`DecodeError::MissingDelimiter`].
pub fn decode_hex_string(hex: &str) -> Result<String> {
    let hex = hex.trim();
    if hex.is_empty() {
        return Err(DecodeError::MissingDelimiter);
    }
    let bytes = hex::decode(hex).map_err(|e| {
        tracing::debug!(value = %hex, error = %e, "Undecodable hex delimiter");
        DecodeError::MissingDelimiter
    })?;
    Ok(bytes.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_tab() {
        assert_eq!(decode_hex_string("09").unwrap(), "\t");
    }

    #[test]
    fn test_hex_upper_and_lower_case() {
        assert_eq!(decode_hex_string("7C").unwrap(), "|");
        assert_eq!(decode_hex_string("7c").unwrap(), "|");
        assert_eq!(decode_hex_string(" 2c ").unwrap(), ",");
    }

    #[test]
    fn test_hex_multiple_groups() {
        assert_eq!(decode_hex_string("0909").unwrap(), "\t\t");
    }

    #[test]
    fn test_high_byte_is_code_point() {
        assert_eq!(decode_hex_string("e9").unwrap(), "é");
    }

    #[test]
    fn test_hex_errors() {
        assert!(matches!(
            decode_hex_string(""),
            Err(DecodeError::MissingDelimiter)
        ));
        assert!(matches!(
            decode_hex_string("9"),
            Err(DecodeError::MissingDelimiter)
        ));
        assert!(matches!(
            decode_hex_string("zz"),
            Err(DecodeError::MissingDelimiter)
        ));
    }

    #[test]
    fn test_resolve() {
        assert_eq!(Delimiter::TAB.resolve().unwrap(), "\t");
        assert_eq!(Delimiter::default(), Delimiter::TAB);
        assert_eq!(Delimiter::Hex("7C".into()).resolve().unwrap(), "|");
        assert!(Delimiter::Hex(String::new()).resolve().is_err());
    }
}
