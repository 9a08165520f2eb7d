//! COMPACT / COMPACT-DECODED tabular payload decoding.
//!
//! Both formats carry one COLUMNS block and zero or more DATA blocks. Each
//! block is a single row whose cells are separated by the delimiter, with a
//! delimiter at both ends:
//!
//! ```text
//! <COLUMNS>\tListingID\tListPrice\t</COLUMNS>
//! <DATA>\t12345\t250000\t</DATA>
//! ```
//!
//! COMPACT metadata always uses a tab. COMPACT-DECODED search results name
//! the delimiter out of band as hex (`<DELIMITER value="09"/>`).

use std::collections::HashMap;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{DecodeError, Result};
use crate::model::record::{MetadataTable, Record};
use crate::parser::delimiter::Delimiter;

/// List name used when the caller does not supply one.
pub const DEFAULT_LIST_NAME: &str = "Data";

/// Decode a COMPACT payload with an explicit delimiter.
///
/// The column list is authoritative: surplus cells in a row are ignored and
/// missing trailing cells become empty strings, so every record carries
/// exactly the column set. No DATA blocks yields an empty list.
pub fn decode_compact<S: AsRef<str>>(
    columns: Option<&str>,
    data: &[S],
    delimiter: &Delimiter,
) -> Result<Vec<Record>> {
    let columns = columns.ok_or(DecodeError::MissingColumns)?;
    let delim = delimiter.resolve()?;
    decode_rows(columns, data, &delim)
}

/// Decode a COMPACT-DECODED search payload whose delimiter arrives hex-encoded.
///
/// A missing or undecodable delimiter is [`DecodeError::MissingDelimiter`].
pub fn decode_compact_decoded<S: AsRef<str>>(
    columns: Option<&str>,
    data: &[S],
    delimiter_hex: Option<&str>,
) -> Result<Vec<Record>> {
    let hex = delimiter_hex.ok_or(DecodeError::MissingDelimiter)?;
    decode_compact(columns, data, &Delimiter::Hex(hex.to_string()))
}

/// One metadata element of a COMPACT metadata response
/// (e.g. a `<METADATA-CLASS Resource="Property" Version=".." Date="..">` node).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataElement {
    /// Element attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Text of the element's COLUMNS child, if any.
    pub columns: Option<String>,
    /// Text of each DATA child.
    pub data: Vec<String>,
}

/// Decode the metadata elements of one response into a [`MetadataTable`].
///
/// Records from all elements are concatenated in element order, so a
/// response with one element per resource keeps every resource's rows
/// instead of only the last element's. Attributes are merged, a later
/// element's value replacing an earlier one. The record list is published
/// under `list_name`, or [`DEFAULT_LIST_NAME`].
pub fn decode_compact_metadata(
    elements: &[MetadataElement],
    list_name: Option<&str>,
) -> Result<MetadataTable> {
    let mut table = MetadataTable {
        attributes: Vec::new(),
        list_name: list_name
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_LIST_NAME)
            .to_string(),
        records: Vec::new(),
    };

    // Decode everything first so a failure leaves nothing half-merged.
    let mut decoded = Vec::with_capacity(elements.len());
    for element in elements {
        decoded.push(decode_compact(
            element.columns.as_deref(),
            &element.data,
            &Delimiter::TAB,
        )?);
    }

    for (element, records) in elements.iter().zip(decoded) {
        for (k, v) in &element.attributes {
            table.set_attribute(k.clone(), v.clone());
        }
        table.records.extend(records);
    }

    debug!(
        list = %table.list_name,
        records = table.records.len(),
        elements = elements.len(),
        "Decoded compact metadata"
    );
    Ok(table)
}

fn decode_rows<S: AsRef<str>>(columns: &str, data: &[S], delim: &str) -> Result<Vec<Record>> {
    let names = split_bracketed(columns, delim);

    // Column position -> record slot. A repeated name reuses its first slot,
    // so the later cell wins.
    let mut slot_by_name: HashMap<&str, usize> = HashMap::with_capacity(names.len());
    let mut unique: Vec<&str> = Vec::with_capacity(names.len());
    let mut slots = Vec::with_capacity(names.len());
    for &name in &names {
        let slot = *slot_by_name.entry(name).or_insert_with(|| {
            unique.push(name);
            unique.len() - 1
        });
        slots.push(slot);
    }
    if unique.len() < names.len() {
        debug!(
            columns = names.len(),
            distinct = unique.len(),
            "COLUMNS repeats a name; later cells overwrite earlier ones"
        );
    }

    let mut records = Vec::with_capacity(data.len());
    let mut truncated_rows = 0usize;
    let mut values: Vec<&str> = vec![""; unique.len()];

    for row in data {
        let cells = split_bracketed(row.as_ref(), delim);
        if cells.len() > names.len() {
            truncated_rows += 1;
        }

        for (i, &slot) in slots.iter().enumerate() {
            values[slot] = cells.get(i).copied().unwrap_or("");
        }
        let fields = unique
            .iter()
            .zip(&values)
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        records.push(Record::from_fields(fields));
    }

    if truncated_rows > 0 {
        warn!(
            rows = truncated_rows,
            columns = names.len(),
            "DATA rows longer than COLUMNS; extra values ignored"
        );
    }

    Ok(records)
}

/// Split a delimiter-bracketed row, dropping the empty leading and trailing
/// fields the brackets produce.
fn split_bracketed<'a>(row: &'a str, delim: &str) -> Vec<&'a str> {
    let fields: Vec<&str> = row.split(delim).collect();
    if fields.len() < 2 {
        return Vec::new();
    }
    fields[1..fields.len() - 1].to_vec()
}

/// Kinds of COMPACT metadata, each with its response element and list name.
///
/// `METADATA-SYSTEM` is absent: it carries only element attributes and a
/// comment, never a COLUMNS/DATA table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Resource,
    Class,
    Table,
    Lookup,
    LookupType,
    Object,
    ForeignKeys,
}

impl MetadataKind {
    pub const ALL: [MetadataKind; 7] = [
        Self::Resource,
        Self::Class,
        Self::Table,
        Self::Lookup,
        Self::LookupType,
        Self::Object,
        Self::ForeignKeys,
    ];

    /// Value of the `Type` request parameter.
    pub fn request_type(&self) -> &'static str {
        match self {
            Self::Resource => "METADATA-RESOURCE",
            Self::Class => "METADATA-CLASS",
            Self::Table => "METADATA-TABLE",
            Self::Lookup => "METADATA-LOOKUP",
            Self::LookupType => "METADATA-LOOKUP_TYPE",
            Self::Object => "METADATA-OBJECT",
            Self::ForeignKeys => "METADATA-FOREIGNKEYS",
        }
    }

    /// Name of the element the response carries the rows in.
    pub fn element_name(&self) -> &'static str {
        match self {
            Self::ForeignKeys => "METADATA-FOREIGN_KEYS",
            other => other.request_type(),
        }
    }

    /// Key the decoded record list is published under.
    pub fn list_name(&self) -> &'static str {
        match self {
            Self::Resource => "Resources",
            Self::Class => "Classes",
            Self::Table => "Fields",
            Self::Lookup => "Lookups",
            Self::LookupType => "LookupTypes",
            Self::Object => "Objects",
            Self::ForeignKeys => "ForeignKeys",
        }
    }
}

impl FromStr for MetadataKind {
    type Err = String;

    /// Accepts the request type (`METADATA-CLASS`), the response element
    /// name, or the short form (`class`, `lookup_type`, `foreign-keys`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        let short = upper.strip_prefix("METADATA_").unwrap_or(&upper);
        let kind = match short {
            "RESOURCE" => Self::Resource,
            "CLASS" => Self::Class,
            "TABLE" => Self::Table,
            "LOOKUP" => Self::Lookup,
            "LOOKUP_TYPE" | "LOOKUPTYPE" => Self::LookupType,
            "OBJECT" => Self::Object,
            "FOREIGNKEYS" | "FOREIGN_KEYS" => Self::ForeignKeys,
            _ => return Err(format!("unknown metadata type '{s}'")),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row() {
        let records = decode_compact(Some("\tA\tB\t"), &["\t1\t2\t"], &Delimiter::TAB).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("A"), Some("1"));
        assert_eq!(records[0].get("B"), Some("2"));
        assert_eq!(records[0].len(), 2);
    }

    #[test]
    fn test_no_data_blocks() {
        let data: [&str; 0] = [];
        let records = decode_compact(Some("\tA\tB\t"), &data, &Delimiter::TAB).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_missing_columns() {
        let result = decode_compact(None, &["\t1\t"], &Delimiter::TAB);
        assert!(matches!(result, Err(DecodeError::MissingColumns)));
    }

    #[test]
    fn test_long_row_truncated() {
        let records = decode_compact(Some("\tA\t"), &["\t1\t2\t3\t"], &Delimiter::TAB).unwrap();
        assert_eq!(records[0].len(), 1);
        assert_eq!(records[0].get("A"), Some("1"));
    }

    #[test]
    fn test_short_row_padded_with_empty() {
        let records =
            decode_compact(Some("\tA\tB\tC\t"), &["\t1\t"], &Delimiter::TAB).unwrap();
        assert_eq!(records[0].len(), 3);
        assert_eq!(records[0].get("A"), Some("1"));
        assert_eq!(records[0].get("B"), Some(""));
        assert_eq!(records[0].get("C"), Some(""));
    }

    #[test]
    fn test_empty_cells_preserved() {
        let records = decode_compact(Some("\tA\tB\tC\t"), &["\t\t\tx\t"], &Delimiter::TAB).unwrap();
        assert_eq!(records[0].get("A"), Some(""));
        assert_eq!(records[0].get("B"), Some(""));
        assert_eq!(records[0].get("C"), Some("x"));
    }

    #[test]
    fn test_compact_decoded_pipe_delimiter() {
        let records = decode_compact_decoded(
            Some("|ListingID|City|"),
            &["|1|Springfield|", "|2|Shelbyville|"],
            Some("7C"),
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("ListingID"), Some("2"));
        assert_eq!(records[1].get("City"), Some("Shelbyville"));
    }

    #[test]
    fn test_compact_decoded_missing_delimiter() {
        let result = decode_compact_decoded(Some("\tA\t"), &["\t1\t"], None);
        assert!(matches!(result, Err(DecodeError::MissingDelimiter)));
        let result = decode_compact_decoded(Some("\tA\t"), &["\t1\t"], Some("0"));
        assert!(matches!(result, Err(DecodeError::MissingDelimiter)));
    }

    #[test]
    fn test_split_bracketed_degenerate() {
        assert!(split_bracketed("", "\t").is_empty());
        assert!(split_bracketed("abc", "\t").is_empty());
        assert_eq!(split_bracketed("\t\t", "\t"), vec![""]);
    }

    #[test]
    fn test_metadata_merges_elements() {
        let elements = vec![
            MetadataElement {
                attributes: vec![
                    ("Resource".into(), "Property".into()),
                    ("Version".into(), "1.0".into()),
                ],
                columns: Some("\tClassName\tDescription\t".into()),
                data: vec!["\tRESI\tResidential\t".into()],
            },
            MetadataElement {
                attributes: vec![("Version".into(), "1.1".into())],
                columns: Some("\tClassName\tDescription\t".into()),
                data: vec!["\tLAND\tLand\t".into()],
            },
        ];
        let table = decode_compact_metadata(&elements, Some("Classes")).unwrap();
        assert_eq!(table.list_name, "Classes");
        assert_eq!(table.attribute("Resource"), Some("Property"));
        assert_eq!(table.attribute("Version"), Some("1.1"));
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[1].get("ClassName"), Some("LAND"));
    }

    #[test]
    fn test_metadata_default_list_name() {
        let table = decode_compact_metadata(&[], None).unwrap();
        assert_eq!(table.list_name, DEFAULT_LIST_NAME);
        assert!(table.records.is_empty());
    }

    #[test]
    fn test_metadata_missing_columns_fails_whole_call() {
        let elements = vec![
            MetadataElement {
                attributes: vec![],
                columns: Some("\tA\t".into()),
                data: vec!["\t1\t".into()],
            },
            MetadataElement::default(),
        ];
        let result = decode_compact_metadata(&elements, Some("Resources"));
        assert!(matches!(result, Err(DecodeError::MissingColumns)));
    }

    #[test]
    fn test_metadata_kind_parsing() {
        assert_eq!("METADATA-CLASS".parse::<MetadataKind>(), Ok(MetadataKind::Class));
        assert_eq!("lookup_type".parse::<MetadataKind>(), Ok(MetadataKind::LookupType));
        assert_eq!(
            "METADATA-FOREIGN_KEYS".parse::<MetadataKind>(),
            Ok(MetadataKind::ForeignKeys)
        );
        assert!("bogus".parse::<MetadataKind>().is_err());
        for kind in MetadataKind::ALL {
            assert_eq!(kind.request_type().parse::<MetadataKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_metadata_kind_names() {
        assert_eq!(MetadataKind::Table.list_name(), "Fields");
        assert_eq!(MetadataKind::ForeignKeys.element_name(), "METADATA-FOREIGN_KEYS");
        assert_eq!(MetadataKind::LookupType.list_name(), "LookupTypes");
        assert!("METADATA-SYSTEM".parse::<MetadataKind>().is_err());
    }

    #[test]
    fn test_repeated_column_name_keeps_first_position() {
        let records =
            decode_compact(Some("\tA\tB\tA\t"), &["\t1\t2\t3\t"], &Delimiter::TAB).unwrap();
        assert_eq!(records[0].columns().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(records[0].get("A"), Some("3"));
        assert_eq!(records[0].get("B"), Some("2"));
    }

    #[test]
    fn test_wide_block() {
        let k = 1600;
        let columns = format!(
            "\t{}\t",
            (0..k).map(|c| format!("F{c}")).collect::<Vec<_>>().join("\t")
        );
        let rows: Vec<String> = (0..50)
            .map(|r| {
                format!(
                    "\t{}\t",
                    (0..k).map(|c| format!("{r}.{c}")).collect::<Vec<_>>().join("\t")
                )
            })
            .collect();

        let records = decode_compact(Some(&columns), &rows, &Delimiter::TAB).unwrap();
        assert_eq!(records.len(), 50);
        assert!(records.iter().all(|r| r.len() == k));
        assert_eq!(records[49].get("F1599"), Some("49.1599"));
        assert_eq!(records[0].columns().nth(800), Some("F800"));
    }
}
