//! Export decoded records to CSV.
//!
//! Output is UTF-8 with BOM for Excel compatibility.

use std::io::Write;
use std::path::Path;

use crate::model::record::Record;

/// Export records to a CSV file.
///
/// The header row is the first record's column list; all records of one
/// decode share it, so their cells are written in order. A record with a
/// different layout is written by column lookup. An empty record list
/// writes only the BOM.
pub fn export_csv(records: &[Record], output_path: &Path, separator: char) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(output_path)?;
    write_csv(&mut file, records, separator)?;
    Ok(())
}

/// Write records as CSV to any writer.
pub fn write_csv<W: Write>(out: &mut W, records: &[Record], separator: char) -> anyhow::Result<()> {
    // UTF-8 BOM for Excel
    out.write_all(&[0xEF, 0xBB, 0xBF])?;

    let Some(first) = records.first() else {
        return Ok(());
    };
    let sep = separator.to_string();
    let columns: Vec<&str> = first.columns().collect();

    let header = columns
        .iter()
        .map(|c| csv_escape(c, separator))
        .collect::<Vec<_>>()
        .join(&sep);
    writeln!(out, "{header}")?;

    for record in records {
        let same_layout =
            record.len() == columns.len() && record.columns().eq(columns.iter().copied());
        let cells: Vec<String> = if same_layout {
            record.values().map(|v| csv_escape(v, separator)).collect()
        } else {
            columns
                .iter()
                .map(|c| csv_escape(record.get(c).unwrap_or(""), separator))
                .collect()
        };
        writeln!(out, "{}", cells.join(&sep))?;
    }

    Ok(())
}

/// Escape a value for CSV (RFC 4180).
///
/// Wraps in double quotes if the value contains the separator, quotes, or newlines.
fn csv_escape(value: &str, separator: char) -> String {
    if value.contains(separator) || value.contains('"') || value.contains('\n') || value.contains('\r')
    {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_escape_simple() {
        assert_eq!(csv_escape("hello", ','), "hello");
    }

    #[test]
    fn test_csv_escape_separator() {
        assert_eq!(csv_escape("hello, world", ','), "\"hello, world\"");
        assert_eq!(csv_escape("a;b", ';'), "\"a;b\"");
        assert_eq!(csv_escape("a;b", ','), "a;b");
    }

    #[test]
    fn test_csv_escape_quotes() {
        assert_eq!(csv_escape("say \"hi\"", ','), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_write_csv() {
        let mut a = Record::default();
        a.insert("ID", "1");
        a.insert("City", "Salt Lake City, UT");
        let mut b = Record::default();
        b.insert("ID", "2");
        b.insert("City", "");

        let mut buf = Vec::new();
        write_csv(&mut buf, &[a, b], ',').unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "\u{feff}ID,City\n1,\"Salt Lake City, UT\"\n2,\n"
        );
    }

    #[test]
    fn test_write_csv_foreign_layout_follows_header() {
        let mut a = Record::default();
        a.insert("ID", "1");
        a.insert("City", "Provo");
        let mut b = Record::default();
        b.insert("City", "Ogden");
        b.insert("Extra", "x");

        let mut buf = Vec::new();
        write_csv(&mut buf, &[a, b], ',').unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "\u{feff}ID,City\n1,Provo\n,Ogden\n");
    }

    #[test]
    fn test_write_csv_empty() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[], ',').unwrap();
        assert_eq!(buf, vec![0xEF, 0xBB, 0xBF]);
    }
}
