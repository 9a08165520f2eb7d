//! Decoded tabular rows and metadata tables.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// One decoded row: column name → cell value, in column order.
///
/// Every record produced by a single decode carries the same key set; a
/// cell missing from a short row is stored as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Create an empty record with room for `columns` cells.
    pub fn with_capacity(columns: usize) -> Self {
        Self {
            fields: Vec::with_capacity(columns),
        }
    }

    /// Build a record from cells whose column names are already distinct.
    pub(crate) fn from_fields(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Set a cell. A repeated column name overwrites the earlier value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Value of `column`, if the column exists.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Cell values in column order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    /// `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A decoded metadata response: element attributes plus the record list.
///
/// Serializes as `{ <attributes...>, <list_name>: [records...] }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTable {
    /// Attributes of the metadata element(s) (`Version`, `Date`, `Resource`, ...).
    pub attributes: Vec<(String, String)>,
    /// Key the record list is published under (`Resources`, `Classes`, ...).
    pub list_name: String,
    /// Decoded rows in source order.
    pub records: Vec<Record>,
}

impl MetadataTable {
    /// Value of an element attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Merge an attribute, replacing any earlier value of the same name.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }
}

impl Serialize for MetadataTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // The record list shadows an attribute of the same name.
        let attrs: Vec<_> = self
            .attributes
            .iter()
            .filter(|(k, _)| *k != self.list_name)
            .collect();
        let mut map = serializer.serialize_map(Some(attrs.len() + 1))?;
        for (k, v) in attrs {
            map.serialize_entry(k, v)?;
        }
        map.serialize_entry(&self.list_name, &self.records)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_column_order() {
        let mut rec = Record::with_capacity(3);
        rec.insert("B", "2");
        rec.insert("A", "1");
        rec.insert("C", "");
        assert_eq!(rec.columns().collect::<Vec<_>>(), vec!["B", "A", "C"]);
        assert_eq!(rec.get("C"), Some(""));
        assert_eq!(rec.get("D"), None);
    }

    #[test]
    fn test_repeated_column_overwrites() {
        let mut rec = Record::default();
        rec.insert("A", "1");
        rec.insert("A", "2");
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.get("A"), Some("2"));
    }

    #[test]
    fn test_record_serializes_in_column_order() {
        let mut rec = Record::default();
        rec.insert("Z", "last");
        rec.insert("A", "first");
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"Z":"last","A":"first"}"#);
    }

    #[test]
    fn test_metadata_table_serialization() {
        let mut rec = Record::default();
        rec.insert("ResourceID", "Property");
        let mut table = MetadataTable {
            attributes: Vec::new(),
            list_name: "Resources".to_string(),
            records: vec![rec],
        };
        table.set_attribute("Version", "1.00.000");
        table.set_attribute("Version", "1.00.001");
        assert_eq!(table.attribute("Version"), Some("1.00.001"));

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["Version"], "1.00.001");
        assert_eq!(json["Resources"][0]["ResourceID"], "Property");
    }

    #[test]
    fn test_list_shadows_same_named_attribute() {
        let mut table = MetadataTable {
            attributes: vec![("Data".to_string(), "x".to_string())],
            list_name: "Data".to_string(),
            records: Vec::new(),
        };
        table.set_attribute("Date", "Tue, 01 Jan 2013 00:00:00 GMT");
        let json = serde_json::to_value(&table).unwrap();
        assert!(json["Data"].as_array().unwrap().is_empty());
        assert_eq!(json["Date"], "Tue, 01 Jan 2013 00:00:00 GMT");
    }
}
