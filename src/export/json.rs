//! Export decoded records and metadata tables as JSON.

use std::path::Path;

use serde::Serialize;

/// Write any decoded value (`[Record]`, `MetadataTable`, part summaries) as
/// pretty-printed JSON.
pub fn export_json<T: Serialize + ?Sized>(value: &T, output_path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(output_path)?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    std::io::Write::write_all(&mut writer, b"\n")?;
    Ok(())
}
