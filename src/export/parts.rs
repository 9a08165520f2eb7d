//! Write decoded multipart parts to disk.

use std::path::{Path, PathBuf};

use crate::model::part::Part;

/// Export a single part to `output_dir`, never overwriting an existing file.
///
/// Returns the path of the created file.
pub fn export_part(part: &Part, ordinal: usize, output_dir: &Path) -> anyhow::Result<PathBuf> {
    let filename = part_file_name(part, ordinal);
    let path = unique_path(&output_dir.join(&filename));
    std::fs::write(&path, &part.payload)?;
    Ok(path)
}

/// Export every part to `output_dir`.
///
/// A part that fails to write is logged and skipped. The progress callback
/// receives `(current, total)`.
pub fn export_parts(
    parts: &[Part],
    output_dir: &Path,
    progress: &dyn Fn(usize, usize),
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut paths = Vec::with_capacity(parts.len());
    let total = parts.len();

    for (i, part) in parts.iter().enumerate() {
        progress(i, total);
        match export_part(part, i + 1, output_dir) {
            Ok(path) => paths.push(path),
            Err(e) => {
                tracing::warn!(
                    part = i + 1,
                    content_id = part.content_id.as_deref().unwrap_or(""),
                    error = %e,
                    "Failed to export part"
                );
            }
        }
    }
    progress(total, total);

    Ok(paths)
}

/// Pick a file name for a part.
///
/// Preference: the disposition filename; then `{content-id}_{object-id}`
/// (listing and photo number in GetObject responses); then `part_{n}`.
/// An extension is derived from the MIME type when the name has none.
pub fn part_file_name(part: &Part, ordinal: usize) -> String {
    if let Some(name) = part.filename.as_deref().filter(|n| !n.is_empty()) {
        let name = sanitize_filename_part(name, 150);
        if Path::new(&name).extension().is_some() {
            return name;
        }
        return with_extension(name, part);
    }

    let stem = match (part.content_id.as_deref(), part.object_id.as_deref()) {
        (Some(cid), Some(oid)) => format!(
            "{}_{}",
            sanitize_filename_part(cid, 80),
            sanitize_filename_part(oid, 40)
        ),
        (Some(id), None) | (None, Some(id)) => sanitize_filename_part(id, 120),
        (None, None) => format!("part_{ordinal}"),
    };
    with_extension(stem, part)
}

fn with_extension(stem: String, part: &Part) -> String {
    match part.essence().as_deref().and_then(mime_extension) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// File extension for common object MIME types.
fn mime_extension(essence: &str) -> Option<&'static str> {
    let ext = match essence {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/tiff" => "tif",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/xml" | "application/xml" => "xml",
        "video/mp4" => "mp4",
        "application/octet-stream" => "bin",
        _ => return None,
    };
    Some(ext)
}

/// Sanitize a string for use in filenames.
///
/// Replaces invalid characters with `_` and truncates to `max_len`.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    parent.join(format!("{stem}_dup.{ext}"))
}
