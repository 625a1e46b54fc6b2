//! Re-emitting fixed text as UTF-8 with a byte-order mark.

use std::collections::HashSet;
use std::fs;
use std::io::Seek;
use std::io::Write;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use log::debug;
use log::info;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

use crate::error::ExportError;
use crate::FixedRecord;
use crate::UTF_8_BOM;

/// `EF BB BF` followed by the UTF-8 bytes of `text`.
pub fn output_bytes(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(UTF_8_BOM.len() + text.len());
    bytes.extend_from_slice(&UTF_8_BOM);
    bytes.extend_from_slice(text.as_bytes());
    bytes
}

/// Archive entry name for a relative path: `/`-separated, no `.`/`..`.
fn entry_name(relative_path: &Path) -> Result<String, ExportError> {
    let mut parts = Vec::new();
    for component in relative_path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir => {}
            _ => {
                return Err(ExportError::UnsafePath(
                    relative_path.display().to_string(),
                ))
            }
        }
    }
    if parts.is_empty() {
        return Err(ExportError::UnsafePath(relative_path.display().to_string()));
    }
    Ok(parts.join("/"))
}

/// Returns `path`, or `stem (n).ext` with the lowest free `n` when `path`
/// was already taken.
fn unique_path(path: &Path, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let path: PathBuf = path
        .components()
        .filter(|c| *c != Component::CurDir)
        .collect();
    if taken.insert(path.clone()) {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 2;
    loop {
        let candidate = path.with_file_name(format!("{} ({}){}", stem, n, ext));
        if taken.insert(candidate.clone()) {
            debug!("{} renamed to {}", path.display(), candidate.display());
            return candidate;
        }
        n += 1;
    }
}

/// `(relative path, BOM-prefixed bytes)` for every fixed record.
///
/// Records sharing a relative path get numbered names so none is lost.
pub fn entries(records: &[FixedRecord]) -> Vec<(PathBuf, Vec<u8>)> {
    let mut taken = HashSet::new();
    records
        .iter()
        .filter_map(|record| {
            record.fixed_text().map(|text| {
                let path = unique_path(record.raw().relative_path(), &mut taken);
                (path, output_bytes(text))
            })
        })
        .collect()
}

/// Writes a deflated zip of `entries` to `writer`.
pub fn write_archive<W: Write + Seek>(
    entries: &[(PathBuf, Vec<u8>)],
    writer: W,
) -> Result<W, ExportError> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (path, bytes) in entries {
        let name = entry_name(path)?;
        debug!("adding {} ({} bytes)", name, bytes.len());
        zip.start_file(name, options)?;
        zip.write_all(bytes)?;
    }
    Ok(zip.finish()?)
}

pub fn archive_name(now: DateTime<Utc>) -> String {
    format!("Fixed_CUE_Files_{}.zip", now.timestamp_millis())
}

/// Writes each entry under `dir`, recreating its relative directories.
pub fn write_tree(entries: &[(PathBuf, Vec<u8>)], dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    let mut written = Vec::with_capacity(entries.len());
    for (path, bytes) in entries {
        let target = dir.join(entry_name(path)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        written.push(target);
    }
    Ok(written)
}

/// Where [`export`] put its output.
#[derive(Debug, PartialEq, Eq)]
pub enum Exported {
    Nothing,
    File(PathBuf),
    Archive(PathBuf),
    Tree(Vec<PathBuf>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// A lone fixed record is written as a file, several as one archive.
    Auto,
    Archive,
    Tree,
}

/// Emits every fixed record into `out_dir` according to `mode`.
pub fn export(
    records: &[FixedRecord],
    out_dir: &Path,
    mode: ExportMode,
) -> Result<Exported, ExportError> {
    let entries = entries(records);
    if entries.is_empty() {
        return Ok(Exported::Nothing);
    }
    fs::create_dir_all(out_dir)?;
    let exported = match mode {
        ExportMode::Auto if entries.len() == 1 => {
            let (path, bytes) = &entries[0];
            let name = path.file_name().map_or_else(|| path.clone(), PathBuf::from);
            let target = out_dir.join(name);
            fs::write(&target, bytes)?;
            Exported::File(target)
        }
        ExportMode::Auto | ExportMode::Archive => {
            let target = out_dir.join(archive_name(Utc::now()));
            write_archive(&entries, fs::File::create(&target)?)?;
            Exported::Archive(target)
        }
        ExportMode::Tree => Exported::Tree(write_tree(&entries, out_dir)?),
    };
    info!("exported {} records: {:?}", entries.len(), exported);
    Ok(exported)
}
