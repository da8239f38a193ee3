//! Compressed tabular sources.
//!
//! The bundled datasets ship as `.csv.zip` (single-entry archive), but plain
//! `.csv` and `.csv.gz` are accepted too. The encoding is chosen by file name.

use crate::error::{DeskError, DeskResult};
use flate2::read::GzDecoder;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Gzip,
    Zip,
}

impl Encoding {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => Encoding::Gzip,
            Some(ext) if ext.eq_ignore_ascii_case("zip") => Encoding::Zip,
            _ => Encoding::Plain,
        }
    }
}

/// Open a tabular file and return a reader over its decoded bytes.
pub fn open_tabular(path: &Path) -> DeskResult<Box<dyn Read>> {
    let encoding = Encoding::from_path(path);
    log::debug!("opening {} as {encoding:?}", path.display());
    match encoding {
        Encoding::Plain => Ok(Box::new(BufReader::new(std::fs::File::open(path)?))),
        Encoding::Gzip => Ok(Box::new(GzDecoder::new(BufReader::new(
            std::fs::File::open(path)?,
        )))),
        Encoding::Zip => {
            let file = BufReader::new(std::fs::File::open(path)?);
            zip_single_entry(file, &path.display().to_string())
        }
    }
}

/// Decode the first regular file of a zip archive. Directory entries and
/// macOS resource forks are skipped.
pub fn zip_single_entry<R: Read + Seek>(reader: R, label: &str) -> DeskResult<Box<dyn Read>> {
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| bad_archive(label, &e.to_string()))?;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| bad_archive(label, &e.to_string()))?;
        if entry.is_dir() || entry.name().starts_with("__MACOSX") {
            continue;
        }
        log::debug!(
            "{label}: reading zip entry '{}' ({} bytes compressed)",
            entry.name(),
            entry.compressed_size()
        );
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        return Ok(Box::new(Cursor::new(data)));
    }
    Err(bad_archive(label, "archive contains no file entry"))
}

fn bad_archive(label: &str, message: &str) -> DeskError {
    DeskError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("{label}: {message}"),
    ))
}
