//! Host-side I/O: everything the catalog core deliberately never touches.
//!
//! The ingest, reconciliation, and filter modules only accept already-decoded
//! text or [`Workbook`] values. This module provides:
//!
//! - **[`HostIo`]**: the collaborator capabilities (`read_text`,
//!   `read_workbook`, `write_clipboard`, `trigger_download`).
//! - **[`FsHost`]**: a filesystem implementation used by the CLI.
//! - **Decoding**: input decoding via `encoding_rs`, defaulting to UTF-8, with
//!   the byte-order mark stripped.
//! - **Delimited readers**: lenient `csv` readers shared by the CSV ingest
//!   pipeline and the field-list loader.

use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};

use crate::{
    error::CatalogError,
    field_list::{Sheet, Workbook},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Capabilities the host environment lends to the catalog core.
pub trait HostIo {
    fn read_text(&self, path: &Path) -> Result<String>;
    fn read_workbook(&self, path: &Path, delimiter: Option<u8>) -> Result<Workbook>;
    fn write_clipboard(&self, text: &str) -> Result<()>;
    /// Persists `content` under `file_name` and returns where it landed.
    fn trigger_download(&self, file_name: &str, content: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct FsHost {
    encoding: &'static Encoding,
    download_dir: PathBuf,
}

impl Default for FsHost {
    fn default() -> Self {
        Self {
            encoding: UTF_8,
            download_dir: PathBuf::from("."),
        }
    }
}

impl FsHost {
    pub fn new(encoding: &'static Encoding, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            encoding,
            download_dir: download_dir.into(),
        }
    }
}

impl HostIo for FsHost {
    fn read_text(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).with_context(|| format!("Opening input file {path:?}"))?;
        decode_bytes(&bytes, self.encoding).with_context(|| format!("Decoding {path:?}"))
    }

    fn read_workbook(&self, path: &Path, delimiter: Option<u8>) -> Result<Workbook> {
        let text = self.read_text(path)?;
        if has_extension(path, "json") {
            let workbook: Workbook = serde_json::from_str(&text)
                .with_context(|| format!("Parsing workbook JSON {path:?}"))?;
            debug!("Loaded {} sheet(s) from {:?}", workbook.sheets.len(), path);
            return Ok(workbook);
        }
        let delimiter = resolve_input_delimiter(path, delimiter);
        let sheet_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Sheet1")
            .to_string();
        let rows = read_delimited_rows(&text, delimiter)
            .with_context(|| format!("Reading delimited rows from {path:?}"))?;
        Ok(Workbook {
            sheets: vec![Sheet {
                name: sheet_name,
                rows,
            }],
        })
    }

    fn write_clipboard(&self, text: &str) -> Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()?;
        Ok(())
    }

    fn trigger_download(&self, file_name: &str, content: &str) -> Result<PathBuf> {
        let target = self.download_dir.join(file_name);
        fs::write(&target, content).with_context(|| format!("Writing {target:?}"))?;
        info!("Saved {} byte(s) to {:?}", content.len(), target);
        Ok(target)
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| {
        if has_extension(path, "tsv") {
            DEFAULT_TSV_DELIMITER
        } else {
            DEFAULT_CSV_DELIMITER
        }
    })
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(expected))
}

/// Reader that tolerates ragged rows; column-count checks happen in validation.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn read_delimited_rows(text: &str, delimiter: u8) -> Result<Vec<Vec<String>>> {
    let mut reader = open_csv_reader(text.as_bytes(), delimiter);
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 1))?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(rows)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(CatalogError::Decode {
            encoding: encoding.name(),
        }
        .into())
    } else {
        Ok(strip_bom(&text).to_string())
    }
}

pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::BIG5;

    #[test]
    fn tsv_extension_selects_tab() {
        assert_eq!(resolve_input_delimiter(Path::new("fields.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("fields.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("fields.tsv"), Some(b';')), b';');
    }

    #[test]
    fn decode_strips_byte_order_mark() {
        let text = decode_bytes("\u{feff}Table名稱,市場".as_bytes(), UTF_8).expect("decode");
        assert_eq!(text, "Table名稱,市場");
    }

    #[test]
    fn decode_big5_input() {
        let (encoded, _, _) = BIG5.encode("市場");
        let text = decode_bytes(&encoded, BIG5).expect("decode big5");
        assert_eq!(text, "市場");
    }

    #[test]
    fn ragged_rows_are_kept() {
        let rows = read_delimited_rows("a,b,c\nd,e\n\"f,g\",h,i,j\n", b',').expect("rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["d", "e"]);
        assert_eq!(rows[2][0], "f,g");
    }
}
