//! I/O utilities for reading delimited input into rows.
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.tsv` → tab,
//!   anything else → comma) with manual override support.
//! - **Encoding**: input bytes are decoded with `encoding_rs`, defaulting to
//!   UTF-8. Malformed sequences are replaced rather than fatal.
//! - **stdin**: the `-` path convention reads standard input.
//!
//! Rows come back exactly as parsed: no header handling happens here, the
//! first record of a headed file is simply row 0. Empty cells become absent.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::warn;

use crate::{Cell, Row, error::ConfigError};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
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
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn parse_delimiter(value: &str) -> Result<u8, ConfigError> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(first), None) if first.is_ascii() => Ok(first as u8),
                _ => Err(ConfigError::InvalidDelimiter(other.to_string())),
            }
        }
    }
}

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

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
}

/// Decodes one field. Returns the text and whether replacement characters
/// had to be substituted.
pub fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> (Cell, bool) {
    if bytes.is_empty() {
        return (None, false);
    }
    let (text, _, had_errors) = encoding.decode(bytes);
    (Some(text.into_owned()), had_errors)
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> (Row, bool) {
    let mut lossy = false;
    let row: Row = record
        .iter()
        .map(|field| {
            let (cell, had_errors) = decode_field(field, encoding);
            lossy |= had_errors;
            cell
        })
        .collect();
    (row, lossy)
}

/// Reads every record from `reader` into memory.
pub fn read_rows<R: Read>(
    reader: csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let mut lossy_rows = 0usize;
    for (ordinal, result) in reader.into_byte_records().enumerate() {
        let record = result.with_context(|| format!("Reading row {}", ordinal + 1))?;
        let (row, lossy) = decode_record(&record, encoding);
        if lossy {
            lossy_rows += 1;
        }
        rows.push(row);
    }
    if lossy_rows > 0 {
        warn!(
            "Replaced malformed {} sequences in {lossy_rows} row(s)",
            encoding.name()
        );
    }
    Ok(rows)
}

pub fn read_rows_from_path(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<Row>> {
    let reader = open_csv_reader_from_path(path, delimiter)?;
    read_rows(reader, encoding).with_context(|| format!("Reading rows from {path:?}"))
}
