//! Job sources: a plain list (one address per line) or a CSV file with an
//! `email` header column.

use std::path::Path;

use super::JobError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One input record, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEntry {
    Address(String),
    /// Not valid UTF-8 or carrying control characters. `raw` is the lossy
    /// text, kept for the artifact.
    Unreadable { record: u64, raw: String },
}

/// Read every entry of `path`.
///
/// # Errors
///
/// [`JobError::Source`] when the file is missing, unreadable or malformed
/// CSV. Bad individual records are returned as
/// [`SourceEntry::Unreadable`] instead.
pub async fn read_source(path: &Path) -> Result<Vec<SourceEntry>, JobError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| JobError::bad_source(path, err))?;
    parse_source(&bytes).map_err(|err| JobError::bad_source(path, err))
}

pub(crate) fn parse_source(bytes: &[u8]) -> Result<Vec<SourceEntry>, csv::Error> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let email_column = reader
        .byte_headers()?
        .iter()
        .position(|field| field.eq_ignore_ascii_case(b"email"));

    match email_column {
        Some(column) => {
            let mut entries = Vec::new();
            for (idx, record) in reader.byte_records().enumerate() {
                let record = record?;
                if let Some(field) = record.get(column) {
                    push_entry(&mut entries, idx as u64 + 1, field);
                }
            }
            Ok(entries)
        }
        None => Ok(plain_list(bytes)),
    }
}

fn plain_list(bytes: &[u8]) -> Vec<SourceEntry> {
    let mut entries = Vec::new();
    for (idx, line) in bytes.split(|byte| *byte == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        push_entry(&mut entries, idx as u64, line.trim_ascii());
    }
    entries
}

fn push_entry(entries: &mut Vec<SourceEntry>, record: u64, field: &[u8]) {
    if field.is_empty() {
        return;
    }
    match std::str::from_utf8(field) {
        Ok(text) if !text.chars().any(char::is_control) => {
            entries.push(SourceEntry::Address(text.to_string()));
        }
        _ => entries.push(SourceEntry::Unreadable {
            record,
            raw: String::from_utf8_lossy(field)
                .chars()
                .filter(|ch| !ch.is_control())
                .collect(),
        }),
    }
}
