//! Parsing of raw data file content into records.
//!
//! Formats are usually inferred from a file extension. Plain text files
//! (`.txt`) are treated as JSON.

use std::{path::Path, str::FromStr};

use log::trace;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::{data::Record, Error};

/// The data formats that the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    /// Structured objects (JSON). Also used for `.txt` files.
    Json,
    /// Structured objects (YAML).
    Yaml,
    /// Comma-separated values with a header line.
    Csv,
    /// Tab-separated values with a header line.
    Tsv,
    /// Delimiter-separated values with a header line and a custom delimiter.
    Dsv(char),
}

impl FromStr for DataFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Ok(match lower.as_ref() {
            "json" | "txt" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            "csv" => Self::Csv,
            "tsv" => Self::Tsv,
            _ => return Err(Error::UnsupportedFormat(s.to_string())),
        })
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
            Self::Csv => write!(f, "csv"),
            Self::Tsv => write!(f, "tsv"),
            Self::Dsv(d) => write!(f, "dsv({:?})", d),
        }
    }
}

impl DataFormat {
    /// Infer the format from the extension of the given path or reference.
    ///
    /// Only the last extension counts, so `chart.vl.json` is JSON.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .ok_or_else(|| Error::CannotDetermineFormat(path.display().to_string()))?;
        Self::from_str(ext)
    }
}

/// Parse the given content in the given format, returning the whole parsed
/// structure.
///
/// Tabular formats always produce an array of objects.
pub fn parse_value(content: &str, format: DataFormat) -> Result<JsonValue, Error> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    trace!("Parsing {} bytes of {} content", content.len(), format);
    match format {
        DataFormat::Json => serde_json::from_str(content).map_err(|e| Error::format(format, e)),
        DataFormat::Yaml => serde_yaml::from_str(content).map_err(|e| Error::format(format, e)),
        DataFormat::Csv => parse_delimited(content, ',', format),
        DataFormat::Tsv => parse_delimited(content, '\t', format),
        DataFormat::Dsv(delimiter) => parse_delimited(content, delimiter, format),
    }
}

/// Parse the given content in the given format into a sequence of records.
///
/// A structured document that is not an array is returned as a single record.
pub fn parse(content: &str, format: DataFormat) -> Result<Vec<Record>, Error> {
    Ok(match parse_value(content, format)? {
        JsonValue::Array(rows) => rows,
        other => vec![other],
    })
}

// Tabular text follows RFC 4180: fields may be quoted, quoted fields may
// contain delimiters, line breaks and escaped ("") quotes. The first record
// provides the column names and all values are kept as strings.
//
// Blank lines are skipped, except inside a single-column table where they
// stand for an empty value. Trailing blank lines are always skipped.
fn parse_delimited(content: &str, delimiter: char, format: DataFormat) -> Result<JsonValue, Error> {
    let mut records = split_records(content, delimiter).map_err(|e| Error::format(format, e))?;
    while records.last().map_or(false, Vec::is_empty) {
        records.pop();
    }
    let mut lines = records
        .into_iter()
        .enumerate()
        .skip_while(|(_, fields)| fields.is_empty());
    let header = match lines.next() {
        Some((_, header)) => header
            .into_iter()
            .map(|name| name.trim().to_string())
            .collect::<Vec<String>>(),
        None => return Ok(JsonValue::Array(Vec::new())),
    };
    let mut rows = Vec::new();
    for (line_no, mut fields) in lines {
        if fields.is_empty() {
            if header.len() != 1 {
                continue;
            }
            fields.push(String::new());
        }
        if fields.len() != header.len() {
            return Err(Error::format(
                format,
                format!(
                    "record {} has {} fields, but the header has {}",
                    line_no + 1,
                    fields.len(),
                    header.len()
                ),
            ));
        }
        let row = header
            .iter()
            .cloned()
            .zip(fields.into_iter().map(JsonValue::String))
            .collect::<JsonMap<String, JsonValue>>();
        rows.push(JsonValue::Object(row));
    }
    Ok(JsonValue::Array(rows))
}

fn split_records(content: &str, delimiter: char) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut chars = content.chars().peekable();
    // Whether anything has been seen for the current record. Blank lines
    // become empty records.
    let mut dirty = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if field.is_empty() => {
                dirty = true;
                loop {
                    match chars.next() {
                        Some('"') => {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                field.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(c) => field.push(c),
                        None => return Err("unterminated quoted field".to_string()),
                    }
                }
                match chars.peek() {
                    Some(&c) if c == delimiter || c == '\n' || c == '\r' => (),
                    None => (),
                    Some(c) => return Err(format!("unexpected character {:?} after closing quote", c)),
                }
            }
            c if c == delimiter => {
                dirty = true;
                record.push(std::mem::take(&mut field));
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                if dirty {
                    record.push(std::mem::take(&mut field));
                    dirty = false;
                }
                records.push(std::mem::take(&mut record));
            }
            c => {
                dirty = true;
                field.push(c);
            }
        }
    }
    if dirty {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}
