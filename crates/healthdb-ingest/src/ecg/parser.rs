//! ECG CSV parsing
//!
//! An exported ECG mixes a metadata header with the waveform. Rows are
//! classified by shape, not position:
//!
//! - one field that is a decimal number: a sample (µV)
//! - two or more fields: `key,value` metadata; extra fields are ignored
//! - anything else: discarded

use crate::error::Result;
use crate::export::models::AttributeList;
use regex::Regex;
use std::io::Read;
use std::path::Path;

/// Parsed content of one ECG file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EcgFile {
    /// Header entries in first-seen order; a repeated key keeps its last value
    pub metadata: AttributeList,
    pub samples: Vec<f64>,
}

pub fn parse_ecg_file(path: &Path) -> Result<EcgFile> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    parse_records(reader)
}

pub fn parse_ecg_csv<R: Read>(source: R) -> Result<EcgFile> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source);
    parse_records(reader)
}

fn parse_records<R: Read>(mut reader: csv::Reader<R>) -> Result<EcgFile> {
    let sample = Regex::new(r"^[+-]?[0-9]+(\.[0-9]+)?$")?;
    let mut file = EcgFile::default();

    for record in reader.records() {
        let record = record?;

        match record.len() {
            0 => {},
            1 => {
                let value = record[0].trim();
                if sample.is_match(value) {
                    if let Ok(parsed) = value.parse::<f64>() {
                        file.samples.push(parsed);
                    }
                }
            },
            _ => file.metadata.set(record[0].trim(), record[1].trim()),
        }
    }

    Ok(file)
}

/// Sample rate in Hz: the first decimal number anywhere in the value
///
/// `"512 Hz"` gives 512.0; a missing value or one without digits gives `None`.
pub fn parse_sample_rate(value: Option<&str>) -> Result<Option<f64>> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let number = Regex::new(r"([0-9]+(\.[0-9]+)?)")?;
    Ok(number
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok()))
}
