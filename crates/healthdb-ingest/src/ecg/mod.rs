//! ECG waveform import
//!
//! One CSV file per recording. The header becomes an `ecg_records` row (a few
//! promoted columns plus the whole header as JSON) and the waveform becomes
//! `ecg_samples` rows.

pub mod parser;
pub mod storage;

pub use parser::{parse_ecg_csv, parse_ecg_file, parse_sample_rate, EcgFile};
pub use storage::EcgIngester;

/// Extension of ECG files
pub const ECG_EXTENSION: &str = "csv";

/// Header keys promoted to their own columns
pub mod keys {
    pub const RECORDED_DATE: &str = "Recorded Date";
    pub const CLASSIFICATION: &str = "Classification";
    pub const SYMPTOMS: &str = "Symptoms";
    pub const SAMPLE_RATE: &str = "Sample Rate";
    pub const LEAD: &str = "Lead";
    pub const UNIT: &str = "Unit";
    pub const DEVICE: &str = "Device";
    pub const SOFTWARE_VERSION: &str = "Software Version";
}
