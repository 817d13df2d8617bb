//! ECG persistence

use super::{keys, parse_ecg_file, parse_sample_rate, EcgFile, ECG_EXTENSION};
use crate::config::PostprocessOptions;
use crate::db::{insert_with_children, schema, ChildRow, IdSequence, TableRow};
use crate::error::Result;
use crate::tracker::{pending_files, stored_path, FileOutcome, IngestedPaths};
use sqlx::query_builder::Separated;
use sqlx::{Sqlite, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

const ECG_TABLE: &str = "ecg_records";

/// Header of one recording, ready to insert
#[derive(Debug, Clone, PartialEq)]
struct EcgRecordRow {
    id: i64,
    file_path: String,
    recorded_date: Option<String>,
    classification: Option<String>,
    symptoms: Option<String>,
    sample_rate_hz: Option<f64>,
    lead: Option<String>,
    unit: Option<String>,
    device: Option<String>,
    software_version: Option<String>,
    extra_json: String,
}

impl EcgRecordRow {
    fn from_file(id: i64, file_path: String, file: &EcgFile) -> Result<Self> {
        let header = &file.metadata;
        let promoted = |key: &str| header.get(key).map(str::to_string);

        Ok(Self {
            id,
            file_path,
            recorded_date: promoted(keys::RECORDED_DATE),
            classification: promoted(keys::CLASSIFICATION),
            symptoms: promoted(keys::SYMPTOMS),
            sample_rate_hz: parse_sample_rate(header.get(keys::SAMPLE_RATE))?,
            lead: promoted(keys::LEAD),
            unit: promoted(keys::UNIT),
            device: promoted(keys::DEVICE),
            software_version: promoted(keys::SOFTWARE_VERSION),
            extra_json: header.to_json()?,
        })
    }
}

impl TableRow for EcgRecordRow {
    const TABLE: &'static str = ECG_TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "file_path",
        "recorded_date",
        "classification",
        "symptoms",
        "sample_rate_hz",
        "lead",
        "unit",
        "device",
        "software_version",
        "extra_json",
    ];
    const INSERT: &'static str = "INSERT OR IGNORE";

    fn bind_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.file_path.clone())
            .push_bind(self.recorded_date.clone())
            .push_bind(self.classification.clone())
            .push_bind(self.symptoms.clone())
            .push_bind(self.sample_rate_hz)
            .push_bind(self.lead.clone())
            .push_bind(self.unit.clone())
            .push_bind(self.device.clone())
            .push_bind(self.software_version.clone())
            .push_bind(self.extra_json.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct EcgSampleRow {
    ecg_id: i64,
    sample_index: i64,
    value: f64,
}

impl TableRow for EcgSampleRow {
    const TABLE: &'static str = "ecg_samples";
    const COLUMNS: &'static [&'static str] = &["ecg_id", "sample_index", "value"];

    fn bind_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        row.push_bind(self.ecg_id)
            .push_bind(self.sample_index)
            .push_bind(self.value);
    }
}

impl ChildRow for EcgSampleRow {
    fn parent_id(&self) -> i64 {
        self.ecg_id
    }
}

/// Imports a directory of ECG CSV files
pub struct EcgIngester<'p> {
    pool: &'p SqlitePool,
    skip_existing: bool,
    flush_threshold: usize,
}

impl<'p> EcgIngester<'p> {
    pub fn new(pool: &'p SqlitePool, options: &PostprocessOptions) -> Self {
        Self {
            pool,
            skip_existing: options.skip_existing,
            flush_threshold: options.flush_threshold.max(1),
        }
    }

    /// Import every pending ECG file; returns the number of recordings added
    pub async fn ingest_dir(&self, dir: &Path) -> Result<u64> {
        schema::create_aux_tables(self.pool).await?;

        let ingested = if self.skip_existing {
            IngestedPaths::load(self.pool, ECG_TABLE).await?
        } else {
            IngestedPaths::none()
        };
        let files = pending_files(dir, ECG_EXTENSION, &ingested)?;

        let mut ids = IdSequence::seed(self.pool, ECG_TABLE).await?;
        let mut records = Vec::new();
        let mut samples = Vec::new();
        let mut added = 0u64;

        for path in files {
            let file_path = stored_path(&path);
            let file = parse_ecg_file(&path)?;

            if file.samples.is_empty() {
                FileOutcome::Empty.log(&file_path);
                continue;
            }

            let ecg_id = ids.advance();
            debug!(path = %file_path, ecg_id, samples = file.samples.len(), "Parsed ECG");

            records.push(EcgRecordRow::from_file(ecg_id, file_path, &file)?);
            samples.extend(file.samples.iter().enumerate().map(|(index, &value)| EcgSampleRow {
                ecg_id,
                sample_index: index as i64,
                value,
            }));

            if samples.len() >= self.flush_threshold {
                added += self.flush(&mut records, &mut samples).await?;
            }
        }

        added += self.flush(&mut records, &mut samples).await?;
        schema::create_ecg_indexes(self.pool).await?;

        info!(dir = %dir.display(), ecgs = added, "ECG recordings imported");
        Ok(added)
    }

    async fn flush(
        &self,
        records: &mut Vec<EcgRecordRow>,
        samples: &mut Vec<EcgSampleRow>,
    ) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let written = insert_with_children(&mut tx, records.as_slice(), samples.as_slice()).await?;
        tx.commit().await?;

        for record in records.iter() {
            let outcome = if written.contains(&record.id) {
                FileOutcome::Ingested
            } else {
                FileOutcome::Duplicate
            };
            outcome.log(&record.file_path);
        }

        debug!(ecgs = written.len(), samples = samples.len(), "Committed ECG batch");
        records.clear();
        samples.clear();

        Ok(written.len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_promoted_columns_and_blob() {
        let file = super::super::parse_ecg_csv(
            "Recorded Date,2024-01-18\nSample Rate,300 Hz\nName,Jane\n1\n2\n".as_bytes(),
        )
        .unwrap();

        let row = EcgRecordRow::from_file(7, "ecg/a.csv".to_string(), &file).unwrap();
        assert_eq!(row.recorded_date.as_deref(), Some("2024-01-18"));
        assert_eq!(row.sample_rate_hz, Some(300.0));
        assert_eq!(row.classification, None);
        assert_eq!(
            row.extra_json,
            r#"{"Recorded Date":"2024-01-18","Sample Rate":"300 Hz","Name":"Jane"}"#
        );
    }
}
