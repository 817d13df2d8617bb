//! Test helpers for HealthDB integration tests
//!
//! - scratch stores in a temporary directory
//! - writers for export, GPX and ECG fixture files
//! - row counting

#![allow(dead_code)]

use healthdb_common::config::StoreConfig;
use healthdb_ingest::db;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A fresh store plus a scratch directory for input files
pub struct TestStore {
    pub dir: TempDir,
    pub pool: SqlitePool,
}

impl TestStore {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = StoreConfig::at(dir.path().join("health.sqlite"));
        let pool = db::open_store(&config)
            .await
            .expect("Failed to open test store");

        Self { dir, pool }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create (if needed) a sub-directory of the scratch directory
    pub fn subdir(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path).expect("Failed to create sub-directory");
        path
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count rows")
    }

    pub async fn ids(&self, table: &str) -> Vec<i64> {
        sqlx::query_scalar(&format!("SELECT id FROM {table} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .expect("Failed to read ids")
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write fixture");
    path
}

// ============================================================================
// Fixtures
// ============================================================================

/// Wrap entity elements in an export document
pub fn export_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE HealthData>
<HealthData locale="en_US">
 <ExportDate value="2024-01-20 10:00:00 +0100"/>
 <Me HKCharacteristicTypeIdentifierDateOfBirth="1990-01-01"/>
{body}
</HealthData>
"#
    )
}

/// A self-closing Record element
pub fn record(record_type: &str, value: &str, unit: &str, source: &str) -> String {
    format!(
        r#" <Record type="{record_type}" sourceName="{source}" sourceVersion="17.2" unit="{unit}" creationDate="2024-01-18 09:20:00 +0100" startDate="2024-01-18 09:00:00 +0100" endDate="2024-01-18 09:15:00 +0100" value="{value}"/>"#
    )
}

/// A Record carrying `MetadataEntry` children
pub fn record_with_metadata(record_type: &str, value: &str, entries: &[(&str, &str)]) -> String {
    let children: String = entries
        .iter()
        .map(|(key, value)| format!("  <MetadataEntry key=\"{key}\" value=\"{value}\"/>\n"))
        .collect();

    format!(
        " <Record type=\"{record_type}\" sourceName=\"Watch\" unit=\"count/min\" startDate=\"2024-01-18 09:00:00 +0100\" value=\"{value}\">\n{children} </Record>"
    )
}

pub fn workout(activity: &str, source: &str) -> String {
    format!(
        r#" <Workout workoutActivityType="{activity}" duration="30.5" durationUnit="min" totalDistance="5.2" totalDistanceUnit="km" totalEnergyBurned="310" totalEnergyBurnedUnit="kcal" sourceName="{source}" startDate="2024-01-18 07:00:00 +0100" endDate="2024-01-18 07:30:30 +0100"/>"#
    )
}

/// GPX document with the usual default namespace
pub fn gpx(points: &[(f64, f64)]) -> String {
    let trkpts: String = points
        .iter()
        .enumerate()
        .map(|(i, (lat, lon))| {
            format!(
                "   <trkpt lat=\"{lat}\" lon=\"{lon}\"><ele>{}</ele><time>2024-01-18T07:{:02}:00Z</time></trkpt>\n",
                10.0 + i as f64,
                i
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Health" xmlns="http://www.topografix.com/GPX/1/1">
 <trk>
  <name>Route</name>
  <trkseg>
{trkpts}  </trkseg>
 </trk>
</gpx>
"#
    )
}

/// ECG export with a metadata header followed by samples
pub fn ecg_csv(sample_rate: &str, samples: &[f64]) -> String {
    let mut csv = String::from(
        "Name,Jane Doe\n\
         Date of Birth,\"Jan 1, 1990\"\n\
         Recorded Date,2024-01-18 09:15:02 +0100\n\
         Classification,Sinus Rhythm\n\
         Symptoms,\n\
         Software Version,2.0\n\
         Device,\"Watch7,4\"\n",
    );
    csv.push_str(&format!("Sample Rate,{sample_rate}\n\nLead,Lead I\nUnit,µV\n\n"));
    for sample in samples {
        csv.push_str(&format!("{sample}\n"));
    }
    csv
}
