//! Buffered, batched writes of export entities
//!
//! Rows are buffered per destination table. As soon as one buffer reaches the
//! batch size, every buffer is written inside one transaction which is then
//! committed, so an interrupted run keeps all batches committed before it.

use crate::db::{insert_rows, IdSequence, TableRow};
use crate::error::Result;
use crate::export::models::{
    ActivitySummary, Audiogram, ClinicalRecord, Correlation, EntityKind, ExportEntity,
    MetadataEntry, Record, SourceInfo, Timestamps, VisionPrescription, Workout,
};
use serde::Serialize;
use sqlx::query_builder::Separated;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

type Row<'qb, 'args> = Separated<'qb, 'args, Sqlite, &'static str>;

/// An entity paired with the id assigned to it
#[derive(Debug, Clone, PartialEq)]
pub struct Identified<E> {
    pub id: i64,
    pub entity: E,
}

/// One row of the metadata side-table
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMetadataRow {
    pub record_id: i64,
    pub key: Option<String>,
    pub value: Option<String>,
}

fn bind_source(row: &mut Row<'_, '_>, source: &SourceInfo) {
    row.push_bind(source.source_name.clone())
        .push_bind(source.source_version.clone())
        .push_bind(source.device.clone());
}

fn bind_times(row: &mut Row<'_, '_>, times: &Timestamps) {
    row.push_bind(times.creation_date.clone())
        .push_bind(times.start_date.clone())
        .push_bind(times.end_date.clone());
}

impl TableRow for Identified<Record> {
    const TABLE: &'static str = "records";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "type",
        "unit",
        "value",
        "source_name",
        "source_version",
        "device",
        "creation_date",
        "start_date",
        "end_date",
    ];

    fn bind_columns(&self, row: &mut Row<'_, '_>) {
        let record = &self.entity;
        row.push_bind(self.id)
            .push_bind(record.record_type.clone())
            .push_bind(record.unit.clone())
            .push_bind(record.value.clone());
        bind_source(row, &record.source);
        bind_times(row, &record.times);
    }
}

impl TableRow for Identified<Workout> {
    const TABLE: &'static str = "workouts";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "workout_activity_type",
        "duration",
        "duration_unit",
        "total_energy_burned",
        "total_energy_burned_unit",
        "total_distance",
        "total_distance_unit",
        "source_name",
        "source_version",
        "device",
        "creation_date",
        "start_date",
        "end_date",
    ];

    fn bind_columns(&self, row: &mut Row<'_, '_>) {
        let workout = &self.entity;
        row.push_bind(self.id)
            .push_bind(workout.activity_type.clone())
            .push_bind(workout.duration)
            .push_bind(workout.duration_unit.clone())
            .push_bind(workout.total_energy_burned)
            .push_bind(workout.total_energy_burned_unit.clone())
            .push_bind(workout.total_distance)
            .push_bind(workout.total_distance_unit.clone());
        bind_source(row, &workout.source);
        bind_times(row, &workout.times);
    }
}

impl TableRow for Identified<Correlation> {
    const TABLE: &'static str = "correlations";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "type",
        "source_name",
        "source_version",
        "device",
        "creation_date",
        "start_date",
        "end_date",
    ];

    fn bind_columns(&self, row: &mut Row<'_, '_>) {
        row.push_bind(self.id)
            .push_bind(self.entity.correlation_type.clone());
        bind_source(row, &self.entity.source);
        bind_times(row, &self.entity.times);
    }
}

impl TableRow for Identified<ActivitySummary> {
    const TABLE: &'static str = "activity_summaries";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "date_components",
        "active_energy_burned",
        "active_energy_burned_goal",
        "active_energy_burned_unit",
        "apple_move_time",
        "apple_move_time_goal",
        "apple_exercise_time",
        "apple_exercise_time_goal",
        "apple_stand_hours",
        "apple_stand_hours_goal",
    ];

    fn bind_columns(&self, row: &mut Row<'_, '_>) {
        let summary = &self.entity;
        row.push_bind(self.id)
            .push_bind(summary.date_components.clone())
            .push_bind(summary.active_energy_burned)
            .push_bind(summary.active_energy_burned_goal)
            .push_bind(summary.active_energy_burned_unit.clone())
            .push_bind(summary.apple_move_time)
            .push_bind(summary.apple_move_time_goal)
            .push_bind(summary.apple_exercise_time)
            .push_bind(summary.apple_exercise_time_goal)
            .push_bind(summary.apple_stand_hours)
            .push_bind(summary.apple_stand_hours_goal);
    }
}

/// Opaque entities carry their leftover attributes pre-serialized
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueRow<E> {
    pub id: i64,
    pub entity: E,
    pub extra_json: String,
}

impl TableRow for OpaqueRow<ClinicalRecord> {
    const TABLE: &'static str = "clinical_records";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "type",
        "source_name",
        "source_version",
        "device",
        "creation_date",
        "start_date",
        "end_date",
        "display_name",
        "extra_json",
    ];

    fn bind_columns(&self, row: &mut Row<'_, '_>) {
        row.push_bind(self.id)
            .push_bind(self.entity.record_type.clone());
        bind_source(row, &self.entity.source);
        bind_times(row, &self.entity.times);
        row.push_bind(self.entity.display_name.clone())
            .push_bind(self.extra_json.clone());
    }
}

const OPAQUE_COLUMNS: &[&str] = &[
    "id",
    "source_name",
    "source_version",
    "device",
    "creation_date",
    "start_date",
    "end_date",
    "extra_json",
];

impl TableRow for OpaqueRow<Audiogram> {
    const TABLE: &'static str = "audiograms";
    const COLUMNS: &'static [&'static str] = OPAQUE_COLUMNS;

    fn bind_columns(&self, row: &mut Row<'_, '_>) {
        row.push_bind(self.id);
        bind_source(row, &self.entity.source);
        bind_times(row, &self.entity.times);
        row.push_bind(self.extra_json.clone());
    }
}

impl TableRow for OpaqueRow<VisionPrescription> {
    const TABLE: &'static str = "vision_prescriptions";
    const COLUMNS: &'static [&'static str] = OPAQUE_COLUMNS;

    fn bind_columns(&self, row: &mut Row<'_, '_>) {
        row.push_bind(self.id);
        bind_source(row, &self.entity.source);
        bind_times(row, &self.entity.times);
        row.push_bind(self.extra_json.clone());
    }
}

impl TableRow for RecordMetadataRow {
    const TABLE: &'static str = "record_metadata";
    const COLUMNS: &'static [&'static str] = &["record_id", "key", "value"];

    fn bind_columns(&self, row: &mut Row<'_, '_>) {
        row.push_bind(self.record_id)
            .push_bind(self.key.clone())
            .push_bind(self.value.clone());
    }
}

/// Rows written per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub records: u64,
    pub workouts: u64,
    pub correlations: u64,
    pub activity_summaries: u64,
    pub clinical_records: u64,
    pub audiograms: u64,
    pub vision_prescriptions: u64,
    pub record_metadata: u64,
}

impl TableCounts {
    /// Rows written for one entity kind
    pub fn for_kind(&self, kind: EntityKind) -> u64 {
        match kind {
            EntityKind::Record => self.records,
            EntityKind::Workout => self.workouts,
            EntityKind::Correlation => self.correlations,
            EntityKind::ActivitySummary => self.activity_summaries,
            EntityKind::ClinicalRecord => self.clinical_records,
            EntityKind::Audiogram => self.audiograms,
            EntityKind::VisionPrescription => self.vision_prescriptions,
        }
    }

    /// Entity rows across all tables, excluding metadata
    pub fn entities(&self) -> u64 {
        EntityKind::ALL.iter().map(|kind| self.for_kind(*kind)).sum()
    }

    /// `(table, rows)` pairs, metadata last
    pub fn by_table(&self) -> Vec<(&'static str, u64)> {
        EntityKind::ALL
            .iter()
            .map(|kind| (kind.table(), self.for_kind(*kind)))
            .chain(std::iter::once(("record_metadata", self.record_metadata)))
            .collect()
    }

    fn add(&mut self, other: &TableCounts) {
        self.records += other.records;
        self.workouts += other.workouts;
        self.correlations += other.correlations;
        self.activity_summaries += other.activity_summaries;
        self.clinical_records += other.clinical_records;
        self.audiograms += other.audiograms;
        self.vision_prescriptions += other.vision_prescriptions;
        self.record_metadata += other.record_metadata;
    }
}

/// Per-table id sequences for one run
#[derive(Debug, Clone, Copy)]
struct EntityIds {
    records: IdSequence,
    workouts: IdSequence,
    correlations: IdSequence,
    activity_summaries: IdSequence,
    clinical_records: IdSequence,
    audiograms: IdSequence,
    vision_prescriptions: IdSequence,
}

impl EntityIds {
    async fn seed(pool: &SqlitePool) -> Result<Self> {
        Ok(Self {
            records: IdSequence::seed(pool, EntityKind::Record.table()).await?,
            workouts: IdSequence::seed(pool, EntityKind::Workout.table()).await?,
            correlations: IdSequence::seed(pool, EntityKind::Correlation.table()).await?,
            activity_summaries: IdSequence::seed(pool, EntityKind::ActivitySummary.table())
                .await?,
            clinical_records: IdSequence::seed(pool, EntityKind::ClinicalRecord.table()).await?,
            audiograms: IdSequence::seed(pool, EntityKind::Audiogram.table()).await?,
            vision_prescriptions: IdSequence::seed(pool, EntityKind::VisionPrescription.table())
                .await?,
        })
    }
}

#[derive(Debug, Default)]
struct Buffers {
    records: Vec<Identified<Record>>,
    workouts: Vec<Identified<Workout>>,
    correlations: Vec<Identified<Correlation>>,
    activity_summaries: Vec<Identified<ActivitySummary>>,
    clinical_records: Vec<OpaqueRow<ClinicalRecord>>,
    audiograms: Vec<OpaqueRow<Audiogram>>,
    vision_prescriptions: Vec<OpaqueRow<VisionPrescription>>,
    record_metadata: Vec<RecordMetadataRow>,
}

impl Buffers {
    fn largest(&self) -> usize {
        [
            self.records.len(),
            self.workouts.len(),
            self.correlations.len(),
            self.activity_summaries.len(),
            self.clinical_records.len(),
            self.audiograms.len(),
            self.vision_prescriptions.len(),
            self.record_metadata.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    async fn write(&self, conn: &mut SqliteConnection) -> Result<TableCounts> {
        Ok(TableCounts {
            records: insert_rows(conn, &self.records).await?,
            workouts: insert_rows(conn, &self.workouts).await?,
            correlations: insert_rows(conn, &self.correlations).await?,
            activity_summaries: insert_rows(conn, &self.activity_summaries).await?,
            clinical_records: insert_rows(conn, &self.clinical_records).await?,
            audiograms: insert_rows(conn, &self.audiograms).await?,
            vision_prescriptions: insert_rows(conn, &self.vision_prescriptions).await?,
            record_metadata: insert_rows(conn, &self.record_metadata).await?,
        })
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// What a finished writer reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    pub counts: TableCounts,
    pub batches: u64,
}

/// Batches entities into per-table bulk inserts
pub struct BatchWriter<'p> {
    pool: &'p SqlitePool,
    batch_size: usize,
    ids: EntityIds,
    buffers: Buffers,
    written: TableCounts,
    batches: u64,
}

impl<'p> BatchWriter<'p> {
    /// Create a writer whose ids continue after the store's current maximum
    pub async fn new(pool: &'p SqlitePool, batch_size: usize) -> Result<Self> {
        let ids = EntityIds::seed(pool).await?;
        debug!(
            next_record_id = ids.records.peek(),
            next_workout_id = ids.workouts.peek(),
            "Seeded id sequences"
        );

        Ok(Self {
            pool,
            batch_size: batch_size.max(1),
            ids,
            buffers: Buffers::default(),
            written: TableCounts::default(),
            batches: 0,
        })
    }

    /// Buffer one entity, flushing if a buffer is full
    pub async fn push(&mut self, entity: ExportEntity) -> Result<()> {
        match entity {
            ExportEntity::Record(mut record) => {
                let id = self.ids.records.advance();
                let metadata = std::mem::take(&mut record.metadata);
                self.buffers
                    .record_metadata
                    .extend(metadata.into_iter().map(|MetadataEntry { key, value }| {
                        RecordMetadataRow {
                            record_id: id,
                            key,
                            value,
                        }
                    }));
                self.buffers.records.push(Identified { id, entity: record });
            },
            ExportEntity::Workout(workout) => {
                let id = self.ids.workouts.advance();
                self.buffers.workouts.push(Identified { id, entity: workout });
            },
            ExportEntity::Correlation(correlation) => {
                let id = self.ids.correlations.advance();
                self.buffers
                    .correlations
                    .push(Identified { id, entity: correlation });
            },
            ExportEntity::ActivitySummary(summary) => {
                let id = self.ids.activity_summaries.advance();
                self.buffers
                    .activity_summaries
                    .push(Identified { id, entity: summary });
            },
            ExportEntity::ClinicalRecord(clinical) => {
                let id = self.ids.clinical_records.advance();
                let extra_json = clinical.extra.to_json()?;
                self.buffers.clinical_records.push(OpaqueRow {
                    id,
                    entity: clinical,
                    extra_json,
                });
            },
            ExportEntity::Audiogram(audiogram) => {
                let id = self.ids.audiograms.advance();
                let extra_json = audiogram.extra.to_json()?;
                self.buffers.audiograms.push(OpaqueRow {
                    id,
                    entity: audiogram,
                    extra_json,
                });
            },
            ExportEntity::VisionPrescription(prescription) => {
                let id = self.ids.vision_prescriptions.advance();
                let extra_json = prescription.extra.to_json()?;
                self.buffers.vision_prescriptions.push(OpaqueRow {
                    id,
                    entity: prescription,
                    extra_json,
                });
            },
        }

        if self.buffers.largest() >= self.batch_size {
            self.flush().await?;
        }

        Ok(())
    }

    /// Write every buffer in one committed transaction
    pub async fn flush(&mut self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let counts = self.buffers.write(&mut tx).await?;
        tx.commit().await?;

        self.buffers.clear();
        self.written.add(&counts);
        self.batches += 1;

        info!(
            batch = self.batches,
            rows = counts.entities(),
            metadata = counts.record_metadata,
            total = self.written.entities(),
            "Committed batch"
        );

        Ok(())
    }

    /// Flush whatever is left and report totals
    pub async fn finish(mut self) -> Result<WriterReport> {
        self.flush().await?;

        Ok(WriterReport {
            counts: self.written,
            batches: self.batches,
        })
    }

    pub fn written(&self) -> &TableCounts {
        &self.written
    }
}
