//! Export ingestion against a real SQLite store

mod helpers;

use healthdb_ingest::db;
use healthdb_ingest::export::{self, EntityKind};
use healthdb_ingest::{postprocess, IngestError, IngestOptions, PostprocessOptions};
use helpers::*;

fn no_aux_stages() -> PostprocessOptions {
    PostprocessOptions::builder()
        .routes_dir(None)
        .ecg_dir(None)
        .build()
}

#[tokio::test]
async fn test_every_element_becomes_a_row_with_dense_ids() {
    let store = TestStore::new().await;
    let body = [
        record("HKQuantityTypeIdentifierStepCount", "120", "count", "Phone"),
        record("HKQuantityTypeIdentifierStepCount", "80", "count", "Phone"),
        workout("HKWorkoutActivityTypeRunning", "Watch"),
        record("HKQuantityTypeIdentifierHeartRate", "61", "count/min", "Watch"),
        workout("HKWorkoutActivityTypeWalking", "Watch"),
        r#" <ActivitySummary dateComponents="2024-01-18" activeEnergyBurned="420.5" activeEnergyBurnedGoal="500" activeEnergyBurnedUnit="kcal" appleStandHours="9" appleStandHoursGoal="12"/>"#.to_string(),
    ]
    .join("\n");
    let path = write_file(store.path(), "export.xml", &export_xml(&body));

    let summary = export::ingest(&store.pool, &path, &IngestOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.elements, 6);
    assert_eq!(summary.counts.for_kind(EntityKind::Record), 3);
    assert_eq!(summary.counts.for_kind(EntityKind::Workout), 2);
    assert_eq!(summary.counts.for_kind(EntityKind::ActivitySummary), 1);
    assert_eq!(summary.batches, 1);

    assert_eq!(store.ids("records").await, vec![1, 2, 3]);
    assert_eq!(store.ids("workouts").await, vec![1, 2]);
    assert_eq!(store.ids("activity_summaries").await, vec![1]);
    assert_eq!(store.count("correlations").await, 0);
}

#[tokio::test]
async fn test_step_count_reads_back_through_normalized_view() {
    let store = TestStore::new().await;
    let body = record("StepCount", "120", "count", "Phone");
    let path = write_file(store.path(), "export.xml", &export_xml(&body));

    export::ingest(&store.pool, &path, &IngestOptions::default())
        .await
        .unwrap();
    postprocess(&store.pool, &no_aux_stages()).await.unwrap();

    let (record_type, value_num, source): (String, Option<f64>, Option<String>) = sqlx::query_as(
        "SELECT type, value_num, source_name_norm FROM records_norm",
    )
    .fetch_one(&store.pool)
    .await
    .unwrap();

    assert_eq!(record_type, "StepCount");
    assert_eq!(value_num, Some(120.0));
    assert_eq!(source.as_deref(), Some("Phone"));
    assert_eq!(store.count("records").await, 1);
}

#[tokio::test]
async fn test_number_like_text_is_not_numeric_in_view() {
    let store = TestStore::new().await;
    let values = ["1-2", "e5", "--5", "1.2.3", "72.5"];
    let body: Vec<String> = values
        .iter()
        .map(|value| record("HeartRate", value, "count/min", "Watch"))
        .collect();
    let path = write_file(store.path(), "export.xml", &export_xml(&body.join("\n")));

    export::ingest(&store.pool, &path, &IngestOptions::default())
        .await
        .unwrap();
    postprocess(&store.pool, &no_aux_stages()).await.unwrap();

    let rows: Vec<(String, Option<f64>)> =
        sqlx::query_as("SELECT value, value_num FROM records_norm ORDER BY id")
            .fetch_all(&store.pool)
            .await
            .unwrap();
    assert_eq!(
        rows,
        vec![
            ("1-2".to_string(), None),
            ("e5".to_string(), None),
            ("--5".to_string(), None),
            ("1.2.3".to_string(), None),
            ("72.5".to_string(), Some(72.5)),
        ]
    );
}

#[tokio::test]
async fn test_rerun_continues_id_sequence() {
    let store = TestStore::new().await;
    let body = [
        record("StepCount", "1", "count", "Phone"),
        record("StepCount", "2", "count", "Phone"),
    ]
    .join("\n");
    let path = write_file(store.path(), "export.xml", &export_xml(&body));

    export::ingest(&store.pool, &path, &IngestOptions::default())
        .await
        .unwrap();
    export::ingest(&store.pool, &path, &IngestOptions::default())
        .await
        .unwrap();

    assert_eq!(store.ids("records").await, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_missing_export_writes_nothing() {
    let store = TestStore::new().await;
    let path = store.path().join("does-not-exist.xml");

    let err = export::ingest(&store.pool, &path, &IngestOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::MissingInputFile { .. }));
    assert_eq!(err.exit_code(), 2);
    assert!(!db::table_exists(&store.pool, "records").await.unwrap());
}

#[tokio::test]
async fn test_metadata_stored_only_when_requested() {
    let store = TestStore::new().await;
    let body = [
        record_with_metadata("HeartRate", "61", &[("HKMetadataKeyHeartRateMotionContext", "1")]),
        record_with_metadata("HeartRate", "64", &[("a", "x"), ("b", "y")]),
    ]
    .join("\n");
    let path = write_file(store.path(), "export.xml", &export_xml(&body));

    export::ingest(&store.pool, &path, &IngestOptions::default())
        .await
        .unwrap();
    assert_eq!(store.count("record_metadata").await, 0);

    let options = IngestOptions::builder().capture_metadata(true).build();
    let summary = export::ingest(&store.pool, &path, &options).await.unwrap();
    assert_eq!(summary.counts.record_metadata, 3);

    // Entries point at the records of the second run
    let record_ids: Vec<i64> =
        sqlx::query_scalar("SELECT DISTINCT record_id FROM record_metadata ORDER BY record_id")
            .fetch_all(&store.pool)
            .await
            .unwrap();
    assert_eq!(record_ids, vec![3, 4]);
}

#[tokio::test]
async fn test_element_limit_leaves_partial_store() {
    let store = TestStore::new().await;
    let body: Vec<String> = (0..5)
        .map(|i| record("StepCount", &i.to_string(), "count", "Phone"))
        .collect();
    let path = write_file(store.path(), "export.xml", &export_xml(&body.join("\n")));

    let options = IngestOptions::builder().max_elements(Some(2)).build();
    let summary = export::ingest(&store.pool, &path, &options).await.unwrap();

    assert_eq!(summary.elements, 2);
    assert_eq!(summary.counts.entities(), 2);
    assert_eq!(store.count("records").await, 2);
}

#[tokio::test]
async fn test_small_batches_commit_everything() {
    let store = TestStore::new().await;
    let body: Vec<String> = (0..7)
        .map(|i| record("StepCount", &i.to_string(), "count", "Phone"))
        .collect();
    let path = write_file(store.path(), "export.xml", &export_xml(&body.join("\n")));

    let options = IngestOptions::builder().batch_size(3).build();
    let summary = export::ingest(&store.pool, &path, &options).await.unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(store.ids("records").await, (1..=7).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_unparsable_numbers_are_stored_as_null() {
    let store = TestStore::new().await;
    let body = r#" <Workout workoutActivityType="Yoga" duration="n/a" durationUnit="min" sourceName="Watch"/>"#;
    let path = write_file(store.path(), "export.xml", &export_xml(body));

    export::ingest(&store.pool, &path, &IngestOptions::default())
        .await
        .unwrap();

    let (duration, distance_unit): (Option<f64>, String) =
        sqlx::query_as("SELECT duration, total_distance_unit FROM workouts")
            .fetch_one(&store.pool)
            .await
            .unwrap();
    assert_eq!(duration, None);
    assert_eq!(distance_unit, "Unknown");
}
