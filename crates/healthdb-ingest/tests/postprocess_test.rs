//! Post-processing: aliases, views, routes and ECG recordings

mod helpers;

use healthdb_ingest::export;
use healthdb_ingest::normalize::VIEW_NAMES;
use healthdb_ingest::routes::haversine_km;
use healthdb_ingest::{postprocess, IngestOptions, PostprocessOptions};
use helpers::*;
use std::path::PathBuf;

fn options(routes: Option<PathBuf>, ecg: Option<PathBuf>) -> PostprocessOptions {
    PostprocessOptions::builder()
        .routes_dir(routes)
        .ecg_dir(ecg)
        .build()
}

#[tokio::test]
async fn test_two_point_route() {
    let store = TestStore::new().await;
    let routes = store.subdir("workout-routes");
    write_file(&routes, "route_2024-01-18.gpx", &gpx(&[(10.0, 10.0), (10.001, 10.001)]));

    let summary = postprocess(&store.pool, &options(Some(routes), None))
        .await
        .unwrap();
    assert_eq!(summary.routes_added, 1);

    let (point_count, distance_km, min_lat, max_lat, min_lon, max_lon): (i64, f64, f64, f64, f64, f64) =
        sqlx::query_as(
            "SELECT point_count, distance_km, min_lat, max_lat, min_lon, max_lon FROM workout_routes",
        )
        .fetch_one(&store.pool)
        .await
        .unwrap();

    let expected = haversine_km(10.0, 10.0, 10.001, 10.001);
    assert_eq!(point_count, 2);
    assert!((distance_km - expected).abs() <= expected * 1e-9);
    assert_eq!((min_lat, max_lat), (10.0, 10.001));
    assert_eq!((min_lon, max_lon), (10.0, 10.001));

    let (start, end): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT start_time, end_time FROM workout_routes")
            .fetch_one(&store.pool)
            .await
            .unwrap();
    assert_eq!(start.as_deref(), Some("2024-01-18T07:00:00Z"));
    assert_eq!(end.as_deref(), Some("2024-01-18T07:01:00Z"));

    let elevations: Vec<Option<f64>> =
        sqlx::query_scalar("SELECT ele FROM workout_route_points ORDER BY point_index")
            .fetch_all(&store.pool)
            .await
            .unwrap();
    assert_eq!(elevations, vec![Some(10.0), Some(11.0)]);
}

#[tokio::test]
async fn test_ecg_recording() {
    let store = TestStore::new().await;
    let ecgs = store.subdir("electrocardiograms");
    write_file(&ecgs, "ecg_2024-01-18.csv", &ecg_csv("300 Hz", &[-12.5, 0.0, 3.25, 44.0]));

    let summary = postprocess(&store.pool, &options(None, Some(ecgs)))
        .await
        .unwrap();
    assert_eq!(summary.ecgs_added, 1);

    let (rate, classification, device, extra): (Option<f64>, Option<String>, Option<String>, String) =
        sqlx::query_as("SELECT sample_rate_hz, classification, device, extra_json FROM ecg_records")
            .fetch_one(&store.pool)
            .await
            .unwrap();
    assert_eq!(rate, Some(300.0));
    assert_eq!(classification.as_deref(), Some("Sinus Rhythm"));
    assert_eq!(device.as_deref(), Some("Watch7,4"));

    let header: serde_json::Value = serde_json::from_str(&extra).unwrap();
    assert_eq!(header["Date of Birth"], "Jan 1, 1990");
    assert_eq!(header["Lead"], "Lead I");

    let samples: Vec<f64> = sqlx::query_scalar("SELECT value FROM ecg_samples ORDER BY sample_index")
        .fetch_all(&store.pool)
        .await
        .unwrap();
    assert_eq!(samples, vec![-12.5, 0.0, 3.25, 44.0]);
}

#[tokio::test]
async fn test_rerun_with_skip_existing_adds_nothing() {
    let store = TestStore::new().await;
    let routes = store.subdir("workout-routes");
    let ecgs = store.subdir("electrocardiograms");
    write_file(&routes, "a.gpx", &gpx(&[(51.5, -0.12), (51.501, -0.121)]));
    write_file(&routes, "b.gpx", &gpx(&[(48.85, 2.35)]));
    write_file(&ecgs, "a.csv", &ecg_csv("512 Hz", &[1.0, 2.0, 3.0]));
    let opts = options(Some(routes), Some(ecgs));

    let first = postprocess(&store.pool, &opts).await.unwrap();
    assert_eq!((first.routes_added, first.ecgs_added), (2, 1));

    let second = postprocess(&store.pool, &opts).await.unwrap();
    assert_eq!((second.routes_added, second.ecgs_added), (0, 0));

    assert_eq!(store.count("workout_routes").await, 2);
    assert_eq!(store.count("workout_route_points").await, 3);
    assert_eq!(store.count("ecg_records").await, 1);
    assert_eq!(store.count("ecg_samples").await, 3);
}

#[tokio::test]
async fn test_duplicate_path_without_skip_is_ignored_without_orphans() {
    let store = TestStore::new().await;
    let routes = store.subdir("workout-routes");
    write_file(&routes, "a.gpx", &gpx(&[(1.0, 1.0), (1.001, 1.001)]));

    let first = PostprocessOptions::builder()
        .routes_dir(Some(routes.clone()))
        .ecg_dir(None)
        .build();
    postprocess(&store.pool, &first).await.unwrap();

    let again = PostprocessOptions::builder()
        .routes_dir(Some(routes))
        .ecg_dir(None)
        .skip_existing(false)
        .build();
    let summary = postprocess(&store.pool, &again).await.unwrap();

    assert_eq!(summary.routes_added, 0);
    assert_eq!(store.ids("workout_routes").await, vec![1]);
    assert_eq!(store.count("workout_route_points").await, 2);

    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM workout_route_points WHERE route_id NOT IN (SELECT id FROM workout_routes)",
    )
    .fetch_one(&store.pool)
    .await
    .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn test_missing_and_disabled_directories_contribute_nothing() {
    let store = TestStore::new().await;

    let missing = options(
        Some(store.path().join("no-routes-here")),
        Some(store.path().join("no-ecgs-here")),
    );
    let summary = postprocess(&store.pool, &missing).await.unwrap();
    assert_eq!((summary.routes_added, summary.ecgs_added), (0, 0));

    let routes = store.subdir("workout-routes");
    write_file(&routes, "a.gpx", &gpx(&[(1.0, 1.0)]));
    let summary = postprocess(&store.pool, &options(None, None)).await.unwrap();
    assert_eq!(summary.routes_added, 0);
    assert_eq!(store.count("workout_routes").await, 0);
}

#[tokio::test]
async fn test_files_without_points_or_samples_are_skipped() {
    let store = TestStore::new().await;
    let routes = store.subdir("workout-routes");
    let ecgs = store.subdir("electrocardiograms");
    write_file(&routes, "empty.gpx", &gpx(&[]));
    write_file(&routes, "notes.txt", "not a route");
    write_file(&ecgs, "header-only.csv", &ecg_csv("300 Hz", &[]));

    let summary = postprocess(&store.pool, &options(Some(routes), Some(ecgs)))
        .await
        .unwrap();

    assert_eq!((summary.routes_added, summary.ecgs_added), (0, 0));
    assert_eq!(store.count("workout_routes").await, 0);
    assert_eq!(store.count("ecg_records").await, 0);
}

#[tokio::test]
async fn test_small_flush_threshold_keeps_files_intact() {
    let store = TestStore::new().await;
    let routes = store.subdir("workout-routes");
    for name in ["a.gpx", "b.gpx", "c.gpx"] {
        write_file(&routes, name, &gpx(&[(1.0, 1.0), (1.1, 1.1), (1.2, 1.2)]));
    }

    let opts = PostprocessOptions::builder()
        .routes_dir(Some(routes))
        .ecg_dir(None)
        .flush_threshold(1)
        .build();
    let summary = postprocess(&store.pool, &opts).await.unwrap();

    assert_eq!(summary.routes_added, 3);
    assert_eq!(store.ids("workout_routes").await, vec![1, 2, 3]);

    let per_route: Vec<i64> = sqlx::query_scalar(
        "SELECT COUNT(*) FROM workout_route_points GROUP BY route_id ORDER BY route_id",
    )
    .fetch_all(&store.pool)
    .await
    .unwrap();
    assert_eq!(per_route, vec![3, 3, 3]);
}

#[tokio::test]
async fn test_source_variants_share_one_canonical_name() {
    let store = TestStore::new().await;
    let body = [
        record("StepCount", "10", "count", "Jane\u{2019}s Apple\u{a0}Watch"),
        record("StepCount", "20", "count", "Jane's  Apple Watch"),
        record("StepCount", "30", "count", "Phone"),
    ]
    .join("\n");
    let path = write_file(store.path(), "export.xml", &export_xml(&body));
    export::ingest(&store.pool, &path, &IngestOptions::default())
        .await
        .unwrap();

    let summary = postprocess(&store.pool, &options(None, None)).await.unwrap();
    assert_eq!(summary.aliases, 3);

    let canonical: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT source_name_norm FROM records_norm ORDER BY 1")
            .fetch_all(&store.pool)
            .await
            .unwrap();
    assert_eq!(canonical, vec!["Jane's Apple Watch", "Phone"]);

    // Rebuilding after more data picks up new sources
    let more = write_file(
        store.path(),
        "more.xml",
        &export_xml(&workout("HKWorkoutActivityTypeRunning", "Strava")),
    );
    export::ingest(&store.pool, &more, &IngestOptions::default())
        .await
        .unwrap();
    let summary = postprocess(&store.pool, &options(None, None)).await.unwrap();
    assert_eq!(summary.aliases, 4);
}

#[tokio::test]
async fn test_views_exist_on_empty_store() {
    let store = TestStore::new().await;
    postprocess(&store.pool, &options(None, None)).await.unwrap();

    for view in VIEW_NAMES {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'view' AND name = ?")
            .bind(*view)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1, "missing view {view}");
    }

    assert_eq!(store.count("records_norm").await, 0);
}
