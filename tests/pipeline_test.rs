//! Integration tests for the file-to-interactions pipeline

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use vessel_proximity::collector::{
    haversine_nm, split_line, FileCollector, Headers, IdentityIndices, Record,
};
use vessel_proximity::config::Config;
use vessel_proximity::core::{
    run_scan, scan_file, Cluster, FingerprintMode, InteractionScanner, InteractionSet,
};
use vessel_proximity::stats::create_shared_log;
use vessel_proximity::{AnalysisError, ErrorPolicy};

const HEADER: &str = "MMSI,BaseDateTime,LAT,LON,Geohash,VesselName";

fn write_input(dir: &tempfile::TempDir, rows: &[&str]) -> std::path::PathBuf {
    let path = dir.path().join("positions.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    path
}

fn minutes(width: u64, step: u64) -> Config {
    Config {
        window_width: std::time::Duration::from_secs(width * 60),
        slide_step: std::time::Duration::from_secs(step * 60),
        ..Config::default()
    }
}

#[test]
fn test_two_vessels_in_one_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        &dir,
        &[
            "367000001,2017-12-01T00:00:00,36.90512,-76.32652,0x1a2b,ALPHA",
            "367000002,2017-12-01T00:01:00,36.91512,-76.22652,0x1a2b,\"BRAVO, JR\"",
            "367000003,2017-12-01T00:02:00,40.00000,-70.00000,0x9f00,CHARLIE",
        ],
    );

    let log = create_shared_log();
    let interactions = scan_file(&input, &minutes(10, 5), log.clone()).unwrap();
    assert_eq!(interactions.len(), 1);

    let output = dir.path().join("interactions.csv");
    let report = interactions.save(&output, ErrorPolicy::Abort).unwrap();
    assert_eq!(report.written, 1);

    let contents = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "InteractionHash,Distance(nm),\
         MMSI_1,BaseDateTime_1,LAT_1,LON_1,Geohash_1,VesselName_1,\
         MMSI_2,BaseDateTime_2,LAT_2,LON_2,Geohash_2,VesselName_2"
    );

    let row = split_line(lines[1]).unwrap();
    assert_eq!(row.len(), 14);
    assert!(row[0].starts_with("0x"));
    assert_eq!(row[0].len(), 18);
    assert_eq!(row[1], "4.8");

    let mut vessels = vec![row[2].as_str(), row[8].as_str()];
    vessels.sort();
    assert_eq!(vessels, ["367000001", "367000002"]);
    assert!(row.iter().any(|f| f == "BRAVO, JR"));

    let stats = log.stats();
    assert_eq!(stats.records_read, 3);
    assert_eq!(stats.records_rejected, 0);
    assert_eq!(stats.interactions_retained, 1);
}

#[test]
fn test_distance_matches_great_circle() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        &dir,
        &[
            "1,2017-12-01T00:00:00,36.90512,-76.32652,0x10,A",
            "2,2017-12-01T00:00:30,36.91512,-76.22652,0x10,B",
        ],
    );
    let interactions = scan_file(&input, &Config::default(), create_shared_log()).unwrap();
    let rows: Vec<_> = interactions.emit().into_iter().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);

    let expected = haversine_nm(36.90512, -76.32652, 36.91512, -76.22652);
    assert!((rows[0].distance_nm - expected).abs() < 1e-9);
}

#[test]
fn test_pairs_across_window_positions_kept_once() {
    let dir = tempfile::tempdir().unwrap();
    // width 10 min, step 2 min: the 3/4 pair is clustered at two window positions
    let input = write_input(
        &dir,
        &[
            "1,2017-12-01T00:00:00,36.9,-76.3,0x10,A",
            "2,2017-12-01T00:01:00,36.9,-76.3,0x10,B",
            "3,2017-12-01T00:11:00,36.9,-76.3,0x20,C",
            "4,2017-12-01T00:13:00,36.9,-76.3,0x20,D",
            "5,2017-12-01T00:15:00,36.9,-76.3,0x30,E",
        ],
    );
    let log = create_shared_log();
    let interactions = scan_file(&input, &minutes(10, 2), log.clone()).unwrap();

    assert_eq!(interactions.len(), 2);
    assert!(log.stats().slides > 0);
}

#[test]
fn test_malformed_rows_follow_policy() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        &dir,
        &[
            "1,2017-12-01T00:00:00,36.9,-76.3,0x10,A",
            "2,2017-12-01T00:00:10,36.9,-76.3,0x10",
            "3,2017-12-01T00:00:20,36.9,-76.3,not-a-key,C",
            "4,2017-12-01T00:00:30,36.9,-76.3,0x10,D",
        ],
    );

    let log = create_shared_log();
    let interactions = scan_file(&input, &Config::default(), log.clone()).unwrap();
    assert_eq!(interactions.len(), 1);
    let stats = log.stats();
    assert_eq!(stats.records_read, 4);
    assert_eq!(stats.records_rejected, 2);

    let mut config = Config::default();
    config.error_policy = ErrorPolicy::Abort;
    match scan_file(&input, &config, create_shared_log()) {
        Err(AnalysisError::MalformedRow { line, .. }) => assert_eq!(line, 3),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_missing_geokey_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("positions.csv");
    std::fs::write(&path, "MMSI,BaseDateTime,LAT,LON\n1,2017-12-01T00:00:00,36.9,-76.3\n").unwrap();

    match scan_file(&path, &Config::default(), create_shared_log()) {
        Err(AnalysisError::Configuration(msg)) => assert!(msg.contains("Geohash")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_stopped_scan_returns_partial_result() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, &["1,2017-12-01T00:00:00,36.9,-76.3,0x10,A"]);

    let mut collector = FileCollector::open(&input).unwrap();
    let running = AtomicBool::new(false);
    let interactions =
        run_scan(&mut collector, &Config::default(), create_shared_log(), &running).unwrap();
    assert!(interactions.is_empty());
}

#[test]
fn test_local_time_zone_applied() {
    let mut config = minutes(10, 5);
    config.timestamp.timezone = "America/New_York".to_string();
    let headers = Headers::from_csv(HEADER);
    let mut scanner = InteractionScanner::new(&headers, &config, create_shared_log()).unwrap();

    // 19:00 in New York on Nov 30 is midnight UTC on Dec 1
    for row in [
        "1,2017-11-30T19:00:00,36.9,-76.3,0x10,A",
        "2,2017-11-30T19:04:00,36.9,-76.3,0x10,B",
    ] {
        scanner.process(Record::new(split_line(row).unwrap())).unwrap();
    }
    let left = scanner.window().unwrap().left();
    assert_eq!(left, Utc.with_ymd_and_hms(2017, 12, 1, 0, 0, 0).unwrap());
    assert_eq!(scanner.finish().unwrap().len(), 1);
}

const IDX: IdentityIndices = IdentityIndices {
    entity_id: 0,
    timestamp: 1,
    latitude: 2,
    longitude: 3,
};

fn cluster_of(entities: &[u8]) -> Cluster {
    entities
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let time = format!("2017-12-01T00:00:{:02}", i % 60);
            let fields = vec![id.to_string(), time, "36.9".to_string(), "-76.3".to_string()];
            Arc::new(Record::new(fields))
        })
        .collect()
}

proptest! {
    #[test]
    fn test_cluster_order_does_not_change_cardinality(entities in prop::collection::vec(0u8..6, 0..12)) {
        let cluster = cluster_of(&entities);
        for mode in [FingerprintMode::Ordered, FingerprintMode::Canonical] {
            let mut forward = InteractionSet::new(IDX, mode);
            forward.add_cluster(&cluster);
            let mut backward = InteractionSet::new(IDX, mode);
            backward.add_cluster(&cluster.reversed());
            prop_assert_eq!(forward.len(), backward.len());

            let size = forward.len();
            forward.add_cluster(&cluster);
            prop_assert_eq!(forward.len(), size);
        }
    }

    #[test]
    fn test_single_entity_cluster_is_empty(count in 0usize..10) {
        let cluster = cluster_of(&vec![7u8; count]);
        let mut set = InteractionSet::new(IDX, FingerprintMode::Ordered);
        prop_assert_eq!(set.add_cluster(&cluster), 0);
        prop_assert!(set.is_empty());
    }
}
