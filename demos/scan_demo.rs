//! Demonstration of a proximity scan over a small set of position reports.
//!
//! This example shows how to:
//! 1. Write a delimited file of position reports
//! 2. Open it with a file collector
//! 3. Run the scan loop over it
//! 4. Save the interactions and summarize their distances
//!
//! Run with: cargo run --example scan_demo

use std::io::Write;
use std::sync::atomic::AtomicBool;

use vessel_proximity::{
    collector::FileCollector,
    config::Config,
    core::{run_scan, summarize_distances},
    stats::create_shared_log,
    ErrorPolicy,
};

const REPORTS: &str = "\
# three vessels off Norfolk, two of them in the same bucket
MMSI,BaseDateTime,LAT,LON,SOG,Geohash
367000001,2017-12-01T00:00:00,36.90512,-76.32652,4.2,0x1a2b
367000002,2017-12-01T00:01:30,36.91512,-76.22652,6.0,0x1a2b
367000003,2017-12-01T00:02:00,36.70000,-76.00000,11.5,0x1a2c
367000001,2017-12-01T00:12:00,36.90600,-76.32000,4.1,0x1a2b
367000003,2017-12-01T00:13:00,36.90700,-76.31000,10.9,0x1a2b
";

fn main() {
    println!("Vessel Proximity - Scan Demo");
    println!("============================");
    println!();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("positions.csv");
    let output = dir.path().join("interactions.csv");

    let mut file = std::fs::File::create(&input).expect("Failed to create input");
    file.write_all(REPORTS.as_bytes()).expect("Failed to write input");
    drop(file);

    let config = Config {
        window_width: std::time::Duration::from_secs(10 * 60),
        slide_step: std::time::Duration::from_secs(5 * 60),
        ..Config::default()
    };

    let mut collector = FileCollector::open(&input).expect("Failed to open input");
    println!("Header: {}", collector.headers().fields().join(", "));
    println!();

    let log = create_shared_log();
    let running = AtomicBool::new(true);
    let interactions =
        run_scan(&mut collector, &config, log.clone(), &running).expect("Scan failed");

    for row in interactions.emit().into_iter().flatten() {
        println!(
            "{}  {} <-> {}  {:.1} nm",
            row.fingerprint_hex(),
            row.first.field(0).unwrap_or("?"),
            row.second.field(0).unwrap_or("?"),
            row.distance_nm
        );
    }

    let report = interactions
        .save(&output, ErrorPolicy::Skip)
        .expect("Failed to save interactions");
    println!();
    println!("Saved {} interactions:", report.written);
    print!(
        "{}",
        std::fs::read_to_string(&output).expect("Failed to read output")
    );

    let rows: Vec<_> = interactions.emit().into_iter().flatten().collect();
    if let Some(summary) = summarize_distances(&rows) {
        println!();
        println!(
            "Distances: min {:.1} nm, max {:.1} nm, mean {:.2} nm",
            summary.min_nm, summary.max_nm, summary.mean_nm
        );
    }

    println!();
    println!("{}", log.summary());
}
