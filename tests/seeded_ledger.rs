// tests/seeded_ledger.rs
use std::fs;

use chrono::NaiveDate;
use covid19_updater::snapshot::load_dataset;
use covid19_updater::{SnapshotStore, StoreError, TrendAnalyzer};

const DATASET: &str = r#"{"data": [
    {"date": "04202020", "total_cases": "2,491", "new_cases": "57",  "new_tests": "",
     "hospitalizations": 560, "intensive_care": 180, "deaths": 87},
    {"date": "04212020", "total_cases": "2,643", "new_cases": "152", "new_tests": "1,840",
     "hospitalizations": 590, "intensive_care": 191, "deaths": 94},
    {"date": "04222020", "total_cases": "2,826", "new_cases": "183", "new_tests": null,
     "hospitalizations": 612, "intensive_care": 197, "deaths": 97},
    {"date": "04232020", "total_cases": "2,943", "new_cases": "117", "new_tests": null,
     "hospitalizations": 640, "intensive_care": 210, "deaths": 111}
]}"#;

#[test]
fn dataset_file_seeds_a_ledger_that_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("dataset.json");
    let db_path = dir.path().join("covid19.db");
    fs::write(&data_path, DATASET).unwrap();

    let rows = load_dataset(&data_path).unwrap();
    assert_eq!(rows.len(), 4);
    {
        let mut store = SnapshotStore::open(&db_path).unwrap();
        assert_eq!(store.seed(&rows).unwrap(), 4);
    }

    let store = SnapshotStore::open_existing(&db_path).unwrap();
    assert_eq!(store.count().unwrap(), 4);
    let latest = store.latest().unwrap().unwrap();
    assert_eq!(latest.date, NaiveDate::from_ymd_opt(2020, 4, 23).unwrap());
    assert_eq!(latest.total_cases, Some(2943));

    let analyzer = TrendAnalyzer::new(&store);
    assert!(!analyzer.is_latest_record_high().unwrap());
    // 152 -> 183 -> 117
    assert!(analyzer.trend(3).unwrap() < 0.0);
    let avg = analyzer.moving_average(7).unwrap();
    assert!((avg - 127.25).abs() < 1e-9, "{avg}");
}

#[test]
fn reseeding_an_existing_date_leaves_the_ledger_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("dataset.json");
    fs::write(&data_path, DATASET).unwrap();
    let rows = load_dataset(&data_path).unwrap();

    let mut store = SnapshotStore::open(dir.path().join("covid19.db")).unwrap();
    store.seed(&rows[..2]).unwrap();

    let err = store.seed(&rows[1..]).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(d) if d == rows[1].date));
    assert_eq!(store.count().unwrap(), 2);
}
