//! Golden tests for the block aligner.
//!
//! These tests run whole datasets through grouping, enumeration, fitting and
//! naming, and pin the resulting plans.

use std::sync::Arc;
use std::thread;

use block_aligner::{
    parse_file_name, AlignerConfig, BlockAligner, CoordinateValues, DataDescriptor, DataType,
    DatasetMetadata, DatasetSchema, DimensionRange, MaxUnlimitedRecordsMeasure, MeasureRegistry,
    MinFilesMeasure, TypedRange, VariableAlignment, WorkQueue,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn make_metadata(schema: DatasetSchema) -> Arc<DatasetMetadata> {
    Arc::new(DatasetMetadata::from_schema(schema).unwrap())
}

/// One int32 variable over a 100M-record unlimited dimension.
fn build_large_table() -> Arc<DatasetMetadata> {
    make_metadata(
        DatasetSchema::new("mem://table.nc")
            .unlimited_dimension("rows", 100_000_000)
            .variable("values", DataType::Int, &["rows"]),
    )
}

/// A small CF-style dataset with a bounded time axis.
fn build_climate() -> Arc<DatasetMetadata> {
    let times: Vec<f64> = (0..12).map(|i| 15.0 + 30.0 * i as f64).collect();
    make_metadata(
        DatasetSchema::new("mem://tas.nc")
            .unlimited_dimension("time", 12)
            .dimension("lat", 4)
            .dimension("lon", 8)
            .dimension("bnds", 2)
            .variable("time", DataType::Double, &["time"])
            .variable("time_bnds", DataType::Double, &["time", "bnds"])
            .variable("lat", DataType::Double, &["lat"])
            .variable("lon", DataType::Double, &["lon"])
            .variable("tas", DataType::Float, &["time", "lat", "lon"])
            .coordinate("time", CoordinateValues::Float64(times)),
    )
}

/// A record variable next to an unrelated fixed-size variable.
fn build_disjoint() -> Arc<DatasetMetadata> {
    make_metadata(
        DatasetSchema::new("mem://disjoint.nc")
            .unlimited_dimension("rows", 1000)
            .dimension("x", 900)
            .variable("values", DataType::Int, &["rows"])
            .variable("big", DataType::Int, &["x"]),
    )
}

fn windows_of(alignment: &VariableAlignment) -> Vec<DimensionRange> {
    alignment
        .descriptors()
        .filter_map(|dd| dd.split_range().cloned())
        .collect()
}

fn assert_tiles(windows: &[DimensionRange], start: u64, end: u64) {
    assert!(!windows.is_empty());
    assert_eq!(windows[0].start, start);
    assert_eq!(windows[windows.len() - 1].end, end);
    for pair in windows.windows(2) {
        assert_eq!(pair[0].end + 1, pair[1].start, "gap or overlap between windows");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Large record table
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_large_table_splits_into_seven_files() {
    let aligner = BlockAligner::new(
        build_large_table(),
        Arc::new(MaxUnlimitedRecordsMeasure),
        AlignerConfig::with_block_size(64_000_000),
    );
    let alignment = aligner.align().unwrap();

    assert_eq!(alignment.len(), 1);
    assert_eq!(alignment.file_count(), 7);

    let windows = windows_of(&alignment);
    assert_tiles(&windows, 0, 99_999_999);
    assert!(windows.iter().take(6).all(|w| w.size() == 15_999_952));
    assert!(windows.iter().all(|w| w.name == "rows" && w.unbounded));
}

#[test]
fn test_large_table_files_fit_the_block() {
    let config = AlignerConfig::with_block_size(64_000_000);
    let limit = config.block_limit();
    let alignment = BlockAligner::new(build_large_table(), Arc::new(MinFilesMeasure), config)
        .align()
        .unwrap();

    for dd in alignment.descriptors() {
        assert!(dd.estimate_size().unwrap() < limit, "{dd} exceeds {limit}");
    }
}

#[test]
fn test_large_table_file_names() {
    let alignment = BlockAligner::new(
        build_large_table(),
        Arc::new(MaxUnlimitedRecordsMeasure),
        AlignerConfig::with_block_size(64_000_000),
    )
    .align()
    .unwrap();

    let names = alignment.file_names();
    assert_eq!(names[0], "values_rows~DIM~0~15999951.nc");
    assert_eq!(names[6], "values_rows~DIM~95999712~99999999.nc");
}

// ─────────────────────────────────────────────────────────────────────────────
// Candidate selection
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_separate_assignments_win_when_combined_files_split() {
    let config = AlignerConfig {
        block_size: 5000,
        estimation_margin: 0,
        ..AlignerConfig::default()
    };
    let aligner = BlockAligner::new(
        build_disjoint(),
        Arc::new(MaxUnlimitedRecordsMeasure),
        config,
    );

    let candidates = aligner.enumerate_candidates().unwrap();
    assert_eq!(candidates.len(), 2);

    let (combined, combined_score) = aligner.evaluate(&candidates[0]).unwrap();
    assert!(combined.file_count() > 2);

    let alignment = aligner.align().unwrap();
    assert_eq!(alignment.len(), 2);
    assert_eq!(alignment.file_count(), 2);
    assert_eq!(alignment.fits()[0].records("values"), Some(1000));

    let (_, best_score) = aligner.evaluate(alignment.assignments()).unwrap();
    assert!(best_score > combined_score);
}

#[test]
fn test_under_budget_keeps_one_file_per_assignment() {
    let aligner = BlockAligner::new(
        build_disjoint(),
        Arc::new(MinFilesMeasure),
        AlignerConfig::default(),
    );
    let alignment = aligner.align().unwrap();

    assert_eq!(alignment.len(), 1);
    assert_eq!(alignment.file_count(), 1);
    assert_eq!(alignment.file_names(), vec!["big_values_FULL.nc".to_string()]);
}

#[test]
fn test_registry_resolves_configured_measure() {
    let config = AlignerConfig {
        measure: "MFM".into(),
        ..AlignerConfig::default()
    };
    let aligner =
        BlockAligner::from_registry(build_disjoint(), &MeasureRegistry::with_defaults(), config)
            .unwrap();
    assert_eq!(aligner.align().unwrap().file_count(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// CF dataset
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_climate_split_along_time() {
    let md = build_climate();
    let everything = md.variables().map(|v| v.name.clone()).collect();
    let full_size = DataDescriptor::full(Arc::clone(&md), everything)
        .unwrap()
        .estimate_size()
        .unwrap();

    let config = AlignerConfig {
        block_size: full_size * 3 / 4,
        estimation_margin: 0,
        split_dimension: Some("time".into()),
        ..AlignerConfig::default()
    };
    let alignment = BlockAligner::new(Arc::clone(&md), Arc::new(MinFilesMeasure), config)
        .align()
        .unwrap();

    assert_eq!(alignment.len(), 1);
    assert!(alignment.file_count() > 1);
    let windows = windows_of(&alignment);
    assert_eq!(windows.len(), alignment.file_count());
    assert_tiles(&windows, 0, 11);
}

#[test]
fn test_climate_file_names_round_trip() {
    let md = build_climate();
    let config = AlignerConfig {
        block_size: 1500,
        estimation_margin: 0,
        split_dimension: Some("time".into()),
        ..AlignerConfig::default()
    };
    let alignment = BlockAligner::new(Arc::clone(&md), Arc::new(MinFilesMeasure), config)
        .align()
        .unwrap();

    let Some(CoordinateValues::Float64(times)) = md.coordinate_values("time") else {
        panic!("time coordinate missing");
    };
    for (dd, name) in alignment.descriptors().zip(alignment.file_names()) {
        let window = dd.split_range().unwrap();
        let info = parse_file_name(&name).unwrap();

        assert_eq!(info.split_var.as_deref(), Some("time"));
        assert!(!info.vars.contains(&"time".to_string()));
        assert!(info.vars.contains(&"time_bnds".to_string()));
        assert!(info.vars.contains(&"tas".to_string()));
        assert_eq!(
            info.typed_range,
            Some(TypedRange::Float64(
                times[window.start as usize],
                times[window.end as usize]
            ))
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Determinism and hand-off
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_fingerprint_determinism() {
    let plan = |block_size: u64| {
        BlockAligner::new(
            build_disjoint(),
            Arc::new(MaxUnlimitedRecordsMeasure),
            AlignerConfig {
                block_size,
                estimation_margin: 0,
                ..AlignerConfig::default()
            },
        )
        .align()
        .unwrap()
    };

    let a = plan(5000);
    let b = plan(5000);
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), plan(1_000_000).fingerprint());
}

#[test]
fn test_plan_hand_off_through_queue() {
    let config = AlignerConfig {
        queue_capacity: 2,
        ..AlignerConfig::with_block_size(64_000_000)
    };
    let queue = Arc::new(WorkQueue::from_config(&config));
    assert_eq!(queue.capacity(), 2);

    let alignment = BlockAligner::new(build_large_table(), Arc::new(MinFilesMeasure), config)
        .align()
        .unwrap();
    let expected = alignment.file_names();

    let writer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut written = Vec::new();
            while let Some(name) = queue.take() {
                written.push(name);
            }
            written
        })
    };

    for name in alignment.file_names() {
        queue.put(name).unwrap();
    }
    queue.complete();

    assert_eq!(writer.join().unwrap(), expected);
}
