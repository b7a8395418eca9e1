use std::path::{Path, PathBuf};

use las::point::Classification;
use rschm::raster::metadata::Metadata;
use rschm::raster::quantize::decode_u16_le;
use rschm::{BoundingBox, Error, IdentityProvider, Phase, Pipeline, PipelineConfig};
use tempfile::TempDir;

const GROUND: Classification = Classification::Ground;
const OTHER: Classification = Classification::Unclassified;

fn write_las(path: &Path, points: &[(f64, f64, f64, Classification)]) {
    let mut writer = las::Writer::from_path(path, las::Header::default()).unwrap();
    for &(x, y, z, classification) in points {
        writer
            .write_point(las::Point {
                x,
                y,
                z,
                classification,
                ..Default::default()
            })
            .unwrap();
    }
}

fn config(input: &Path, output: &Path, resolution: usize) -> PipelineConfig {
    PipelineConfig {
        input_dir: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        resolution,
        chunk_size: 2,
        source_crs: "EPSG:3857".to_string(),
        workers: 3,
        ground_class: 2,
    }
}

struct Fixture {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

fn fixture(files: &[(&str, Vec<(f64, f64, f64, Classification)>)]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("tiles");
    let output = dir.path().join("web").join("data");
    std::fs::create_dir_all(&input).unwrap();
    for (name, points) in files {
        write_las(&input.join(name), points);
    }
    Fixture {
        _dir: dir,
        input,
        output,
    }
}

fn scenario_a() -> Fixture {
    fixture(&[
        (
            "file1.las",
            vec![
                (0.0, 0.0, 5.0, GROUND),
                (2.0, 2.0, 8.0, OTHER),
                (10.0, 10.0, 5.0, GROUND),
                (8.0, 8.0, 8.0, OTHER),
            ],
        ),
        ("file2.las", vec![]),
    ])
}

#[test]
fn test_scenario_a_two_files_one_empty() {
    let fx = scenario_a();
    let pipeline = Pipeline::new(config(&fx.input, &fx.output, 2), IdentityProvider).unwrap();
    let summary = pipeline.run().unwrap();
    let out = &summary.output;

    assert_eq!(out.files.len(), 2);
    assert_eq!(*out.extent.bbox(), BoundingBox::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(out.edges.x_edges(), &[0.0, 5.0, 10.0]);

    let s = &out.surfaces;
    for (ix, iy) in [(0, 0), (1, 1)] {
        let c = s.index(ix, iy);
        assert_eq!(s.dsm_mean[c], 6.5);
        assert_eq!(s.dtm_mean[c], 5.0);
        assert_eq!(s.chm[c], 1.5);
        assert!(s.valid_mask[c]);
    }
    for (ix, iy) in [(0, 1), (1, 0)] {
        let c = s.index(ix, iy);
        assert_eq!(s.dsm_mean[c], 0.0);
        assert!(!s.valid_mask[c]);
    }

    // image order: row 0 is the north row, column 0 the west column
    let mask = std::fs::read(&summary.paths.mask).unwrap();
    assert_eq!(mask, vec![0, 1, 1, 0]);

    let chm = decode_u16_le(&std::fs::read(&summary.paths.chm).unwrap()).unwrap();
    assert_eq!(chm, vec![0, 65535, 65535, 0]);
    let dtm = decode_u16_le(&std::fs::read(&summary.paths.dtm).unwrap()).unwrap();
    assert_eq!(dtm, vec![0, 65535, 65535, 0]);

    let metadata = Metadata::read(&summary.paths.metadata).unwrap();
    assert_eq!(metadata.width, 2);
    assert_eq!(metadata.height, 2);
    assert_eq!(metadata.crs, "EPSG:3857");
    assert_eq!(metadata.dx, 5.0);
    assert_eq!(metadata.dy, 5.0);
    assert_eq!(metadata.chm_offset, 0.0);
    assert_eq!(metadata.chm_max_height, 1.5);
    assert_eq!(metadata.dtm_offset, 0.0);
    assert_eq!(metadata.dtm_max_height, 5.0);
    assert_eq!(metadata.bounds.maxx, 10.0);
    assert!(metadata.warnings.is_empty());

    // decoded values land within one scale step of the raw surfaces
    let chm_value = chm[1] as f64 * metadata.chm_scale + metadata.chm_offset;
    assert!((chm_value - 1.5).abs() <= metadata.chm_scale);
    let dtm_value = dtm[1] as f64 * metadata.dtm_scale + metadata.dtm_offset;
    assert!((dtm_value - 5.0).abs() <= metadata.dtm_scale);
}

#[test]
fn test_scenario_b_no_ground_returns() {
    let fx = fixture(&[(
        "tile.las",
        vec![
            (0.0, 0.0, 12.0, OTHER),
            (1.0, 3.0, 20.0, Classification::HighVegetation),
            (4.0, 4.0, 7.0, OTHER),
            (3.0, 1.0, 9.5, Classification::Building),
        ],
    )]);
    let pipeline = Pipeline::new(config(&fx.input, &fx.output, 2), IdentityProvider).unwrap();
    let out = pipeline.process().unwrap();

    assert_eq!(out.grids.total_dtm_points(), 0);
    let s = &out.surfaces;
    assert!(s.dtm_mean.iter().all(|&v| v == 0.0));
    assert_eq!(s.chm, s.dsm_mean);
    assert!(s.valid_mask.iter().all(|&v| !v));
    assert!(out.artifacts.mask.iter().all(|&v| v == 0));
    assert_eq!(out.artifacts.dtm.scale, 1.0);
}

#[test]
fn test_single_cell_is_global_mean() {
    let fx = fixture(&[
        (
            "a.las",
            vec![(0.0, 0.0, 1.0, GROUND), (3.0, 1.0, 10.0, OTHER)],
        ),
        (
            "b.las",
            vec![(7.0, 9.0, 4.0, GROUND), (2.0, 2.0, 6.0, OTHER), (5.0, 5.0, 7.0, GROUND)],
        ),
    ]);
    let pipeline = Pipeline::new(config(&fx.input, &fx.output, 1), IdentityProvider).unwrap();
    let out = pipeline.process().unwrap();

    assert_eq!(out.surfaces.dsm_mean, vec![28.0 / 5.0]);
    assert_eq!(out.surfaces.dtm_mean, vec![4.0]);
    assert_eq!(out.artifacts.mask, vec![1]);
}

#[test]
fn test_edges_cover_every_file() {
    // the far tile moves the extent; every point must still be binned
    let fx = fixture(&[
        (
            "near.las",
            vec![(0.0, 0.0, 1.0, GROUND), (1.0, 1.0, 2.0, OTHER), (0.5, 0.25, 3.0, GROUND)],
        ),
        ("far.las", vec![(100.0, 100.0, 4.0, GROUND)]),
    ]);
    let pipeline = Pipeline::new(config(&fx.input, &fx.output, 4), IdentityProvider).unwrap();
    let out = pipeline.process().unwrap();

    assert_eq!(out.edges.x_edges().last(), Some(&100.0));
    assert_eq!(out.edges.y_edges().first(), Some(&0.0));
    assert_eq!(out.grids.total_dsm_points(), 4);
    assert_eq!(out.grids.total_dtm_points(), 3);
    assert_eq!(out.grids.dsm_count(3, 3), 1);
    assert_eq!(out.grids.dsm_count(0, 0), 3);
}

#[test]
fn test_worker_count_does_not_change_output() {
    let fx = fixture(&[
        ("a.las", vec![(0.0, 0.0, 1.0, GROUND), (6.0, 2.0, 3.0, OTHER)]),
        ("b.las", vec![(1.0, 9.0, 2.0, GROUND), (6.5, 2.5, 5.0, GROUND)]),
        ("c.las", vec![(9.0, 9.0, 8.0, OTHER), (0.5, 0.5, 4.0, OTHER)]),
        ("d.las", vec![(3.0, 3.0, 6.0, GROUND)]),
    ]);

    let mut outputs = Vec::new();
    for workers in [1, 4] {
        let mut c = config(&fx.input, &fx.output, 3);
        c.workers = workers;
        let out = Pipeline::new(c, IdentityProvider).unwrap().process().unwrap();
        outputs.push(out.artifacts);
    }
    assert_eq!(outputs[0].chm.data, outputs[1].chm.data);
    assert_eq!(outputs[0].dtm.data, outputs[1].dtm.data);
    assert_eq!(outputs[0].mask, outputs[1].mask);
    assert_eq!(outputs[0].metadata, outputs[1].metadata);
}

#[test]
fn test_degenerate_extent_warns_and_flattens() {
    let fx = fixture(&[("one.las", vec![(4.0, 4.0, 3.0, GROUND), (4.0, 4.0, 5.0, OTHER)])]);
    let pipeline = Pipeline::new(config(&fx.input, &fx.output, 3), IdentityProvider).unwrap();
    let summary = pipeline.run().unwrap();
    let out = &summary.output;

    assert_eq!(out.artifacts.metadata.warnings.len(), 2);
    assert_eq!(out.artifacts.metadata.dx, 0.0);
    // both points fall in the last bin on each axis: north-east pixel
    assert_eq!(out.grids.dsm_count(2, 2), 2);
    assert_eq!(out.artifacts.mask, vec![0, 0, 1, 0, 0, 0, 0, 0, 0]);
    assert_eq!(
        Metadata::read(&summary.paths.metadata).unwrap().warnings.len(),
        2
    );
}

#[test]
fn test_unreadable_file_aborts_without_artifacts() {
    let fx = scenario_a();
    std::fs::write(fx.input.join("broken.laz"), b"not a point cloud").unwrap();

    let pipeline = Pipeline::new(config(&fx.input, &fx.output, 2), IdentityProvider).unwrap();
    let err = pipeline.run().unwrap_err();

    let (phase, path) = err.failed_task().expect("per-file failure");
    assert_eq!(phase, Phase::Bounds);
    assert!(path.ends_with("broken.laz"));
    match &err {
        Error::Task { source, .. } => assert!(matches!(**source, Error::Read { .. })),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("bounds phase failed on"));
    assert!(!fx.output.exists());
}

#[test]
fn test_empty_inputs_fail_before_grids() {
    let fx = fixture(&[("a.las", vec![]), ("b.las", vec![])]);
    let pipeline = Pipeline::new(config(&fx.input, &fx.output, 2), IdentityProvider).unwrap();
    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, Error::NoValidData { files: 2 }));
    assert!(!fx.output.exists());
}

#[test]
fn test_non_lidar_files_are_ignored() {
    let fx = scenario_a();
    std::fs::write(fx.input.join("README.txt"), b"not a tile").unwrap();
    let pipeline = Pipeline::new(config(&fx.input, &fx.output, 2), IdentityProvider).unwrap();
    let out = pipeline.process().unwrap();
    let names: Vec<String> = out
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["file1.las", "file2.las"]);
}

#[test]
fn test_truncated_file_fails_mid_read() {
    let points: Vec<_> = (0..10)
        .map(|i| (i as f64, i as f64, 1.0 + i as f64, GROUND))
        .collect();
    let fx = fixture(&[("a.las", points), ("b.las", vec![(3.0, 3.0, 2.0, GROUND)])]);
    let path = fx.input.join("a.las");
    let len = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 30).unwrap();
    drop(file);

    let pipeline = Pipeline::new(config(&fx.input, &fx.output, 2), IdentityProvider).unwrap();
    let err = pipeline.run().unwrap_err();

    let (phase, failed) = err.failed_task().expect("per-file failure");
    assert_eq!(phase, Phase::Bounds);
    assert!(failed.ends_with("a.las"));
    match &err {
        Error::Task { source, .. } => assert!(matches!(**source, Error::Read { .. })),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!fx.output.exists());
}
