//! Whole-run scenarios on a 10x10 synthetic watershed

use approx::assert_relative_eq;
use geo::line_string;
use std::path::Path;
use vbet_core::io::{read_package, write_geotiff, write_layer};
use vbet_core::vector::{AttributeValue, Feature, FeatureCollection, FeatureId};
use vbet_core::{GeoTransform, Raster, CRS};
use vbet_pipeline::manifest::MANIFEST_FILE;
use vbet_pipeline::{
    run, CancelToken, InputPaths, Manifest, NoopObserver, PipelineError, RunObserver, RunRequest, RunStatus, Stage,
    VbetConfig,
};

const N: usize = 10;

fn grid(cell: f64) -> Raster<f64> {
    let n = (N as f64 / cell).round() as usize;
    let mut r = Raster::new(n, n);
    r.set_transform(GeoTransform::new(0.0, N as f64, cell, -cell));
    r.set_crs(Some(CRS::from_epsg(32612)));
    r
}

/// Flat slope, HAND 0 in columns 4-5 and 100 elsewhere, one reach down x = 5
fn write_inputs(dir: &Path, hand_cell: f64) -> InputPaths {
    let slope = grid(1.0);
    let mut hand = grid(hand_cell);
    let (rows, cols) = hand.shape();
    for row in 0..rows {
        for col in 0..cols {
            let v = if col == 4 || col == 5 { 0.0 } else { 100.0 };
            hand.set(row, col, v).unwrap();
        }
    }
    let mut hillshade = grid(1.0);
    hillshade.data_mut().fill(180.0);

    let mut network = FeatureCollection::with_crs(Some(CRS::from_epsg(32612)));
    network.push(
        Feature::new(line_string![(x: 5.0, y: 0.0), (x: 5.0, y: 10.0)].into())
            .with_id(FeatureId::Number(7))
            .with_property("FCode", AttributeValue::Int(46006)),
    );
    let waterbodies = FeatureCollection::with_crs(Some(CRS::from_epsg(32612)));

    let paths = InputPaths {
        network: dir.join("network.geojson"),
        waterbodies: dir.join("waterbodies.geojson"),
        slope: dir.join("slope.tif"),
        hand: dir.join("hand.tif"),
        hillshade: dir.join("hillshade.tif"),
    };
    write_geotiff(&slope, &paths.slope, None).unwrap();
    write_geotiff(&hand, &paths.hand, None).unwrap();
    write_geotiff(&hillshade, &paths.hillshade, None).unwrap();
    write_layer(&network, &paths.network).unwrap();
    write_layer(&waterbodies, &paths.waterbodies).unwrap();
    paths
}

fn request(dir: &Path, inputs: InputPaths) -> RunRequest {
    let mut config = VbetConfig::default();
    config.evidence.max_search_distance = 2.0;
    config.classify.thresholds = vec![0.5, 0.9];
    RunRequest {
        huc: "1601020204".to_string(),
        inputs,
        output_dir: dir.join("run"),
        config,
        force: false,
        cleanup: false,
        temp_folder: None,
        meta: Default::default(),
    }
}

fn manifest(req: &RunRequest) -> Manifest {
    Manifest::read(&req.output_dir.join("outputs").join(MANIFEST_FILE)).unwrap()
}

#[test]
fn test_band_becomes_one_polygon() {
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), write_inputs(dir.path(), 1.0));

    let summary = run(&req, &NoopObserver, &CancelToken::new()).unwrap();
    assert!(!summary.likelihood_cached);
    let vbet_50 = &summary.layers[0];
    assert_eq!(vbet_50.name, "vbet_50");
    assert_eq!(vbet_50.part_count, 1);
    assert_relative_eq!(vbet_50.area, 20.0, epsilon = 1e-9);
    assert!(summary.layers[1].area <= vbet_50.area);

    let (index, layers) = read_package(req.output_dir.join("outputs/vbet")).unwrap();
    assert!(index.complete);
    let names: Vec<_> = layers.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["vbet_50", "vbet_90"]);
    assert_eq!(layers[0].1.len(), 1);

    let m = manifest(&req);
    assert_eq!(m.status, RunStatus::Succeeded);
    assert!(m.artifacts.iter().any(|a| a.path == "intermediates/likelihood.tif"));
    assert!(req.output_dir.join("outputs/project.json").exists());
}

#[test]
fn test_rerun_reuses_cached_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request(dir.path(), write_inputs(dir.path(), 1.0));

    let first = run(&req, &NoopObserver, &CancelToken::new()).unwrap();
    let second = run(&req, &NoopObserver, &CancelToken::new()).unwrap();
    assert!(second.likelihood_cached);
    assert!(second.layers.iter().all(|l| l.classification_cached));
    assert_eq!(first.layers, {
        let mut l = second.layers.clone();
        l.iter_mut().for_each(|l| l.classification_cached = false);
        l
    });
    assert!(manifest(&req)
        .artifacts
        .iter()
        .any(|a| a.name == "raw_vbet_50" && a.cached));

    req.force = true;
    let forced = run(&req, &NoopObserver, &CancelToken::new()).unwrap();
    assert!(!forced.likelihood_cached);
    assert!(forced.layers.iter().all(|l| !l.classification_cached));
}

#[test]
fn test_changed_curve_invalidates_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request(dir.path(), write_inputs(dir.path(), 1.0));
    run(&req, &NoopObserver, &CancelToken::new()).unwrap();

    req.config.evidence.max_search_distance = 3.0;
    let summary = run(&req, &NoopObserver, &CancelToken::new()).unwrap();
    assert!(!summary.likelihood_cached);
}

#[test]
fn test_empty_network_fails_in_loading() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request(dir.path(), write_inputs(dir.path(), 1.0));
    run(&req, &NoopObserver, &CancelToken::new()).unwrap();

    req.config.network.reach_codes = Some(vec!["99999".to_string()]);
    let err = run(&req, &NoopObserver, &CancelToken::new()).unwrap_err();
    assert_eq!(err.kind_name(), "EmptyNetworkError");
    assert_eq!(err.stage(), Some(Stage::LoadingInputs));

    let m = manifest(&req);
    assert_eq!(m.status, RunStatus::Failed);
    let failure = m.error.unwrap();
    assert_eq!(failure.kind, "EmptyNetworkError");
    assert_eq!(failure.stage, Stage::LoadingInputs);
    assert!(!req.output_dir.join("outputs/vbet").exists());
}

#[test]
fn test_failed_project_write_leaves_no_package() {
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), write_inputs(dir.path(), 1.0));
    run(&req, &NoopObserver, &CancelToken::new()).unwrap();

    let outputs = req.output_dir.join("outputs");
    let project = outputs.join("project.json");
    std::fs::remove_file(&project).unwrap();
    std::fs::create_dir(&project).unwrap();
    std::fs::write(project.join("keep"), b"x").unwrap();

    let err = run(&req, &NoopObserver, &CancelToken::new()).unwrap_err();
    assert_eq!(err.kind_name(), "IOFailure");
    assert_eq!(err.stage(), Some(Stage::WritingOutputs));
    assert!(!outputs.join("vbet").exists());
    assert!(!outputs.join(".vbet.staging").exists());
    assert!(read_package(outputs.join("vbet")).is_err());

    let m = manifest(&req);
    assert_eq!(m.status, RunStatus::Failed);
    assert_eq!(m.error.unwrap().stage, Stage::WritingOutputs);
}

#[test]
fn test_grid_mismatch_stops_before_likelihood() {
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), write_inputs(dir.path(), 2.0));

    let err = run(&req, &NoopObserver, &CancelToken::new()).unwrap_err();
    assert_eq!(err.kind_name(), "GridMismatchError");
    assert_eq!(err.stage(), Some(Stage::LoadingInputs));
    assert!(!req.output_dir.join("intermediates/likelihood.tif").exists());
}

#[test]
fn test_cleanup_removes_workdir_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request(dir.path(), write_inputs(dir.path(), 2.0));
    let temp = dir.path().join("tmp");
    req.temp_folder = Some(temp.clone());
    req.cleanup = true;

    assert!(run(&req, &NoopObserver, &CancelToken::new()).is_err());
    assert!(!temp.join(&req.huc).exists());
}

struct CancelAfter {
    token: CancelToken,
    stage: Stage,
}

impl RunObserver for CancelAfter {
    fn stage_finished(&self, _huc: &str, stage: Stage) {
        if stage == self.stage {
            self.token.cancel();
        }
    }
}

#[test]
fn test_cancel_between_stages() {
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), write_inputs(dir.path(), 1.0));
    let token = CancelToken::new();
    let observer = CancelAfter {
        token: token.clone(),
        stage: Stage::ComputingLikelihood,
    };

    let err = run(&req, &observer, &token).unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled { stage: Stage::Classifying }));
    assert!(req.output_dir.join("intermediates/likelihood.tif").exists());
    assert!(!req.output_dir.join("outputs/vbet").exists());

    let failure = manifest(&req).error.unwrap();
    assert_eq!(failure.kind, "Cancelled");
    assert_eq!(failure.stage, Stage::Classifying);
}

#[test]
fn test_invalid_curve_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"evidence": {"hand_curve": [[0, 0.2], [10, 0.8]]}}"#).unwrap();
    let err = VbetConfig::from_file(&path).unwrap_err();
    assert_eq!(err.kind().to_string(), "ConfigError");
}

#[test]
fn test_flat_valley_yields_single_band() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 1.0);
    let mut hand = grid(1.0);
    hand.data_mut().fill(0.0);
    write_geotiff(&hand, &inputs.hand, None).unwrap();
    let mut req = request(dir.path(), inputs);
    req.config.evidence.max_search_distance = 5.0;
    req.config.evidence.write_components = true;

    let summary = run(&req, &NoopObserver, &CancelToken::new()).unwrap();
    assert_eq!(summary.layers[0].part_count, 1);
    for name in ["distance", "topo_evidence", "channel_evidence", "flow_area_evidence"] {
        assert!(req
            .output_dir
            .join(format!("intermediates/components/{name}.tif"))
            .exists());
    }

    let likelihood: Raster<f64> =
        vbet_core::io::read_geotiff(req.output_dir.join("intermediates/likelihood.tif")).unwrap();
    let near = likelihood.get(5, 4).unwrap();
    let far = likelihood.get(5, 0).unwrap();
    assert!(near > 0.9);
    assert!(far < near);
}
