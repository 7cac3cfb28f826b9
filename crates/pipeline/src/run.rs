//! Run orchestrator for one watershed
//!
//! Stages run strictly in order. Each stage computes in memory, then its
//! artifact is written atomically (temp file + rename) and recorded in the
//! manifest before the next stage starts. The cancel token is checked at
//! stage boundaries only.

use crate::cache::{CacheIndex, KeyBuilder};
use crate::config::VbetConfig;
use crate::error::PipelineError;
use crate::fsutil::{file_sha256, sha256_hex, write_atomic};
use crate::manifest::{now, Artifact, ArtifactKind, Manifest, RunStatus, MANIFEST_FILE};
use crate::project::{ProjectDescriptor, ProjectLayer, PROJECT_FILE};
use crate::state::{Outcome, Stage};
use crate::workdir::WorkDir;
use geo::{Geometry, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};
use vbet_algorithms::classify::{classify, layer_name, ClassifiedLayer};
use vbet_algorithms::cleaning::{clean_layer, CleanedLayer};
use vbet_algorithms::evidence::{compute_likelihood, EvidenceComponents};
use vbet_algorithms::network::{load_network, AnchorId, Network};
use vbet_core::io::{
    read_geotiff, read_geotiff_from_buffer, read_layer, read_layer_str, write_geotiff_to_buffer, write_layer_string,
    write_package, GeoTiffOptions, PackageIndex,
};
use vbet_core::vector::{AttributeValue, Feature, FeatureCollection, FeatureId};
use vbet_core::{Error, GridSpec, Raster};

pub const INTERMEDIATES_DIR: &str = "intermediates";
pub const OUTPUTS_DIR: &str = "outputs";
pub const PACKAGE_DIR: &str = "vbet";
const STAGING_DIR: &str = ".vbet.staging";

/// Input files of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPaths {
    pub network: PathBuf,
    pub waterbodies: PathBuf,
    pub slope: PathBuf,
    pub hand: PathBuf,
    pub hillshade: PathBuf,
}

/// Everything needed to run one watershed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub huc: String,
    #[serde(flatten)]
    pub inputs: InputPaths,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub config: VbetConfig,
    /// Discard all intermediates before running
    #[serde(default)]
    pub force: bool,
    /// Remove the working directory when the run ends
    #[serde(default)]
    pub cleanup: bool,
    #[serde(default)]
    pub temp_folder: Option<PathBuf>,
    /// Extra project metadata
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress hooks, called from the thread executing the run
pub trait RunObserver: Sync {
    fn stage_started(&self, _huc: &str, _stage: Stage) {}
    fn stage_finished(&self, _huc: &str, _stage: Stage) {}
    fn cache_hit(&self, _huc: &str, _artifact: &str) {}
    fn run_finished(&self, _huc: &str, _status: RunStatus) {}
}

/// Observer that ignores every event
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    pub name: String,
    pub threshold: f64,
    pub area: f64,
    pub part_count: usize,
    pub classification_cached: bool,
    pub repaired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub huc: String,
    pub output_dir: PathBuf,
    pub likelihood_cached: bool,
    pub layers: Vec<LayerSummary>,
    pub manifest: PathBuf,
}

/// Walks the stage machine and reports transitions
struct Tracker<'a> {
    huc: &'a str,
    stage: Stage,
    observer: &'a dyn RunObserver,
    cancel: &'a CancelToken,
}

impl Tracker<'_> {
    fn start(&mut self) -> Result<(), PipelineError> {
        self.enter(Stage::Init)
    }

    fn advance(&mut self) -> Result<Stage, PipelineError> {
        self.observer.stage_finished(self.huc, self.stage);
        let next = self.stage.transition(Outcome::Succeeded);
        if !next.is_terminal() {
            self.enter(next)?;
        } else {
            self.stage = next;
        }
        Ok(next)
    }

    fn enter(&mut self, stage: Stage) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            warn!(%stage, "cancelled");
            return Err(PipelineError::Cancelled { stage });
        }
        self.stage = stage;
        info!(%stage, "stage started");
        self.observer.stage_started(self.huc, stage);
        Ok(())
    }
}

/// Run one watershed end to end.
///
/// The manifest is written on every exit path. On failure it records the
/// error kind and the stage it happened in.
pub fn run(req: &RunRequest, observer: &dyn RunObserver, cancel: &CancelToken) -> Result<RunSummary, PipelineError> {
    let span = info_span!("vbet", huc = %req.huc);
    let _enter = span.enter();

    let mut manifest = Manifest::new(&req.huc);
    let mut tracker = Tracker {
        huc: &req.huc,
        stage: Stage::Init,
        observer,
        cancel,
    };
    let result = execute(req, &mut tracker, &mut manifest);

    match &result {
        Ok(_) => manifest.succeed(),
        Err(e) => {
            let stage = e.stage().unwrap_or(tracker.stage);
            error!(%stage, error = %e, "run failed");
            manifest.fail(e.kind_name(), stage, e.to_string());
        }
    }
    let manifest_path = req.output_dir.join(OUTPUTS_DIR).join(MANIFEST_FILE);
    let written = manifest.write(&manifest_path);
    observer.run_finished(&req.huc, manifest.status);

    match (result, written) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(e)) => Err(PipelineError::at(Stage::WritingOutputs)(e)),
        (Err(e), Err(w)) => {
            warn!(error = %w, "manifest not written");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
    }
}

struct Inputs {
    slope: Raster<f64>,
    hand: Raster<f64>,
    network: Network,
    spec: GridSpec,
    hashes: BTreeMap<&'static str, String>,
}

fn execute(req: &RunRequest, tracker: &mut Tracker, manifest: &mut Manifest) -> Result<RunSummary, PipelineError> {
    let config = &req.config;
    let out = req.output_dir.as_path();
    let inter = out.join(INTERMEDIATES_DIR);
    let outputs = out.join(OUTPUTS_DIR);

    // Init
    tracker.start()?;
    let at = PipelineError::at(Stage::Init);
    config.validate().map_err(at)?;
    if req.force && inter.exists() {
        info!("force: discarding intermediates");
        std::fs::remove_dir_all(&inter).map_err(|e| PipelineError::at(Stage::Init)(Error::io(&inter, e)))?;
    }
    let package_dir = outputs.join(PACKAGE_DIR);
    if package_dir.exists() {
        std::fs::remove_dir_all(&package_dir)
            .map_err(|e| PipelineError::at(Stage::Init)(Error::io(&package_dir, e)))?;
    }
    let project_path = outputs.join(PROJECT_FILE);
    if project_path.is_file() {
        std::fs::remove_file(&project_path)
            .map_err(|e| PipelineError::at(Stage::Init)(Error::io(&project_path, e)))?;
    }
    for dir in [&inter, &outputs] {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::at(Stage::Init)(Error::io(dir, e)))?;
    }
    let workdir = WorkDir::create(req.temp_folder.as_deref(), out, &req.huc, req.cleanup)
        .map_err(PipelineError::at(Stage::Init))?;
    let mut cache = CacheIndex::load(&inter);

    // LoadingInputs
    tracker.advance()?;
    let inputs = load_inputs(req, workdir.path()).map_err(PipelineError::at(Stage::LoadingInputs))?;
    info!(
        reaches = inputs.network.reaches.len(),
        waterbodies = inputs.network.waterbodies.len(),
        skipped = inputs.network.skipped_geometries,
        duplicates = inputs.network.duplicate_features,
        rows = inputs.spec.rows,
        cols = inputs.spec.cols,
        "inputs loaded"
    );

    // ComputingLikelihood
    tracker.advance()?;
    let (likelihood, likelihood_key, likelihood_cached) = likelihood_stage(req, &inputs, &mut cache, manifest, tracker)
        .map_err(PipelineError::at(Stage::ComputingLikelihood))?;
    let stats = likelihood.statistics();
    debug!(min = ?stats.min, max = ?stats.max, mean = ?stats.mean, cached = likelihood_cached, "likelihood surface");

    // Classifying
    tracker.advance()?;
    let mut classified = Vec::with_capacity(config.classify.thresholds.len());
    for &threshold in &config.classify.thresholds {
        let layer = classify_stage(
            &likelihood,
            &likelihood_key,
            threshold,
            &inputs.spec,
            out,
            &mut cache,
            manifest,
            tracker,
        )
        .map_err(PipelineError::at(Stage::Classifying))?;
        classified.push(layer);
    }

    // Cleaning
    tracker.advance()?;
    let drainage = config
        .clean
        .require_network_contact
        .then(|| inputs.network.drainage_mask(&inputs.spec));
    let cleaned = classified
        .iter()
        .map(|(layer, _)| clean_layer(layer, drainage.as_ref(), &config.clean))
        .collect::<vbet_core::Result<Vec<_>>>()
        .map_err(PipelineError::at(Stage::Cleaning))?;
    for layer in &cleaned {
        info!(
            layer = %layer.name,
            area = layer.area,
            parts = layer.part_count,
            repaired = layer.repaired,
            "layer cleaned"
        );
    }

    // WritingOutputs
    tracker.advance()?;
    write_outputs(req, &inputs, &cleaned, &classified, manifest).map_err(PipelineError::at(Stage::WritingOutputs))?;

    tracker.advance()?;
    drop(workdir);

    Ok(RunSummary {
        huc: req.huc.clone(),
        output_dir: out.to_path_buf(),
        likelihood_cached,
        layers: cleaned
            .iter()
            .zip(&classified)
            .map(|(c, (_, cached))| LayerSummary {
                name: c.name.clone(),
                threshold: c.threshold,
                area: c.area,
                part_count: c.part_count,
                classification_cached: *cached,
                repaired: c.repaired,
            })
            .collect(),
        manifest: outputs.join(MANIFEST_FILE),
    })
}

fn load_inputs(req: &RunRequest, scratch: &Path) -> vbet_core::Result<Inputs> {
    let paths = &req.inputs;
    let slope: Raster<f64> = read_geotiff(&paths.slope)?;
    let hand: Raster<f64> = read_geotiff(&paths.hand)?;
    let hillshade: Raster<f64> = read_geotiff(&paths.hillshade)?;

    let spec = slope.grid_spec();
    spec.check_aligned(&hand.grid_spec(), "slope", "hand")?;
    spec.check_aligned(&hillshade.grid_spec(), "slope", "hillshade")?;

    let lines = read_layer(&paths.network)?;
    let areas = read_layer(&paths.waterbodies)?;
    let network = load_network(&lines, &areas, spec.crs.as_ref(), spec.cell_size(), &req.config.network)?;

    // filtered network in the terrain CRS, kept for diagnosis
    let mut filtered = FeatureCollection::with_crs(spec.crs.clone());
    for reach in &network.reaches {
        filtered.push(
            Feature::new(Geometry::MultiLineString(reach.geometry.clone()))
                .with_id(match reach.id {
                    AnchorId::Given(n) => FeatureId::Number(n),
                    AnchorId::Derived(_) => FeatureId::String(reach.id.to_string()),
                })
                .with_property("reach_code", AttributeValue::String(reach.reach_code.clone())),
        );
    }
    write_atomic(&scratch.join("network.geojson"), write_layer_string(&filtered).as_bytes())?;

    let mut hashes = BTreeMap::new();
    hashes.insert("slope", file_sha256(&paths.slope)?);
    hashes.insert("hand", file_sha256(&paths.hand)?);
    hashes.insert("network", file_sha256(&paths.network)?);
    hashes.insert("waterbodies", file_sha256(&paths.waterbodies)?);

    Ok(Inputs {
        slope,
        hand,
        network,
        spec,
        hashes,
    })
}

fn relative(out: &Path, path: &Path) -> String {
    path.strip_prefix(out).unwrap_or(path).to_string_lossy().replace('\\', "/")
}

/// Write an artifact under the output directory and record it
fn persist(
    out: &Path,
    path: &Path,
    bytes: &[u8],
    name: &str,
    kind: ArtifactKind,
    stage: Stage,
    manifest: &mut Manifest,
) -> vbet_core::Result<()> {
    write_atomic(path, bytes)?;
    manifest.push(Artifact {
        name: name.to_string(),
        kind,
        stage,
        path: relative(out, path),
        sha256: sha256_hex(bytes),
        cached: false,
    });
    Ok(())
}

fn reuse(out: &Path, path: &Path, bytes: &[u8], name: &str, kind: ArtifactKind, stage: Stage, manifest: &mut Manifest) {
    manifest.push(Artifact {
        name: name.to_string(),
        kind,
        stage,
        path: relative(out, path),
        sha256: sha256_hex(bytes),
        cached: true,
    });
}

fn likelihood_stage(
    req: &RunRequest,
    inputs: &Inputs,
    cache: &mut CacheIndex,
    manifest: &mut Manifest,
    tracker: &Tracker,
) -> vbet_core::Result<(Raster<f32>, String, bool)> {
    const NAME: &str = "likelihood";
    let out = req.output_dir.as_path();
    let path = out.join(INTERMEDIATES_DIR).join("likelihood.tif");
    let mut key = KeyBuilder::new(NAME);
    for (name, hash) in &inputs.hashes {
        key = key.input(name, hash);
    }
    let key = key
        .config("evidence", &req.config.evidence)?
        .config("network", &req.config.network)?
        .finish();

    if let Some(bytes) = cache.lookup(NAME, &key) {
        match read_geotiff_from_buffer::<f32>(&bytes) {
            Ok(raster) if inputs.spec.check_aligned(&raster.grid_spec(), "slope", NAME).is_ok() => {
                info!("likelihood surface reused from cache");
                tracker.observer.cache_hit(tracker.huc, NAME);
                reuse(out, &path, &bytes, NAME, ArtifactKind::Raster, Stage::ComputingLikelihood, manifest);
                return Ok((raster, key, true));
            }
            _ => debug!("cached likelihood unusable, recomputing"),
        }
    }

    let surface = compute_likelihood(&inputs.slope, &inputs.hand, &inputs.network, &req.config.evidence)?;
    let bytes = write_geotiff_to_buffer(&surface.likelihood, None)?;
    persist(out, &path, &bytes, NAME, ArtifactKind::Raster, Stage::ComputingLikelihood, manifest)?;
    cache.record(NAME, &key, "likelihood.tif", &bytes);
    cache.save()?;

    if let Some(components) = &surface.components {
        write_components(out, components, manifest)?;
    }
    Ok((surface.likelihood, key, false))
}

fn write_components(out: &Path, c: &EvidenceComponents, manifest: &mut Manifest) -> vbet_core::Result<()> {
    let dir = out.join(INTERMEDIATES_DIR).join("components");
    for (name, raster) in [
        ("slope_evidence", &c.slope),
        ("hand_evidence", &c.hand),
        ("distance_evidence", &c.distance),
        ("flow_area_evidence", &c.flow_area),
        ("topo_evidence", &c.topo),
        ("channel_evidence", &c.channel),
        ("distance", &c.raw_distance),
    ] {
        let bytes = write_geotiff_to_buffer(raster, None)?;
        persist(
            out,
            &dir.join(format!("{name}.tif")),
            &bytes,
            name,
            ArtifactKind::Raster,
            Stage::ComputingLikelihood,
            manifest,
        )?;
    }
    Ok(())
}

fn polygons_to_layer(polygons: &[Polygon<f64>], threshold: f64, spec: &GridSpec) -> FeatureCollection {
    let mut fc = FeatureCollection::with_crs(spec.crs.clone());
    for (i, p) in polygons.iter().enumerate() {
        fc.push(
            Feature::new(Geometry::Polygon(p.clone()))
                .with_id(FeatureId::Number(i as i64))
                .with_property("threshold", AttributeValue::Float(threshold)),
        );
    }
    fc
}

fn layer_to_polygons(fc: &FeatureCollection) -> Vec<Polygon<f64>> {
    fc.iter()
        .filter_map(|f| match &f.geometry {
            Some(Geometry::Polygon(p)) => Some(p.clone()),
            _ => None,
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn classify_stage(
    likelihood: &Raster<f32>,
    likelihood_key: &str,
    threshold: f64,
    spec: &GridSpec,
    out: &Path,
    cache: &mut CacheIndex,
    manifest: &mut Manifest,
    tracker: &Tracker,
) -> vbet_core::Result<(ClassifiedLayer, bool)> {
    let name = layer_name(threshold);
    let level = (threshold * 100.0).round() as i64;
    let mask_name = format!("threshold_{level}");
    let raw_name = format!("raw_{name}");
    let mask_file = format!("{mask_name}.tif");
    let raw_file = format!("{raw_name}.geojson");
    let mask_path = out.join(INTERMEDIATES_DIR).join(&mask_file);
    let raw_path = out.join(INTERMEDIATES_DIR).join(&raw_file);
    let key = KeyBuilder::new("classify")
        .upstream(likelihood_key)
        .config("threshold", &threshold)?
        .finish();

    if let (Some(mask_bytes), Some(raw_bytes)) = (cache.lookup(&mask_name, &key), cache.lookup(&raw_name, &key)) {
        let mask = read_geotiff_from_buffer::<u8>(&mask_bytes)
            .ok()
            .filter(|m| spec.check_aligned(&m.grid_spec(), "slope", &mask_name).is_ok());
        let raw = std::str::from_utf8(&raw_bytes)
            .ok()
            .and_then(|text| read_layer_str(text).ok());
        if let (Some(mask), Some(raw)) = (mask, raw) {
            info!(layer = %name, "classification reused from cache");
            tracker.observer.cache_hit(tracker.huc, &name);
            reuse(out, &mask_path, &mask_bytes, &mask_name, ArtifactKind::Raster, Stage::Classifying, manifest);
            reuse(out, &raw_path, &raw_bytes, &raw_name, ArtifactKind::Vector, Stage::Classifying, manifest);
            let layer = ClassifiedLayer {
                name,
                threshold,
                mask,
                polygons: layer_to_polygons(&raw),
            };
            return Ok((layer, true));
        }
        debug!(layer = %name, "cached classification unusable, recomputing");
    }

    let layer = classify(likelihood, threshold)?;
    let mask_bytes = write_geotiff_to_buffer(&layer.mask, Some(GeoTiffOptions::mask()))?;
    persist(out, &mask_path, &mask_bytes, &mask_name, ArtifactKind::Raster, Stage::Classifying, manifest)?;
    let raw_text = write_layer_string(&polygons_to_layer(&layer.polygons, threshold, spec));
    persist(out, &raw_path, raw_text.as_bytes(), &raw_name, ArtifactKind::Vector, Stage::Classifying, manifest)?;
    cache.record(&mask_name, &key, &mask_file, &mask_bytes);
    cache.record(&raw_name, &key, &raw_file, raw_text.as_bytes());
    cache.save()?;
    debug!(layer = %layer.name, polygons = layer.polygons.len(), "classified");
    Ok((layer, false))
}

fn cleaned_to_layer(layer: &CleanedLayer, spec: &GridSpec) -> FeatureCollection {
    let mut fc = FeatureCollection::with_crs(spec.crs.clone());
    fc.push(
        Feature::new(Geometry::MultiPolygon(layer.geometry.clone()))
            .with_id(FeatureId::Number(1))
            .with_property("layer", AttributeValue::String(layer.name.clone()))
            .with_property("threshold", AttributeValue::Float(layer.threshold))
            .with_property("area", AttributeValue::Float(layer.area))
            .with_property("perimeter", AttributeValue::Float(layer.perimeter))
            .with_property("part_count", AttributeValue::Int(layer.part_count as i64))
            .with_property("repaired", AttributeValue::Bool(layer.repaired)),
    );
    fc
}

fn write_outputs(
    req: &RunRequest,
    inputs: &Inputs,
    cleaned: &[CleanedLayer],
    classified: &[(ClassifiedLayer, bool)],
    manifest: &mut Manifest,
) -> vbet_core::Result<()> {
    let out = req.output_dir.as_path();
    let outputs = out.join(OUTPUTS_DIR);
    let staging = outputs.join(STAGING_DIR);
    let package = outputs.join(PACKAGE_DIR);

    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(|e| Error::io(&staging, e))?;
    }
    let layers: Vec<(String, FeatureCollection)> = cleaned
        .iter()
        .map(|l| (l.name.clone(), cleaned_to_layer(l, &inputs.spec)))
        .collect();
    let staged = write_package(&staging, &layers, inputs.spec.crs.as_ref())
        .and_then(|index| describe_staged(req, &index, classified, &staging).map(|a| (index, a)));
    let (index, artifacts) = match staged {
        Ok(staged) => staged,
        Err(e) => {
            discard_staging(&staging);
            return Err(e);
        }
    };

    if package.exists() {
        std::fs::remove_dir_all(&package).map_err(|e| Error::io(&package, e))?;
    }
    if let Err(e) = std::fs::rename(&staging, &package) {
        let project_path = outputs.join(PROJECT_FILE);
        if let Err(e) = std::fs::remove_file(&project_path) {
            warn!(path = %project_path.display(), error = %e, "could not remove project descriptor");
        }
        discard_staging(&staging);
        return Err(Error::io(&package, e));
    }
    for artifact in artifacts {
        manifest.push(artifact);
    }
    info!(layers = index.layers.len(), "outputs written");
    Ok(())
}

fn discard_staging(staging: &Path) {
    if staging.exists() {
        if let Err(e) = std::fs::remove_dir_all(staging) {
            warn!(path = %staging.display(), error = %e, "could not remove staged package");
        }
    }
}

/// Hash the staged package and write the project descriptor that points
/// at its final location
fn describe_staged(
    req: &RunRequest,
    index: &PackageIndex,
    classified: &[(ClassifiedLayer, bool)],
    staging: &Path,
) -> vbet_core::Result<Vec<Artifact>> {
    let out = req.output_dir.as_path();
    let outputs = out.join(OUTPUTS_DIR);
    let package = outputs.join(PACKAGE_DIR);
    let mut artifacts = Vec::with_capacity(index.layers.len() + 2);
    for entry in &index.layers {
        artifacts.push(Artifact {
            name: entry.name.clone(),
            kind: ArtifactKind::Vector,
            stage: Stage::WritingOutputs,
            path: relative(out, &package.join(&entry.file)),
            sha256: file_sha256(&staging.join(&entry.file))?,
            cached: false,
        });
    }
    artifacts.push(Artifact {
        name: "vbet".to_string(),
        kind: ArtifactKind::Package,
        stage: Stage::WritingOutputs,
        path: relative(out, &package),
        sha256: file_sha256(&staging.join(vbet_core::io::INDEX_FILE))?,
        cached: false,
    });

    let mut project = ProjectDescriptor::new(&req.huc, now(), &req.meta);
    let p = &req.inputs;
    project.inputs = vec![
        ProjectLayer::new("SLOPE_RASTER", "Slope", "raster", relative(out, &p.slope)),
        ProjectLayer::new("HAND_RASTER", "Height above nearest drainage", "raster", relative(out, &p.hand)),
        ProjectLayer::new("HILLSHADE", "Hillshade", "raster", relative(out, &p.hillshade)),
        ProjectLayer::new("FLOWLINES", "Flowlines", "vector", relative(out, &p.network)),
        ProjectLayer::new("FLOW_AREA", "Flow areas", "vector", relative(out, &p.waterbodies)),
    ];
    project.intermediates.push(ProjectLayer::new(
        "VBET_EVIDENCE",
        "Valley bottom likelihood",
        "raster",
        format!("{INTERMEDIATES_DIR}/likelihood.tif"),
    ));
    for (layer, _) in classified {
        let level = (layer.threshold * 100.0).round() as i64;
        project.intermediates.push(ProjectLayer::new(
            &format!("THRESH_{level}"),
            &format!("Raw threshold at {level}%"),
            "vector",
            format!("{INTERMEDIATES_DIR}/raw_{}.geojson", layer.name),
        ));
    }
    project.outputs.push(ProjectLayer::new(
        "VBET_OUTPUTS",
        "Valley bottom package",
        "package",
        format!("{OUTPUTS_DIR}/{PACKAGE_DIR}"),
    ));
    for entry in &index.layers {
        let level = entry.name.trim_start_matches("vbet_");
        project.outputs.push(ProjectLayer::new(
            &format!("VBET_{level}"),
            &format!("Threshold at {level}%"),
            "vector",
            format!("{OUTPUTS_DIR}/{PACKAGE_DIR}/{}", entry.file),
        ));
    }
    let project_path = outputs.join(PROJECT_FILE);
    project.write(&project_path)?;
    artifacts.push(Artifact {
        name: "project".to_string(),
        kind: ArtifactKind::Document,
        stage: Stage::WritingOutputs,
        path: relative(out, &project_path),
        sha256: file_sha256(&project_path)?,
        cached: false,
    });
    Ok(artifacts)
}
