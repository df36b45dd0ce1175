//! Per-file batch pipeline: slice, parameterize, encode, decode.
//!
//! A [`Pipeline`] is built once from a [`PipelineConfig`] and the external
//! [`services`], then run on each listed input in turn. Every stage first
//! checks for its output artifact and skips the work when it already exists,
//! so an interrupted batch can be restarted.
//!
//! Stage results are collected in a [`FileReport`] whose notes go to the run
//! log. A failing stage aborts the current file only.

pub mod listing;
pub mod report;
pub mod services;

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::algo::{refine, slice, vertex_normals, Progress, RefineOptions};
use crate::codec::{
    decode, naming, DecodeOptions, EncodeOptions, Encoder, GeometryImagePaths, InpaintOptions,
    PackOptions,
};
use crate::error::{CodecError, ParamErrorCode, Result};
use crate::io::{self, artifact};
use crate::io::artifact::{StageOutcome, MIN_ARTIFACT_SIZE};
use crate::mesh::{topology, ParameterizedMesh};

use services::{HoleCloser, MeshRepairService, PlanarParameterizer};

/// Everything a pipeline run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving every artifact.
    pub output_dir: PathBuf,
    /// Slice meshes at their mid-plane first.
    pub slice: bool,
    /// Refinement applied to the sliced half before repair.
    pub refine: RefineOptions,
    /// Parameterize with this many solver iterations.
    pub param_iterations: Option<usize>,
    /// Encode geometry images with these options.
    pub encode: Option<EncodeOptions>,
    /// Decode geometry images back into meshes.
    pub decode: bool,
    /// Encode and decode normal images too.
    pub use_normals: bool,
    /// Downscale factor applied when decoding.
    pub downscale: u32,
    /// Diffusion options for the encoder.
    pub inpaint: InpaintOptions,
    /// Packing options for the encoder.
    pub pack: PackOptions,
    /// Artifacts at most this many bytes long count as missing.
    pub min_artifact_size: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            slice: false,
            refine: RefineOptions::default(),
            param_iterations: None,
            encode: None,
            decode: false,
            use_normals: false,
            downscale: 1,
            inpaint: InpaintOptions::default(),
            pack: PackOptions::default(),
            min_artifact_size: MIN_ARTIFACT_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Check option values that would otherwise fail on every file.
    pub fn validate(&self) -> Result<()> {
        self.decode_options().validate()?;
        if let Some(encode) = &self.encode {
            if encode.im_size < 2 {
                return Err(CodecError::invalid_param(
                    "im_size",
                    encode.im_size,
                    "image must be at least 2x2",
                ));
            }
        }
        Ok(())
    }

    fn im_size(&self) -> usize {
        self.encode
            .as_ref()
            .map_or_else(|| EncodeOptions::default().im_size, |e| e.im_size)
    }

    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions::default()
            .with_downscale(self.downscale)
            .with_normals(self.use_normals)
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Mid-plane slicing with refinement, repair and hole closing.
    Slice,
    /// Planar parameterization.
    Parameterize,
    /// Geometry-image encoding.
    Encode,
    /// Geometry-image decoding.
    Decode,
}

/// What happened to one input file.
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    notes: String,
    stages: Vec<(Stage, StageOutcome)>,
}

impl FileReport {
    /// Run-log text collected for the file.
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Outcome of `stage`, if it ran.
    pub fn outcome(&self, stage: Stage) -> Option<StageOutcome> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|&(_, outcome)| outcome)
    }

    fn record(&mut self, stage: Stage, outcome: StageOutcome, note: &str) {
        self.stages.push((stage, outcome));
        self.notes.push_str(note);
    }
}

/// Runs the configured stages on one file at a time.
pub struct Pipeline {
    config: PipelineConfig,
    repair: Box<dyn MeshRepairService>,
    holes: Box<dyn HoleCloser>,
    parameterizer: Box<dyn PlanarParameterizer>,
    progress: Progress,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Build a pipeline.
    ///
    /// # Errors
    ///
    /// [`CodecError::InvalidParameter`] if `config` does not validate.
    pub fn new(
        config: PipelineConfig,
        repair: Box<dyn MeshRepairService>,
        holes: Box<dyn HoleCloser>,
        parameterizer: Box<dyn PlanarParameterizer>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            repair,
            holes,
            parameterizer,
            progress: Progress::none(),
        })
    }

    /// Report inpainting progress to `progress`.
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every enabled stage on `input`, recording results in `report`.
    ///
    /// A `.png` input is treated as a geometry image and only decoded.
    pub fn process(&self, input: &Path, report: &mut FileReport) -> Result<()> {
        let is_image = input
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if is_image {
            let paths = GeometryImagePaths::from_image_path(input);
            let outcome = self.decode(&paths)?;
            report.record(Stage::Decode, outcome, ", decoded");
            return Ok(());
        }

        let mut mesh_path = input.to_path_buf();

        if self.config.slice {
            let (sliced, outcome) = self.slice(&mesh_path)?;
            report.record(Stage::Slice, outcome, ", sliced");
            mesh_path = sliced;
        }

        let flat_path = naming::flat_mesh_path(&mesh_path, &self.config.output_dir);

        if let Some(iterations) = self.config.param_iterations {
            let (outcome, error) = self.parameterize(&mesh_path, &flat_path, iterations)?;
            let note = match error {
                Some(error) => format!("\n{iterations},{error}"),
                None => String::new(),
            };
            report.record(Stage::Parameterize, outcome, &note);
        }

        let paths = GeometryImagePaths::for_flat_mesh(&flat_path, self.config.im_size());

        if let Some(options) = &self.config.encode {
            let outcome = self.encode(&mesh_path, &flat_path, &paths, options)?;
            report.record(Stage::Encode, outcome, ", GIed");
        }

        if self.config.decode {
            let outcome = self.decode(&paths)?;
            report.record(Stage::Decode, outcome, ", decoded");
        }

        Ok(())
    }

    /// Slice `input` and write `<out>/<stem>.off`.
    ///
    /// The largest component of the half is refined and saved, then repaired
    /// in place by the repair service. Every boundary loop except the longest
    /// is handed to the hole closer.
    pub fn slice(&self, input: &Path) -> Result<(PathBuf, StageOutcome)> {
        let output = naming::sliced_mesh_path(input, &self.config.output_dir);
        if artifact::output_exists(&output, self.config.min_artifact_size) {
            debug!("{} exists, skipping slice", output.display());
            return Ok((output, StageOutcome::Skipped));
        }

        artifact::require_input(input, self.config.min_artifact_size)?;
        let mesh = io::load(input)?;
        let half = slice::slice_at_midplane(&mesh)?;
        let refined = refine(&half.mesh, &self.config.refine)?;
        io::save(&refined, &output)?;

        self.repair.repair(&output, &output)?;
        let mut mesh = io::load(&output)?;

        let loops = topology::boundary_loops(&mesh);
        if !loops.is_empty() {
            let outer = loops
                .iter()
                .enumerate()
                .map(|(i, l)| (i, l.perimeter(&mesh)))
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
                .ok_or_else(|| CodecError::load(&output, "boundary has no longest loop"))?;
            for (i, hole) in loops.iter().enumerate() {
                if i != outer {
                    mesh = self.holes.close(mesh, hole)?;
                }
            }
        }
        io::save(&mesh, &output)?;

        info!(
            "Sliced {} at x = {} ({} faces)",
            input.display(),
            half.plane_x,
            mesh.num_faces()
        );
        Ok((output, StageOutcome::Written))
    }

    /// Parameterize the mesh at `mesh_path` and write the flat mesh to `flat_path`.
    ///
    /// Returns the convergence error when the parameterizer ran.
    pub fn parameterize(
        &self,
        mesh_path: &Path,
        flat_path: &Path,
        iterations: usize,
    ) -> Result<(StageOutcome, Option<f64>)> {
        if artifact::output_exists(flat_path, self.config.min_artifact_size) {
            debug!("{} exists, skipping parameterization", flat_path.display());
            return Ok((StageOutcome::Skipped, None));
        }

        artifact::require_input(mesh_path, self.config.min_artifact_size)?;
        let mesh = io::load(mesh_path)?;
        let border = topology::longest_boundary(&mesh).ok_or(CodecError::Param {
            code: ParamErrorCode::NoBorder,
            error: 0.0,
        })?;

        let mapping = self
            .parameterizer
            .parameterize(&mesh, mesh_path, &border, iterations)?;
        let error = mapping.convergence_error;

        if mapping.uv.len() != mesh.num_vertices() {
            return Err(CodecError::VertexCountMismatch {
                flat: mapping.uv.len(),
                surface: mesh.num_vertices(),
            });
        }
        let flat = mapping.uv.to_flat_mesh(mesh.faces().to_vec())?;
        io::save(&flat, flat_path)?;

        info!(
            "Parameterized {} ({iterations} iterations, error {error})",
            mesh_path.display()
        );
        Ok((StageOutcome::Written, Some(error)))
    }

    /// Encode the surface at `mesh_path` through the flat mesh at `flat_path`.
    pub fn encode(
        &self,
        mesh_path: &Path,
        flat_path: &Path,
        paths: &GeometryImagePaths,
        options: &EncodeOptions,
    ) -> Result<StageOutcome> {
        let encoder = Encoder::new(options.clone().with_normals(self.config.use_normals))
            .with_inpaint(self.config.inpaint.clone())
            .with_pack(self.config.pack.clone())
            .with_min_artifact_size(self.config.min_artifact_size);
        if encoder.is_done(paths) {
            debug!("{} exists, skipping encode", paths.position.display());
            return Ok(StageOutcome::Skipped);
        }

        artifact::require_input(flat_path, self.config.min_artifact_size)?;
        artifact::require_input(mesh_path, self.config.min_artifact_size)?;
        let flat = io::load(flat_path)?;
        let surface = io::load(mesh_path)?;
        let mesh = ParameterizedMesh::new(&flat, surface)?;

        let normals = self.config.use_normals.then(|| vertex_normals(mesh.surface()));
        let outcome = encoder.encode_to_files(&mesh, normals.as_deref(), paths, &self.progress)?;
        Ok(if outcome.is_skipped() {
            StageOutcome::Skipped
        } else {
            StageOutcome::Written
        })
    }

    /// Decode the images named by `paths` into `<out>/<image stem>.off`.
    pub fn decode(&self, paths: &GeometryImagePaths) -> Result<StageOutcome> {
        decode::decode_to_file(
            paths,
            &self.config.output_dir,
            &self.config.decode_options(),
            self.config.min_artifact_size,
        )
    }
}
