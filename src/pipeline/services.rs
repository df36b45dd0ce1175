//! External collaborators of the pipeline.
//!
//! Mesh repair, hole closing and planar parameterization are not part of the
//! codec. They are reached through these traits so tests can substitute
//! in-process fakes; the provided implementations call external programs.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};

use crate::error::{CodecError, ParamErrorCode, Result};
use crate::mesh::topology::BoundaryLoop;
use crate::mesh::{TriMesh, UVMap};

/// Removes non-manifold geometry from a mesh file.
pub trait MeshRepairService {
    /// Repair `input`, writing the result to `output` (which may equal `input`).
    fn repair(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Runs a MeshLab filter script through `meshlabserver`.
#[derive(Debug, Clone)]
pub struct MeshlabServer {
    program: PathBuf,
    script: PathBuf,
}

impl MeshlabServer {
    /// Use `program` with the filter script `script` (`.mlx` is appended when missing).
    pub fn new(program: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        let mut script = script.into();
        if script.extension().is_none() {
            script.set_extension("mlx");
        }
        Self {
            program: program.into(),
            script,
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-i").arg(input).arg("-o").arg(output).arg("-s").arg(&self.script);
        cmd
    }
}

impl MeshRepairService for MeshlabServer {
    fn repair(&self, input: &Path, output: &Path) -> Result<()> {
        let program = self.program.display().to_string();
        debug!("{program} -i {} -o {} -s {}", input.display(), output.display(), self.script.display());

        let result = self.command(input, output).output().map_err(|e| CodecError::Repair {
            program: program.clone(),
            status: e.to_string(),
        })?;
        if !result.status.success() {
            return Err(CodecError::Repair {
                program,
                status: result.status.to_string(),
            });
        }
        Ok(())
    }
}

/// Closes a single boundary loop of a mesh.
pub trait HoleCloser {
    /// Return `mesh` with `hole` filled.
    fn close(&self, mesh: TriMesh, hole: &BoundaryLoop) -> Result<TriMesh>;
}

/// Leaves holes open, logging each one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeaveOpen;

impl HoleCloser for LeaveOpen {
    fn close(&self, mesh: TriMesh, hole: &BoundaryLoop) -> Result<TriMesh> {
        warn!("Leaving hole of {} boundary edges open", hole.len());
        Ok(mesh)
    }
}

/// A successful planar parameterization.
#[derive(Debug, Clone)]
pub struct FlatMapping {
    /// One coordinate per surface vertex.
    pub uv: UVMap,
    /// Final convergence error of the solver.
    pub convergence_error: f64,
}

/// Why a parameterization failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamFailure {
    /// Failure reason.
    pub code: ParamErrorCode,
    /// Convergence error at the point of failure.
    pub error: f64,
}

impl From<ParamFailure> for CodecError {
    fn from(f: ParamFailure) -> Self {
        CodecError::Param {
            code: f.code,
            error: f.error,
        }
    }
}

/// Maps a disk-like mesh onto the unit square.
pub trait PlanarParameterizer {
    /// Parameterize `mesh` with `border` pinned to the square's edge.
    ///
    /// `mesh_path` names a copy of `mesh` on disk for implementations that
    /// work on files.
    fn parameterize(
        &self,
        mesh: &TriMesh,
        mesh_path: &Path,
        border: &BoundaryLoop,
        iterations: usize,
    ) -> std::result::Result<FlatMapping, ParamFailure>;
}

/// Runs `<program> <input> <output> <iterations>` and reads the flat mesh back.
///
/// The last whitespace-separated token of the program's stdout is taken as
/// the convergence error.
#[derive(Debug, Clone)]
pub struct ExternalParameterizer {
    program: PathBuf,
}

impl ExternalParameterizer {
    /// Use `program` as the parameterizer.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

/// Last whitespace-separated token of `stdout`, parsed as a number.
pub fn parse_convergence_error(stdout: &str) -> Option<f64> {
    stdout.split_whitespace().last()?.parse().ok()
}

fn bad_output(error: f64) -> ParamFailure {
    ParamFailure {
        code: ParamErrorCode::BadOutput,
        error,
    }
}

impl PlanarParameterizer for ExternalParameterizer {
    fn parameterize(
        &self,
        mesh: &TriMesh,
        mesh_path: &Path,
        _border: &BoundaryLoop,
        iterations: usize,
    ) -> std::result::Result<FlatMapping, ParamFailure> {
        let output_path = mesh_path.with_extension("uv.off");
        let output = Command::new(&self.program)
            .arg(mesh_path)
            .arg(&output_path)
            .arg(iterations.to_string())
            .output()
            .map_err(|e| {
                warn!("Failed to run {}: {e}", self.program.display());
                bad_output(f64::NAN)
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let error = parse_convergence_error(&stdout).unwrap_or(f64::NAN);
        if !output.status.success() {
            return Err(ParamFailure {
                code: ParamErrorCode::NotConverged,
                error,
            });
        }

        let flat = crate::io::load(&output_path).map_err(|e| {
            warn!("Unreadable parameterizer output {}: {e}", output_path.display());
            bad_output(error)
        })?;
        let _ = std::fs::remove_file(&output_path);

        if flat.num_vertices() != mesh.num_vertices() {
            return Err(bad_output(error));
        }
        Ok(FlatMapping {
            uv: UVMap::from_flat_mesh(&flat),
            convergence_error: error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meshlab_command_line() {
        let server = MeshlabServer::new("meshlabserver", "/scripts/clean");
        let cmd = server.command(Path::new("a.off"), Path::new("a.off"));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["-i", "a.off", "-o", "a.off", "-s", "/scripts/clean.mlx"]);
    }

    #[test]
    fn test_missing_program_is_repair_error() {
        let server = MeshlabServer::new("/nonexistent/flatgi-meshlab", "clean.mlx");
        let err = server.repair(Path::new("a.off"), Path::new("a.off")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Repair);
    }

    #[test]
    fn test_parse_convergence_error() {
        assert_eq!(parse_convergence_error("iter 10\nerror 0.0125\n"), Some(0.0125));
        assert_eq!(parse_convergence_error(""), None);
        assert_eq!(parse_convergence_error("done"), None);
    }

    #[test]
    fn test_failure_converts_to_param_error() {
        let err: CodecError = ParamFailure {
            code: ParamErrorCode::NoBorder,
            error: 0.5,
        }
        .into();
        assert!(matches!(err, CodecError::Param { code: ParamErrorCode::NoBorder, .. }));
    }
}
