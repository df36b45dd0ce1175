//! Error types for flatgi.
//!
//! Every stage of the codec returns [`Result`]. Errors are grouped into a few
//! broad kinds (see [`ErrorKind`]) so the batch runner can report them
//! uniformly before moving on to the next file.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`CodecError`].
pub type Result<T> = std::result::Result<T, CodecError>;

/// Reason reported by a planar parameterizer that did not produce a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamErrorCode {
    /// The mesh has no boundary loop to pin to the square border.
    NoBorder,
    /// The chosen border loop was rejected by the parameterizer.
    InvalidBorder,
    /// The solver did not converge within the iteration budget.
    NotConverged,
    /// The parameterizer produced output that could not be read back.
    BadOutput,
}

impl std::fmt::Display for ParamErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParamErrorCode::NoBorder => "mesh has no border",
            ParamErrorCode::InvalidBorder => "invalid border",
            ParamErrorCode::NotConverged => "did not converge",
            ParamErrorCode::BadOutput => "unreadable output",
        };
        f.write_str(s)
    }
}

/// Broad classification of a [`CodecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid parameters.
    Config,
    /// Degenerate geometry or buffer problems while encoding.
    Encode,
    /// Malformed persisted artifact or failed numeric parse while decoding.
    Decode,
    /// The planar parameterizer failed.
    Param,
    /// The external mesh repair service failed.
    Repair,
    /// File system, mesh file or image file problems.
    Io,
}

/// Errors that can occur while encoding or decoding geometry images.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },

    /// The flat and surface meshes do not share vertex indexing.
    #[error("flat mesh has {flat} vertices but surface mesh has {surface}")]
    VertexCountMismatch {
        /// Vertex count of the 2D mesh.
        flat: usize,
        /// Vertex count of the 3D mesh.
        surface: usize,
    },

    /// An accumulation channel ended up with no rows or columns.
    #[error("accumulation channel is empty")]
    EmptyChannel,

    /// Per-triangle sample storage could not be reserved.
    #[error("could not allocate {samples} samples for face {face}")]
    ScratchAllocation {
        /// The face index.
        face: usize,
        /// Number of grid samples requested.
        samples: usize,
    },

    /// A flat-mesh vertex lies far outside the unit square.
    #[error("flat vertex {vertex} lies outside the parameter domain: ({u}, {v})")]
    UvOutlier {
        /// The vertex index.
        vertex: usize,
        /// First coordinate.
        u: f64,
        /// Second coordinate.
        v: f64,
    },

    /// Channel and mask dimensions disagree.
    #[error("channel is {rows}x{cols} but mask is {mask_rows}x{mask_cols}")]
    ChannelShape {
        /// Channel rows.
        rows: usize,
        /// Channel columns.
        cols: usize,
        /// Mask rows.
        mask_rows: usize,
        /// Mask columns.
        mask_cols: usize,
    },

    /// Normal channels were requested without a normal field.
    #[error("normal channels requested but no vertex normals were supplied")]
    MissingNormals,

    /// A decoded vertex record could not be parsed back into numbers.
    #[error("unable to cast vertex record {line}: {token:?}")]
    Cast {
        /// Zero-based record index.
        line: usize,
        /// The offending text.
        token: String,
    },

    /// A geometry image is not usable.
    #[error("malformed geometry image {path}: {message}")]
    MalformedImage {
        /// The image path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The planar parameterizer did not produce a mapping.
    #[error("parameterization failed: {code} (error {error})")]
    Param {
        /// Failure reason.
        code: ParamErrorCode,
        /// Convergence error reported at the point of failure.
        error: f64,
    },

    /// The external mesh repair process failed.
    #[error("mesh repair with {program} failed: {status}")]
    Repair {
        /// The program that was run.
        program: String,
        /// Exit status or spawn error.
        status: String,
    },

    /// The mesh has no vertices or no faces.
    #[error("mesh is empty")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding or decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Error loading a file.
    #[error("failed to load {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving a file.
    #[error("failed to save {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },
}

impl CodecError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        CodecError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a load error for `path`.
    pub fn load<P: Into<PathBuf>, M: Into<String>>(path: P, message: M) -> Self {
        CodecError::LoadError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::InvalidParameter { .. } => ErrorKind::Config,
            CodecError::VertexCountMismatch { .. }
            | CodecError::EmptyChannel
            | CodecError::ScratchAllocation { .. }
            | CodecError::UvOutlier { .. }
            | CodecError::ChannelShape { .. }
            | CodecError::MissingNormals
            | CodecError::EmptyMesh
            | CodecError::InvalidVertexIndex { .. }
            | CodecError::DegenerateFace { .. } => ErrorKind::Encode,
            CodecError::Cast { .. } | CodecError::MalformedImage { .. } => ErrorKind::Decode,
            CodecError::Param { .. } => ErrorKind::Param,
            CodecError::Repair { .. } => ErrorKind::Repair,
            CodecError::Io(_)
            | CodecError::Image(_)
            | CodecError::LoadError { .. }
            | CodecError::SaveError { .. }
            | CodecError::UnsupportedFormat { .. } => ErrorKind::Io,
        }
    }
}
