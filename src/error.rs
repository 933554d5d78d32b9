//! Error taxonomy for a pipeline pass.
//!
//! Degenerate trajectories and subjects missing from the metadata table are
//! not errors and never surface here.

use std::path::PathBuf;

/// Problems with an input table. Always raised before any embedding work.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is empty (no header line)")]
    MissingHeader { path: PathBuf },

    #[error("'{path}' is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    /// A data row has fewer fields than the header.
    #[error("'{path}' line {line}: expected at least {expected} fields, found {found}")]
    RaggedRow {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("'{path}' line {line}: column '{column}' has malformed value {value:?}")]
    MalformedValue {
        path: PathBuf,
        line: usize,
        column: String,
        value: String,
    },

    /// Timed levels need both timestamps on every segment that carries text.
    #[error("'{path}' line {line}: segment has text but no '{column}'")]
    MissingTiming {
        path: PathBuf,
        line: usize,
        column: String,
    },

    #[error("'{path}' line {line}: subject '{subject}' already appeared on line {first_line}")]
    DuplicateSubject {
        path: PathBuf,
        line: usize,
        first_line: usize,
        subject: String,
    },
}

/// Failures of the embedding provider. Fatal for the current level.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("Failed to read embeddings from '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Embeddings file '{path}' line {line}: {message}")]
    Decode {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Embedding provider request failed: {0}")]
    Request(String),

    #[error("Embedding provider returned {actual} vectors for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedding for row {row} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Contract violations of the speed-profile kernel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrajectoryError {
    #[error("Vector length mismatch at step {step}: {left} vs {right}")]
    VectorLenMismatch {
        step: usize,
        left: usize,
        right: usize,
    },

    #[error("Expected {expected} time intervals for the trajectory, got {actual}")]
    IntervalCountMismatch { expected: usize, actual: usize },

    #[error("Segment {0} is not part of the embedded table")]
    UnknownSegment(usize),
}

/// Everything that can abort one granularity level.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("Trajectory for group {group}: {source}")]
    Trajectory {
        group: String,
        #[source]
        source: TrajectoryError,
    },

    #[error("Failed to write '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
