//! One granularity pass: segments in, transition table out.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::config::{ProviderKind, State};
use crate::embedding::{embed_table, OpenAiEmbedder, PrecomputedEmbeddings, SentenceEmbedder};
use crate::error::PipelineError;
use crate::grouping::{group_segments, GroupBy};
use crate::metadata::{join_metadata, JoinedRow, MetadataTable};
use crate::output::write_level_file;
use crate::segments::SegmentTable;
use crate::summary::{Describe, LevelSummary};
use crate::trajectory::build_trajectories;
use crate::transitions::flatten_transitions;

/// Segmentation granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Level {
    /// Each transcript row is a point; one trajectory per probe, timed.
    Row,
    /// Each probe is a point; one trajectory per block.
    Probe,
    /// Rows split into phrases; one trajectory per probe.
    Subrow,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Row, Level::Probe, Level::Subrow];

    pub fn name(&self) -> &'static str {
        match self {
            Level::Row => "row",
            Level::Probe => "probe",
            Level::Subrow => "subrow",
        }
    }

    pub fn group_by(&self) -> GroupBy {
        match self {
            Level::Probe => GroupBy::Block,
            Level::Row | Level::Subrow => GroupBy::Probe,
        }
    }

    /// Whether steps carry interval, pause and speed.
    pub fn is_timed(&self) -> bool {
        matches!(self, Level::Row)
    }
}

/// Embeds, groups, builds trajectories, flattens and joins one level in memory.
pub fn transform_level<'m, E: SentenceEmbedder + ?Sized>(
    level: Level,
    table: SegmentTable,
    embedder: &E,
    metadata: &'m MetadataTable,
    lang: &str,
    dimensions: usize,
) -> Result<(Vec<JoinedRow<'m>>, LevelSummary), PipelineError> {
    let segments = table.len();
    let embedded = embed_table(embedder, table, lang, dimensions)?;

    let groups = group_segments(embedded.segments(), level.group_by());
    let trajectories = build_trajectories(&groups, &embedded, level.is_timed()).map_err(
        |(key, source)| PipelineError::Trajectory {
            group: key.to_string(),
            source,
        },
    )?;
    for (key, trajectory) in &trajectories {
        debug!(level = level.name(), group = %key, steps = trajectory.steps().len(), "trajectory");
    }

    let transitions = flatten_transitions(&trajectories);
    let lengths: Vec<f64> = transitions.iter().map(|t| t.length).collect();
    let rows = join_metadata(transitions, metadata);

    let summary = LevelSummary {
        segments,
        groups: groups.len(),
        trajectories: trajectories.iter().filter(|(_, t)| !t.is_null()).count(),
        transitions: rows.len(),
        unmatched_transitions: rows.iter().filter(|r| r.subject.is_none()).count(),
        length: Describe::of(&lengths),
    };
    Ok((rows, summary))
}

/// Runs one level from its input file to its output file.
///
/// Nothing is written unless every step succeeded.
pub fn run_level<E: SentenceEmbedder + ?Sized>(
    level: Level,
    input: &Path,
    output: &Path,
    embedder: &E,
    metadata: &MetadataTable,
    lang: &str,
    dimensions: usize,
) -> Result<LevelSummary, PipelineError> {
    let table = SegmentTable::load(input, level.is_timed())?;
    info!(level = level.name(), path = %input.display(), rows = table.len(), "loaded segments");

    let (rows, summary) = transform_level(level, table, embedder, metadata, lang, dimensions)?;

    write_level_file(output, level, &rows).map_err(|source| PipelineError::Output {
        path: output.to_path_buf(),
        source,
    })?;
    info!(level = level.name(), path = %output.display(), rows = rows.len(), "wrote transitions");
    Ok(summary)
}

/// Builds the configured embedding provider for a level.
pub fn embedder_for(state: &State, level: Level) -> Result<Box<dyn SentenceEmbedder>> {
    let embedder: Box<dyn SentenceEmbedder> = match state.provider {
        ProviderKind::Precomputed => {
            Box::new(PrecomputedEmbeddings::new(state.embeddings_path(level)))
        }
        ProviderKind::OpenAi => Box::new(OpenAiEmbedder::new(
            state.require_api_key()?,
            &state.openai.base_url,
            state.openai.model.clone(),
            state.dimensions,
            Duration::from_secs(state.openai.timeout_secs),
            state.openai.max_retries,
            state.openai.batch_size,
        )?),
    };
    Ok(embedder)
}

/// Runs the requested levels independently. A failed level does not stop the others.
pub fn run_levels(state: &State, levels: &[Level]) -> Result<Vec<(Level, Result<LevelSummary>)>> {
    let metadata = MetadataTable::load(&state.participants_path)?;
    info!(
        path = %state.participants_path.display(),
        subjects = metadata.len(),
        "loaded subject metadata"
    );

    let mut outcomes = Vec::with_capacity(levels.len());
    for &level in levels {
        let start = Instant::now();
        let outcome = embedder_for(state, level).and_then(|embedder| {
            run_level(
                level,
                state.input_path(level),
                state.output_path(level),
                embedder.as_ref(),
                &metadata,
                &state.lang,
                state.dimensions,
            )
            .map_err(anyhow::Error::from)
        });
        match &outcome {
            Ok(summary) => {
                info!(
                    level = level.name(),
                    elapsed = ?start.elapsed(),
                    groups = summary.groups,
                    trajectories = summary.trajectories,
                    null_trajectories = summary.null_trajectories(),
                    transitions = summary.transitions,
                    "level complete"
                );
                if summary.unmatched_transitions > 0 {
                    warn!(
                        level = level.name(),
                        transitions = summary.unmatched_transitions,
                        "transitions without subject metadata"
                    );
                }
                if let Some(length) = &summary.length {
                    info!(level = level.name(), "length: {}", length);
                }
            }
            Err(err) => error!(level = level.name(), error = %format!("{err:#}"), "level failed"),
        }
        outcomes.push((level, outcome));
    }
    Ok(outcomes)
}
