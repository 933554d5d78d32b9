//! Speed profiles of speech trajectories in sentence-embedding space.
//!
//! Text segments are embedded, grouped into trajectories at one of three
//! granularities, and each consecutive pair of points becomes a transition
//! row carrying its cosine distance (and, at row level, timing), joined with
//! per-subject questionnaire data.

pub mod config;
pub mod embedding;
pub mod error;
pub mod grouping;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod segments;
pub mod speed;
pub mod summary;
pub mod trajectory;
pub mod transitions;
pub mod tsv;
pub mod vector_ops;

pub use config::{Number, State};
pub use embedding::{EmbeddedTable, OpenAiEmbedder, PrecomputedEmbeddings, SentenceEmbedder};
pub use error::{EmbedError, InputError, PipelineError, TrajectoryError};
pub use grouping::{group_segments, Group, GroupBy, GroupKey};
pub use metadata::{join_metadata, JoinedRow, MetadataTable, SubjectRecord};
pub use pipeline::{run_level, run_levels, transform_level, Level};
pub use segments::{Segment, SegmentTable};
pub use speed::{trajectory_speed, SpeedProfile, TimeStep};
pub use summary::{Describe, LevelSummary};
pub use trajectory::{build_trajectory, Step, StepTiming, Trajectory};
pub use transitions::{flatten_transitions, Transition};
pub use vector_ops::cosine_distance;
