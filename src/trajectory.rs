use rayon::prelude::*;

use crate::config::Number;
use crate::embedding::{EmbeddedSegment, EmbeddedTable};
use crate::error::TrajectoryError;
use crate::grouping::{Group, GroupKey};
use crate::speed::{trajectory_speed, TimeStep};

/// Timing of one step between two timed segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepTiming {
    /// Difference of segment midpoints.
    pub interv: f64,
    /// Next start minus current end; negative when segments overlap.
    pub pause: f64,
    pub speed: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step {
    pub length: f64,
    pub timing: Option<StepTiming>,
}

/// A group's path through embedding space.
#[derive(Clone, Debug, PartialEq)]
pub enum Trajectory {
    /// Fewer than two segments with text.
    Null,
    Path(Vec<Step>),
}

impl Trajectory {
    pub fn is_null(&self) -> bool {
        matches!(self, Trajectory::Null)
    }

    pub fn steps(&self) -> &[Step] {
        match self {
            Trajectory::Null => &[],
            Trajectory::Path(steps) => steps,
        }
    }
}

/// Builds the trajectory of one group.
///
/// Segments without text are dropped; the rest are looked up in `table` by
/// their original row number. With `timed`, each retained segment is placed
/// at the midpoint of its start and end times.
pub fn build_trajectory(
    group: &Group,
    table: &EmbeddedTable,
    timed: bool,
) -> Result<Trajectory, TrajectoryError> {
    let retained = group
        .rows
        .iter()
        .map(|&row| table.get(row).ok_or(TrajectoryError::UnknownSegment(row)))
        .filter(|entry| entry.as_ref().map_or(true, |e| e.segment.has_text()))
        .collect::<Result<Vec<&EmbeddedSegment>, _>>()?;

    let vecs: Vec<&[Number]> = retained.iter().map(|e| e.vector.as_slice()).collect();

    if !timed {
        let profile = trajectory_speed(&vecs, TimeStep::Unit)?;
        return Ok(match profile {
            None => Trajectory::Null,
            Some(profile) => Trajectory::Path(
                profile
                    .distances
                    .into_iter()
                    .map(|length| Step {
                        length,
                        timing: None,
                    })
                    .collect(),
            ),
        });
    }

    // Timestamps are guaranteed on text-bearing segments of timed tables.
    let starts: Vec<f64> = retained
        .iter()
        .map(|e| e.segment.start_time.unwrap_or(f64::NAN))
        .collect();
    let ends: Vec<f64> = retained
        .iter()
        .map(|e| e.segment.end_time.unwrap_or(f64::NAN))
        .collect();
    let midpoints: Vec<f64> = starts
        .iter()
        .zip(&ends)
        .map(|(start, end)| (start + end) / 2.0)
        .collect();

    let intervals: Vec<f64> = midpoints.windows(2).map(|w| w[1] - w[0]).collect();
    let pauses: Vec<f64> = (1..retained.len()).map(|i| starts[i] - ends[i - 1]).collect();

    let profile = match trajectory_speed(&vecs, TimeStep::Intervals(&intervals))? {
        None => return Ok(Trajectory::Null),
        Some(profile) => profile,
    };

    let steps = profile
        .distances
        .iter()
        .zip(&profile.speeds)
        .zip(intervals.iter().zip(&pauses))
        .map(|((&length, &speed), (&interv, &pause))| Step {
            length,
            timing: Some(StepTiming {
                interv,
                pause,
                speed,
            }),
        })
        .collect();
    Ok(Trajectory::Path(steps))
}

/// Builds every group's trajectory in parallel, keeping group order.
pub fn build_trajectories(
    groups: &[Group],
    table: &EmbeddedTable,
    timed: bool,
) -> Result<Vec<(GroupKey, Trajectory)>, (GroupKey, TrajectoryError)> {
    groups
        .par_iter()
        .map(|group| {
            build_trajectory(group, table, timed)
                .map(|trajectory| (group.key.clone(), trajectory))
                .map_err(|err| (group.key.clone(), err))
        })
        .collect()
}
