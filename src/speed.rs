//! Speed profile of a trajectory in embedding space.

use crate::config::Number;
use crate::error::TrajectoryError;
use crate::vector_ops::cosine_distance;

/// Time elapsed between consecutive points.
#[derive(Clone, Copy, Debug)]
pub enum TimeStep<'a> {
    /// No timing: every step lasts 1, so speed equals distance.
    Unit,
    /// One interval per step, `N - 1` for `N` points.
    Intervals(&'a [f64]),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpeedProfile {
    pub distances: Vec<f64>,
    pub speeds: Vec<f64>,
}

impl SpeedProfile {
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// Step distances and speeds along `vecs`.
///
/// `Ok(None)` when there are fewer than two points. Negative intervals are
/// accepted and give negative speeds; a zero interval gives an infinite or
/// NaN speed, as plain division does.
pub fn trajectory_speed<V: AsRef<[Number]>>(
    vecs: &[V],
    dt: TimeStep<'_>,
) -> Result<Option<SpeedProfile>, TrajectoryError> {
    let n = vecs.len();
    if n <= 1 {
        return Ok(None);
    }
    if let TimeStep::Intervals(intervals) = dt {
        if intervals.len() != n - 1 {
            return Err(TrajectoryError::IntervalCountMismatch {
                expected: n - 1,
                actual: intervals.len(),
            });
        }
    }

    let distances = vecs
        .windows(2)
        .enumerate()
        .map(|(step, pair)| {
            let (a, b) = (pair[0].as_ref(), pair[1].as_ref());
            cosine_distance(a, b).ok_or(TrajectoryError::VectorLenMismatch {
                step,
                left: a.len(),
                right: b.len(),
            })
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let speeds = match dt {
        TimeStep::Unit => distances.clone(),
        TimeStep::Intervals(intervals) => distances
            .iter()
            .zip(intervals)
            .map(|(distance, interval)| distance / interval)
            .collect(),
    };

    Ok(Some(SpeedProfile { distances, speeds }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fewer_than_two_points_is_null() {
        let none: [Vec<Number>; 0] = [];
        assert_eq!(trajectory_speed(&none, TimeStep::Unit), Ok(None));
        assert_eq!(trajectory_speed(&[vec![1.0, 0.0]], TimeStep::Unit), Ok(None));
    }

    #[test]
    fn n_points_give_n_minus_one_steps() {
        let vecs: Vec<Vec<Number>> = (0..6).map(|i| vec![1.0, i as Number]).collect();
        let profile = trajectory_speed(&vecs, TimeStep::Unit).unwrap().unwrap();
        assert_eq!(profile.len(), 5);
        assert_eq!(profile.speeds.len(), 5);
    }

    #[test]
    fn unit_step_speed_is_distance() {
        let vecs = [vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        let profile = trajectory_speed(&vecs, TimeStep::Unit).unwrap().unwrap();
        assert_eq!(profile.speeds, profile.distances);
        assert_eq!(profile.distances[0], 1.0);
    }

    #[test]
    fn intervals_divide_distance_and_keep_sign() {
        let vecs = [vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]];
        let intervals = [3.5, -2.0];
        let profile = trajectory_speed(&vecs, TimeStep::Intervals(&intervals))
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(profile.speeds[0], 1.0 / 3.5, epsilon = 1e-12);
        assert_abs_diff_eq!(profile.speeds[1], -0.5, epsilon = 1e-6);
    }

    #[test]
    fn interval_count_must_match() {
        let vecs = [vec![1.0, 0.0], vec![0.0, 1.0]];
        let err = trajectory_speed(&vecs, TimeStep::Intervals(&[1.0, 2.0])).unwrap_err();
        assert_eq!(
            err,
            TrajectoryError::IntervalCountMismatch {
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn ragged_vectors_are_rejected() {
        let vecs = [vec![1.0, 0.0], vec![0.0, 1.0, 0.0]];
        let err = trajectory_speed(&vecs, TimeStep::Unit).unwrap_err();
        assert!(matches!(err, TrajectoryError::VectorLenMismatch { step: 0, .. }));
    }
}
