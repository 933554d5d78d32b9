use crate::grouping::GroupKey;
use crate::trajectory::{StepTiming, Trajectory};

/// One step between consecutive points of a trajectory.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub key: GroupKey,
    /// Cosine distance of the step.
    pub length: f64,
    pub timing: Option<StepTiming>,
}

/// Flattens trajectories into one row per step, in trajectory order.
/// Null trajectories contribute nothing.
pub fn flatten_transitions<'a, I>(trajectories: I) -> Vec<Transition>
where
    I: IntoIterator<Item = &'a (GroupKey, Trajectory)>,
{
    trajectories
        .into_iter()
        .flat_map(|(key, trajectory)| {
            trajectory.steps().iter().map(move |step| Transition {
                key: key.clone(),
                length: step.length,
                timing: step.timing,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::Step;

    fn key(probe: &str) -> GroupKey {
        GroupKey {
            subject: "3".to_string(),
            block: "2".to_string(),
            probe: Some(probe.to_string()),
        }
    }

    fn path(lengths: &[f64]) -> Trajectory {
        Trajectory::Path(
            lengths
                .iter()
                .map(|&length| Step {
                    length,
                    timing: None,
                })
                .collect(),
        )
    }

    #[test]
    fn null_trajectories_are_dropped() {
        let trajectories = vec![
            (key("1"), path(&[0.1, 0.2])),
            (key("2"), Trajectory::Null),
            (key("3"), path(&[0.3])),
        ];
        let rows = flatten_transitions(&trajectories);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.length).collect::<Vec<_>>(), vec![0.1, 0.2, 0.3]);
        assert_eq!(rows[2].key, key("3"));
        assert!(rows.iter().all(|r| r.key.probe.as_deref() != Some("2")));
    }

    #[test]
    fn timing_is_carried_through() {
        let timing = StepTiming {
            interv: 2.0,
            pause: -0.5,
            speed: 0.25,
        };
        let trajectories = vec![(
            key("1"),
            Trajectory::Path(vec![Step {
                length: 0.5,
                timing: Some(timing),
            }]),
        )];
        let rows = flatten_transitions(&trajectories);
        assert_eq!(rows[0].timing, Some(timing));
    }
}
