use std::collections::HashMap;
use std::fmt;

use crate::segments::Segment;

/// Which columns form the composite group key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupBy {
    /// (subject, block): one trajectory per block.
    Block,
    /// (subject, block, probe): one trajectory per probe.
    Probe,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub subject: String,
    pub block: String,
    pub probe: Option<String>,
}

impl GroupKey {
    pub fn of(segment: &Segment, by: GroupBy) -> Self {
        Self {
            subject: segment.subject.clone(),
            block: segment.block.clone(),
            probe: match by {
                GroupBy::Block => None,
                GroupBy::Probe => Some(segment.probe.clone()),
            },
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.probe {
            Some(probe) => write!(f, "({}, {}, {})", self.subject, self.block, probe),
            None => write!(f, "({}, {})", self.subject, self.block),
        }
    }
}

/// One group: its key and the original row numbers of its segments, in row order.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub key: GroupKey,
    pub rows: Vec<usize>,
}

/// Partitions segments by key. Groups come out in order of first appearance;
/// rows inside a group keep their table order. Nothing is filtered.
pub fn group_segments<'a, I>(segments: I, by: GroupBy) -> Vec<Group>
where
    I: IntoIterator<Item = &'a Segment>,
{
    let mut positions: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    for segment in segments {
        let key = GroupKey::of(segment, by);
        match positions.get(&key) {
            Some(&pos) => groups[pos].rows.push(segment.row),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push(Group {
                    key,
                    rows: vec![segment.row],
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(row: usize, subject: &str, block: &str, probe: &str) -> Segment {
        Segment {
            row,
            subject: subject.to_string(),
            block: block.to_string(),
            probe: probe.to_string(),
            text: Some(format!("t{row}")),
            start_time: None,
            end_time: None,
        }
    }

    #[test]
    fn groups_by_probe_in_first_appearance_order() {
        let segments = vec![
            seg(0, "2", "1", "1"),
            seg(1, "2", "1", "2"),
            seg(2, "1", "1", "1"),
            seg(3, "2", "1", "1"),
        ];
        let groups = group_segments(&segments, GroupBy::Probe);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].key.to_string(), "(2, 1, 1)");
        assert_eq!(groups[0].rows, vec![0, 3]);
        assert_eq!(groups[1].rows, vec![1]);
        assert_eq!(groups[2].rows, vec![2]);
    }

    #[test]
    fn groups_by_block_ignore_probe() {
        let segments = vec![seg(0, "1", "1", "1"), seg(1, "1", "1", "2"), seg(2, "1", "2", "1")];
        let groups = group_segments(&segments, GroupBy::Block);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.probe, None);
        assert_eq!(groups[0].rows, vec![0, 1]);
    }

    #[test]
    fn every_row_lands_in_exactly_one_group() {
        let segments: Vec<Segment> = (0..30)
            .map(|i| seg(i, &(i % 3).to_string(), &(i % 2).to_string(), &(i % 5).to_string()))
            .collect();
        let groups = group_segments(&segments, GroupBy::Probe);
        let mut rows: Vec<usize> = groups.iter().flat_map(|g| g.rows.clone()).collect();
        rows.sort_unstable();
        assert_eq!(rows, (0..30).collect::<Vec<_>>());
        for group in &groups {
            assert!(group.rows.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
