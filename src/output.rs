use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::metadata::JoinedRow;
use crate::pipeline::Level;
use crate::tsv::write_records;

const METADATA_COLUMNS: [&str; 9] = [
    "age",
    "genre",
    "exp",
    "level",
    "topic",
    "ADHD",
    "ADHD-first",
    "ADHD-last",
    "MEWS",
];

/// Output column order for a level.
pub fn columns(level: Level) -> Vec<&'static str> {
    let mut cols: Vec<&'static str> = match level {
        Level::Row => vec!["suj", "bloc", "prob", "length", "interv", "pause", "speed"],
        Level::Probe => vec!["suj", "bloc", "length"],
        Level::Subrow => vec!["suj", "bloc", "prob", "length"],
    };
    cols.extend(METADATA_COLUMNS);
    cols
}

fn float(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{sign}inf")
    } else {
        value.to_string()
    }
}

fn opt(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

/// One output record, fields in `columns(level)` order. Nulls are empty strings.
pub fn record(level: Level, row: &JoinedRow<'_>) -> Vec<String> {
    let transition = &row.transition;
    let key = &transition.key;
    let mut fields = vec![key.subject.clone(), key.block.clone()];
    if level != Level::Probe {
        fields.push(opt(key.probe.as_deref()));
    }
    fields.push(float(transition.length));
    if level == Level::Row {
        match &transition.timing {
            Some(timing) => {
                fields.push(float(timing.interv));
                fields.push(float(timing.pause));
                fields.push(float(timing.speed));
            }
            None => fields.extend(std::iter::repeat(String::new()).take(3)),
        }
    }

    let subject = row.subject;
    fields.push(opt(subject.and_then(|s| s.age.as_deref())));
    fields.push(opt(subject.and_then(|s| s.genre.as_deref())));
    fields.push(opt(subject.and_then(|s| s.exp.as_deref())));
    fields.push(opt(subject.and_then(|s| s.level.as_deref())));
    fields.push(opt(subject.and_then(|s| s.topic.as_deref())));
    fields.push(opt(subject.and_then(|s| s.adhd.as_deref())));
    fields.push(row.score_first().map(|v| v.to_string()).unwrap_or_default());
    fields.push(row.score_last().map(|v| v.to_string()).unwrap_or_default());
    fields.push(opt(subject.and_then(|s| s.mews.as_deref())));
    fields
}

pub fn write_level<W: Write>(out: W, level: Level, rows: &[JoinedRow<'_>]) -> io::Result<()> {
    write_records(
        out,
        &columns(level),
        rows.iter().map(|row| record(level, row)),
    )
}

/// Writes next to `path` first and renames into place, so readers never see a partial table.
pub fn write_level_file(path: &Path, level: Level, rows: &[JoinedRow<'_>]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let result = File::create(&tmp)
        .and_then(|file| write_level(BufWriter::new(file), level, rows))
        .and_then(|_| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::GroupKey;
    use crate::metadata::SubjectRecord;
    use crate::trajectory::StepTiming;
    use crate::transitions::Transition;

    fn subject() -> SubjectRecord {
        SubjectRecord {
            subject: "1".to_string(),
            genre: Some("F".to_string()),
            age: Some("25".to_string()),
            exp: None,
            level: Some("L3".to_string()),
            topic: Some("t".to_string()),
            adhd: Some("1".to_string()),
            questions: [1; 18],
            mews: Some("30".to_string()),
        }
    }

    fn transition(probe: Option<&str>, timing: Option<StepTiming>) -> Transition {
        Transition {
            key: GroupKey {
                subject: "1".to_string(),
                block: "2".to_string(),
                probe: probe.map(str::to_string),
            },
            length: 0.5,
            timing,
        }
    }

    #[test]
    fn column_orders_are_fixed() {
        assert_eq!(
            columns(Level::Row).join(","),
            "suj,bloc,prob,length,interv,pause,speed,age,genre,exp,level,topic,ADHD,ADHD-first,ADHD-last,MEWS"
        );
        assert_eq!(
            columns(Level::Probe).join(","),
            "suj,bloc,length,age,genre,exp,level,topic,ADHD,ADHD-first,ADHD-last,MEWS"
        );
        assert_eq!(
            columns(Level::Subrow).join(","),
            "suj,bloc,prob,length,age,genre,exp,level,topic,ADHD,ADHD-first,ADHD-last,MEWS"
        );
    }

    #[test]
    fn row_record_matches_columns() {
        let meta = subject();
        let row = JoinedRow {
            transition: transition(
                Some("3"),
                Some(StepTiming {
                    interv: 4.0,
                    pause: -1.0,
                    speed: 0.125,
                }),
            ),
            subject: Some(&meta),
        };
        let fields = record(Level::Row, &row);
        assert_eq!(fields.len(), columns(Level::Row).len());
        assert_eq!(
            fields.join("\t"),
            "1\t2\t3\t0.5\t4\t-1\t0.125\t25\tF\t\tL3\tt\t1\t9\t9\t30"
        );
    }

    #[test]
    fn missing_metadata_gives_empty_fields() {
        let row = JoinedRow {
            transition: transition(None, None),
            subject: None,
        };
        let fields = record(Level::Probe, &row);
        assert_eq!(fields.len(), columns(Level::Probe).len());
        assert_eq!(&fields[..3], &["1", "2", "0.5"]);
        assert!(fields[3..].iter().all(String::is_empty));
    }

    #[test]
    fn file_is_written_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("subrow.csv");
        let row = JoinedRow {
            transition: transition(Some("1"), None),
            subject: None,
        };
        write_level_file(&path, Level::Subrow, &[row]).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next().unwrap(), columns(Level::Subrow).join("\t"));
        assert!(lines.next().unwrap().starts_with("1\t2\t1\t0.5\t"));
        assert!(!temp_path(&path).exists());
    }
}
