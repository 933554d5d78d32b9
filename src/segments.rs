use std::path::Path;

use crate::error::InputError;
use crate::tsv::{nullable, parse_f64, text_value, TsvTable};

pub const SUBJECT_COLUMN: &str = "suj";
pub const BLOCK_COLUMN: &str = "bloc";
pub const PROBE_COLUMN: &str = "prob";
pub const TEXT_COLUMN: &str = "SPEECH";
pub const START_COLUMN: &str = "start_time";
pub const END_COLUMN: &str = "end_time";

/// One unit of text at a given granularity, in original row order.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Position in the source table; the stable key for its embedding.
    pub row: usize,
    pub subject: String,
    pub block: String,
    pub probe: String,
    pub text: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl Segment {
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    pub segments: Vec<Segment>,
}

impl SegmentTable {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Loads a segment table. With `timed`, every segment that carries
    /// text must also carry both timestamps.
    pub fn load(path: &Path, timed: bool) -> Result<Self, InputError> {
        Self::from_tsv(&TsvTable::read(path)?, timed)
    }

    pub fn from_tsv(table: &TsvTable, timed: bool) -> Result<Self, InputError> {
        let subject = table.column(SUBJECT_COLUMN)?;
        let block = table.column(BLOCK_COLUMN)?;
        let probe = table.column(PROBE_COLUMN)?;
        let text = table.column(TEXT_COLUMN)?;
        let start = table.column(START_COLUMN)?;
        let end = table.column(END_COLUMN)?;

        let mut segments = Vec::with_capacity(table.rows.len());
        for (row_index, row) in table.rows.iter().enumerate() {
            let key_field = |idx: usize| -> Result<String, InputError> {
                nullable(&row.fields[idx])
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| table.malformed(row, &table.header[idx], &row.fields[idx]))
            };

            let segment = Segment {
                row: row_index,
                subject: key_field(subject)?,
                block: key_field(block)?,
                probe: key_field(probe)?,
                text: text_value(&row.fields[text]).map(str::to_string),
                start_time: parse_f64(table, row, start)?,
                end_time: parse_f64(table, row, end)?,
            };

            if timed && segment.has_text() {
                for (value, column) in [
                    (segment.start_time, START_COLUMN),
                    (segment.end_time, END_COLUMN),
                ] {
                    if value.is_none() {
                        return Err(InputError::MissingTiming {
                            path: table.path.clone(),
                            line: row.line,
                            column: column.to_string(),
                        });
                    }
                }
            }
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Text column in row order, absent entries included.
    pub fn texts(&self) -> Vec<Option<&str>> {
        self.segments.iter().map(|s| s.text.as_deref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "suj\tbloc\tprob\tSPEECH\tstart_time\tend_time\textra\n";

    fn load(body: &str, timed: bool) -> Result<SegmentTable, InputError> {
        let text = format!("{HEADER}{body}");
        let tsv = TsvTable::from_reader(Path::new("rows.tsv"), Cursor::new(text.into_bytes()))?;
        SegmentTable::from_tsv(&tsv, timed)
    }

    #[test]
    fn empty_text_is_kept_as_absent() {
        let table = load("1\t1\t1\tbonjour\t0\t1\tx\n1\t1\t1\t\t2\t3\tx\n", true).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.segments[1].text, None);
        assert_eq!(table.segments[1].row, 1);
        assert_eq!(table.texts(), vec![Some("bonjour"), None]);
    }

    #[test]
    fn whitespace_only_text_is_a_segment() {
        let table = load("1\t1\t1\t  \t0\t1\tx\n1\t1\t1\tNA\t\t\tx\n", true).unwrap();
        assert!(table.segments[0].has_text());
        assert!(!table.segments[1].has_text());
        assert!(load("1\t1\t1\t  \t\t\tx\n", true).is_err());
    }

    #[test]
    fn timed_level_requires_times_on_text() {
        let err = load("1\t1\t1\tbonjour\t\t1\tx\n", true).unwrap_err();
        assert!(matches!(err, InputError::MissingTiming { line: 2, .. }));
        assert!(load("1\t1\t1\tbonjour\t\t1\tx\n", false).is_ok());
    }

    #[test]
    fn empty_segment_needs_no_times() {
        assert!(load("1\t1\t1\t\t\t\tx\n", true).is_ok());
    }

    #[test]
    fn malformed_time_is_an_input_error() {
        let err = load("1\t1\t1\tsalut\tzero\t1\tx\n", false).unwrap_err();
        assert!(matches!(err, InputError::MalformedValue { ref column, .. } if column == "start_time"));
    }

    #[test]
    fn missing_key_is_an_input_error() {
        assert!(load("\t1\t1\tsalut\t0\t1\tx\n", false).is_err());
    }

    #[test]
    fn missing_column_is_fatal() {
        let tsv = TsvTable::from_reader(
            Path::new("rows.tsv"),
            Cursor::new(b"suj\tbloc\tSPEECH\n".to_vec()),
        )
        .unwrap();
        let err = SegmentTable::from_tsv(&tsv, false).unwrap_err();
        assert!(matches!(err, InputError::MissingColumn { ref column, .. } if column == "prob"));
    }
}
