//! Per-subject questionnaire data and the left join onto transitions.

use std::collections::HashMap;
use std::path::Path;

use crate::error::InputError;
use crate::transitions::Transition;
use crate::tsv::{nullable, TsvTable};

pub const QUESTION_COUNT: usize = 18;

/// Questionnaire items in order; the first nine and the last nine are summed separately.
pub const QUESTION_COLUMNS: [&str; QUESTION_COUNT] = [
    "ADHD-1", "ADHD-2", "ADHD-3", "ADHD-4", "ADHD-5", "ADHD-6", "ADHD-7", "ADHD-8", "ADHD-9",
    "ADHD-10", "ADHD-11", "ADHD-12", "ADHD-13", "ADHD-14", "ADHD-15", "ADHD-16", "ADHD-17",
    "ADHD-18",
];

const FIRST_HALF: std::ops::Range<usize> = 0..9;
const LAST_HALF: std::ops::Range<usize> = 9..18;

const SUBJECT_COLUMN: &str = "sujet";
const MEWS_COLUMNS: [&str; 2] = ["total-MEWS", "MEWS"];

#[derive(Clone, Debug, PartialEq)]
pub struct SubjectRecord {
    pub subject: String,
    pub genre: Option<String>,
    pub age: Option<String>,
    pub exp: Option<String>,
    pub level: Option<String>,
    pub topic: Option<String>,
    pub adhd: Option<String>,
    pub questions: [i64; QUESTION_COUNT],
    pub mews: Option<String>,
}

impl SubjectRecord {
    /// Sum of questions 1 to 9.
    pub fn score_first(&self) -> i64 {
        self.questions[FIRST_HALF].iter().sum()
    }

    /// Sum of questions 10 to 18.
    pub fn score_last(&self) -> i64 {
        self.questions[LAST_HALF].iter().sum()
    }
}

/// Upper-cases `genre` and maps the legacy `H` to `M`.
pub fn normalize_genre(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    if upper == "H" {
        "M".to_string()
    } else {
        upper
    }
}

#[derive(Clone, Debug, Default)]
pub struct MetadataTable {
    records: HashMap<String, SubjectRecord>,
}

impl MetadataTable {
    pub fn new(records: Vec<SubjectRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.subject.clone(), record))
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, InputError> {
        Self::from_tsv(&TsvTable::read(path)?)
    }

    pub fn from_tsv(table: &TsvTable) -> Result<Self, InputError> {
        let subject = table.column(SUBJECT_COLUMN)?;
        let genre = table.column("genre")?;
        let age = table.column("age")?;
        let exp = table.column("exp")?;
        let level = table.column("level")?;
        let topic = table.column("topic")?;
        let adhd = table.column("ADHD")?;
        let mews = MEWS_COLUMNS
            .iter()
            .find_map(|name| table.optional_column(name))
            .ok_or_else(|| InputError::MissingColumn {
                path: table.path.clone(),
                column: MEWS_COLUMNS[0].to_string(),
            })?;
        let questions = QUESTION_COLUMNS
            .iter()
            .map(|name| table.column(name))
            .collect::<Result<Vec<usize>, _>>()?;

        let mut records = HashMap::with_capacity(table.rows.len());
        let mut first_lines: HashMap<String, usize> = HashMap::new();
        for row in &table.rows {
            let text = |idx: usize| nullable(&row.fields[idx]).map(|s| s.trim().to_string());

            let id = text(subject)
                .ok_or_else(|| table.malformed(row, SUBJECT_COLUMN, &row.fields[subject]))?;
            if let Some(&first_line) = first_lines.get(&id) {
                return Err(InputError::DuplicateSubject {
                    path: table.path.clone(),
                    line: row.line,
                    first_line,
                    subject: id,
                });
            }

            let mut answers = [0i64; QUESTION_COUNT];
            for (slot, &idx) in answers.iter_mut().zip(&questions) {
                let raw = row.fields[idx].trim();
                *slot = parse_answer(raw)
                    .ok_or_else(|| table.malformed(row, &table.header[idx], raw))?;
            }

            first_lines.insert(id.clone(), row.line);
            records.insert(
                id.clone(),
                SubjectRecord {
                    subject: id,
                    genre: text(genre).map(|g| normalize_genre(&g)),
                    age: text(age),
                    exp: text(exp),
                    level: text(level),
                    topic: text(topic),
                    adhd: text(adhd),
                    questions: answers,
                    mews: text(mews),
                },
            );
        }

        Ok(Self { records })
    }

    pub fn get(&self, subject: &str) -> Option<&SubjectRecord> {
        self.records.get(subject)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Integer answers; integral floats such as `2.0` are accepted.
fn parse_answer(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

/// A transition left-joined with its subject's metadata.
#[derive(Clone, Debug)]
pub struct JoinedRow<'a> {
    pub transition: Transition,
    pub subject: Option<&'a SubjectRecord>,
}

impl JoinedRow<'_> {
    pub fn score_first(&self) -> Option<i64> {
        self.subject.map(SubjectRecord::score_first)
    }

    pub fn score_last(&self) -> Option<i64> {
        self.subject.map(SubjectRecord::score_last)
    }
}

/// Left join on subject id: every transition is kept, unmatched ones with no metadata.
pub fn join_metadata(transitions: Vec<Transition>, metadata: &MetadataTable) -> Vec<JoinedRow<'_>> {
    transitions
        .into_iter()
        .map(|transition| {
            let subject = metadata.get(&transition.key.subject);
            JoinedRow {
                transition,
                subject,
            }
        })
        .collect()
}
