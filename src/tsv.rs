//! Tab-separated tables: header line plus data rows.
//!
//! Fields are not quoted or escaped; tabs inside a field are unsupported.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::InputError;

const NULL_MARKERS: &[&str] = &["NA", "NaN", "nan", "null", "NULL", "None"];

#[derive(Debug, Clone)]
pub struct TsvRow {
    /// 1-based line number in the source file.
    pub line: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TsvTable {
    pub path: PathBuf,
    pub header: Vec<String>,
    pub rows: Vec<TsvRow>,
}

impl TsvTable {
    pub fn read(path: &Path) -> Result<Self, InputError> {
        let file = File::open(path).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(path, BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(path: &Path, reader: R) -> Result<Self, InputError> {
        let mut lines = reader.lines().enumerate();
        let header = loop {
            match lines.next() {
                Some((_, line)) => {
                    let mut line = line.map_err(|source| InputError::Io {
                        path: path.to_path_buf(),
                        source,
                    })?;
                    strip_utf8_bom(&mut line);
                    trim_line_ending(&mut line);
                    if line.trim().is_empty() {
                        continue;
                    }
                    break line.split('\t').map(|s| s.trim().to_string()).collect::<Vec<_>>();
                }
                None => {
                    return Err(InputError::MissingHeader {
                        path: path.to_path_buf(),
                    })
                }
            }
        };

        let mut rows = Vec::new();
        for (index, line) in lines {
            let mut line = line.map_err(|source| InputError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            trim_line_ending(&mut line);
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<String> = line.split('\t').map(str::to_string).collect();
            if fields.len() < header.len() {
                return Err(InputError::RaggedRow {
                    path: path.to_path_buf(),
                    line: index + 1,
                    expected: header.len(),
                    found: fields.len(),
                });
            }
            rows.push(TsvRow {
                line: index + 1,
                fields,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            rows,
        })
    }

    /// Position of a required column in the header.
    pub fn column(&self, name: &str) -> Result<usize, InputError> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| InputError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }

    pub fn optional_column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn malformed(&self, row: &TsvRow, column: &str, value: &str) -> InputError {
        InputError::MalformedValue {
            path: self.path.clone(),
            line: row.line,
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

/// Free text as a pandas-style reader sees it: only an empty field or an
/// exact null marker is missing. Whitespace-only text is still text.
pub fn text_value(field: &str) -> Option<&str> {
    if field.is_empty() || NULL_MARKERS.contains(&field) {
        None
    } else {
        Some(field)
    }
}

/// `None` for empty, whitespace-only and conventional null markers.
pub fn nullable(field: &str) -> Option<&str> {
    let trimmed = field.trim();
    if trimmed.is_empty() || NULL_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(field)
    }
}

pub fn parse_f64(table: &TsvTable, row: &TsvRow, idx: usize) -> Result<Option<f64>, InputError> {
    match nullable(&row.fields[idx]) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| table.malformed(row, &table.header[idx], raw)),
    }
}

/// Writes one header line and the given records, tab-separated.
pub fn write_records<W: Write>(
    mut out: W,
    header: &[&str],
    records: impl IntoIterator<Item = Vec<String>>,
) -> io::Result<()> {
    writeln!(out, "{}", header.join("\t"))?;
    for record in records {
        writeln!(out, "{}", record.join("\t"))?;
    }
    out.flush()
}

fn trim_line_ending(line: &mut String) {
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
}

fn strip_utf8_bom(line: &mut String) {
    if let Some(stripped) = line.strip_prefix('\u{feff}') {
        *line = stripped.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn table(text: &str) -> Result<TsvTable, InputError> {
        TsvTable::from_reader(Path::new("mem.tsv"), Cursor::new(text.as_bytes()))
    }

    #[test]
    fn strips_bom_and_crlf() {
        let t = table("\u{feff}a\tb\r\n1\t2\r\n\n").unwrap();
        assert_eq!(t.header, vec!["a", "b"]);
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0].fields, vec!["1", "2"]);
        assert_eq!(t.rows[0].line, 2);
    }

    #[test]
    fn keeps_trailing_empty_fields() {
        let t = table("a\tb\tc\n1\t\t\n").unwrap();
        assert_eq!(t.rows[0].fields, vec!["1", "", ""]);
    }

    #[test]
    fn short_row_is_ragged() {
        let err = table("a\tb\tc\n1\t2\n").unwrap_err();
        assert!(matches!(err, InputError::RaggedRow { line: 2, expected: 3, found: 2, .. }));
    }

    #[test]
    fn missing_column_names_it() {
        let t = table("a\tb\n").unwrap();
        let err = t.column("SPEECH").unwrap_err();
        assert!(err.to_string().contains("SPEECH"));
    }

    #[test]
    fn null_markers() {
        assert_eq!(nullable(""), None);
        assert_eq!(nullable("   "), None);
        assert_eq!(nullable("NaN"), None);
        assert_eq!(nullable("bonjour"), Some("bonjour"));
    }

    #[test]
    fn text_keeps_whitespace_only_fields() {
        assert_eq!(text_value(""), None);
        assert_eq!(text_value("NA"), None);
        assert_eq!(text_value("  "), Some("  "));
        assert_eq!(text_value(" NA "), Some(" NA "));
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(table(""), Err(InputError::MissingHeader { .. })));
    }
}
