use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::errors::ParserError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    MovieStartMarker,
    FixationRecord,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierOptions {
    /// Substring identifying the stimulus movie start message.
    pub marker: String,
    /// Literal prefix of fixation-end records.
    pub fixation_prefix: String,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            marker: "MovieStart".to_string(),
            fixation_prefix: "EFIX".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieStart {
    pub line_number: usize,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixationLine {
    pub line_number: usize,
    pub text: String,
}

pub fn classify_line(line: &str, options: &ClassifierOptions) -> LineKind {
    if line.starts_with(options.fixation_prefix.as_str()) {
        LineKind::FixationRecord
    } else if line.contains(options.marker.as_str()) {
        LineKind::MovieStartMarker
    } else {
        LineKind::Other
    }
}

/// Returns the first movie start marker at or after `start_row` (1-based).
///
/// `start_row` values of 0 and 1 both scan from the first line. Running out
/// of lines while skipping yields `None`, same as a log without a marker.
pub fn scan_movie_start<R: BufRead>(
    reader: R,
    start_row: usize,
    options: &ClassifierOptions,
    diagnostics: &mut Diagnostics,
) -> Result<Option<MovieStart>, ParserError> {
    let skip = start_row.saturating_sub(1);
    let mut lines = LogLines::new(reader);

    for _ in 0..skip {
        if lines.next_line()?.is_none() {
            return Ok(None);
        }
    }

    while let Some((line_number, line)) = lines.next_line()? {
        if classify_line(&line, options) != LineKind::MovieStartMarker {
            continue;
        }
        match marker_timestamp(&line, &options.marker) {
            Some(timestamp) => {
                diagnostics.push(Diagnostic::MovieStartFound {
                    line_number,
                    movie_start: timestamp,
                });
                return Ok(Some(MovieStart {
                    line_number,
                    timestamp,
                }));
            }
            None => diagnostics.push(Diagnostic::MalformedMarker { line_number }),
        }
    }

    Ok(None)
}

pub fn collect_fixation_lines<R: BufRead>(
    reader: R,
    options: &ClassifierOptions,
) -> Result<Vec<FixationLine>, ParserError> {
    let mut lines = LogLines::new(reader);
    let mut fixations = Vec::new();

    while let Some((line_number, line)) = lines.next_line()? {
        if classify_line(&line, options) == LineKind::FixationRecord {
            fixations.push(FixationLine {
                line_number,
                text: line,
            });
        }
    }

    Ok(fixations)
}

pub fn movie_start_from_path(
    path: &Path,
    start_row: usize,
    options: &ClassifierOptions,
    diagnostics: &mut Diagnostics,
) -> Result<Option<MovieStart>, ParserError> {
    let reader = open_log(path)?;
    scan_movie_start(reader, start_row, options, diagnostics)
}

pub fn fixation_lines_from_path(
    path: &Path,
    options: &ClassifierOptions,
) -> Result<Vec<FixationLine>, ParserError> {
    let reader = open_log(path)?;
    collect_fixation_lines(reader, options)
}

fn open_log(path: &Path) -> Result<BufReader<File>, ParserError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ParserError::Open {
            path: path.to_path_buf(),
            source,
        })
}

// Recorder messages look like `MSG 1234567 MovieStart`; some exports put the
// timestamp after the marker instead (`MARKER MovieStart 1000`).
fn marker_timestamp(line: &str, marker: &str) -> Option<i64> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    if let Ok(timestamp) = tokens[1].parse::<i64>() {
        return Some(timestamp);
    }
    let marker_pos = tokens.iter().position(|token| token.contains(marker))?;
    tokens[marker_pos + 1..]
        .iter()
        .find_map(|token| token.parse::<i64>().ok())
}

struct LogLines<R> {
    reader: R,
    buf: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead> LogLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_number: 0,
        }
    }

    fn next_line(&mut self) -> Result<Option<(usize, String)>, ParserError> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|source| ParserError::Read {
                line_number: self.line_number + 1,
                source,
            })?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        let text = String::from_utf8_lossy(&self.buf);
        let text = text.trim_end_matches(['\n', '\r']).to_string();
        Ok(Some((self.line_number, text)))
    }
}
