use crate::classify::FixationLine;
use crate::schema::LEADING_TAGS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub line_number: usize,
    pub fields: Vec<String>,
}

/// Splits a fixation line into its data fields, dropping the record-type and
/// eye tags. Field count is not checked here.
pub fn parse_fixation_record(line: &str) -> Vec<String> {
    line.split_whitespace()
        .skip(LEADING_TAGS)
        .map(str::to_string)
        .collect()
}

pub fn parse_fixation_lines(lines: &[FixationLine]) -> Vec<ParsedRecord> {
    lines
        .iter()
        .map(|line| ParsedRecord {
            line_number: line.line_number,
            fields: parse_fixation_record(&line.text),
        })
        .collect()
}
