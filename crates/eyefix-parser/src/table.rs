use std::collections::HashSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::errors::ParserError;
use crate::record::ParsedRecord;
use crate::schema::{
    extra_column_name, DURATION, END_TIME, FIXATION_COLUMNS, ROW_INDEX, START_TIME, X, Y,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPolicy {
    /// Every record must have the same field count as the first one.
    #[default]
    Strict,
    /// Short records get missing values; fields past the first record's width are ignored.
    Lenient,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateRepair {
    #[default]
    SinglePass,
    /// Re-sort and repeat the pass until it rewrites nothing.
    UntilStable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableOptions {
    pub schema_policy: SchemaPolicy,
    pub duplicate_repair: DuplicateRepair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartTimeRewrite {
    pub row_index: usize,
    pub from: i64,
    pub to: Option<i64>,
}

/// Fixation records sorted by (repaired) start time.
#[derive(Debug, Clone)]
pub struct FixationTable {
    pub df: DataFrame,
    pub duplicate_count: usize,
    pub repaired_count: usize,
}

impl FixationTable {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn start_times(&self) -> PolarsResult<Vec<Option<i64>>> {
        Ok(self.df.column(START_TIME)?.i64()?.into_iter().collect())
    }

    pub fn extra_columns(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| !FIXATION_COLUMNS.contains(&name.as_str()) && name != ROW_INDEX)
            .collect()
    }
}

struct FixationColumns {
    row_index: Vec<i64>,
    start_time: Vec<Option<i64>>,
    end_time: Vec<Option<i64>>,
    duration: Vec<Option<i64>>,
    x: Vec<Option<f64>>,
    y: Vec<Option<f64>>,
    extras: Vec<Vec<Option<String>>>,
}

impl FixationColumns {
    fn new(capacity: usize, extra_width: usize) -> Self {
        Self {
            row_index: Vec::with_capacity(capacity),
            start_time: Vec::with_capacity(capacity),
            end_time: Vec::with_capacity(capacity),
            duration: Vec::with_capacity(capacity),
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            extras: (0..extra_width)
                .map(|_| Vec::with_capacity(capacity))
                .collect(),
        }
    }

    fn push_row(&mut self, row_index: usize, fields: &[String], diagnostics: &mut Diagnostics) {
        let field = |pos: usize| fields.get(pos).map(String::as_str);

        self.row_index.push(row_index as i64);
        self.start_time
            .push(coerce_i64(field(0), START_TIME, row_index, diagnostics));
        self.end_time
            .push(coerce_i64(field(1), END_TIME, row_index, diagnostics));
        self.duration
            .push(coerce_i64(field(2), DURATION, row_index, diagnostics));
        self.x.push(coerce_f64(field(3), X, row_index, diagnostics));
        self.y.push(coerce_f64(field(4), Y, row_index, diagnostics));

        for (offset, column) in self.extras.iter_mut().enumerate() {
            column.push(field(FIXATION_COLUMNS.len() + offset).map(str::to_string));
        }
    }

    fn into_dataframe(self) -> PolarsResult<DataFrame> {
        let mut cols: Vec<Column> =
            Vec::with_capacity(FIXATION_COLUMNS.len() + 1 + self.extras.len());
        cols.push(Series::new(START_TIME.into(), self.start_time).into());
        cols.push(Series::new(END_TIME.into(), self.end_time).into());
        cols.push(Series::new(DURATION.into(), self.duration).into());
        cols.push(Series::new(X.into(), self.x).into());
        cols.push(Series::new(Y.into(), self.y).into());

        for (offset, values) in self.extras.iter().enumerate() {
            let name = extra_column_name(FIXATION_COLUMNS.len() + offset);
            let utf8: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
            cols.push(Series::new(name.into(), utf8).into());
        }

        cols.push(Series::new(ROW_INDEX.into(), self.row_index).into());
        DataFrame::new(cols)
    }
}

pub fn build_fixation_table(
    records: &[ParsedRecord],
    options: &TableOptions,
    diagnostics: &mut Diagnostics,
) -> Result<FixationTable, ParserError> {
    let first = records.first().ok_or(ParserError::EmptyData)?;
    let width = first.fields.len();
    if width < FIXATION_COLUMNS.len() {
        return Err(ParserError::SchemaMismatch {
            row_index: 0,
            line_number: first.line_number,
            expected: FIXATION_COLUMNS.len(),
            found: width,
        });
    }

    let mut columns = FixationColumns::new(records.len(), width - FIXATION_COLUMNS.len());
    for (row_index, record) in records.iter().enumerate() {
        let found = record.fields.len();
        if found != width {
            match options.schema_policy {
                SchemaPolicy::Strict => {
                    return Err(ParserError::SchemaMismatch {
                        row_index,
                        line_number: record.line_number,
                        expected: width,
                        found,
                    })
                }
                SchemaPolicy::Lenient => diagnostics.push(Diagnostic::RowWidthMismatch {
                    row_index,
                    expected: width,
                    found,
                }),
            }
        }
        columns.push_row(row_index, &record.fields, diagnostics);
    }

    let duplicate_count = count_duplicate_start_times(&columns.start_time);
    diagnostics.push(Diagnostic::DuplicateStartTimes {
        count: duplicate_count,
    });

    let rewrites = repair_duplicate_start_times(
        &mut columns.start_time,
        &columns.end_time,
        options.duplicate_repair,
    );
    for rewrite in &rewrites {
        diagnostics.push(Diagnostic::DuplicateStartTimeRepaired {
            row_index: rewrite.row_index,
            from: rewrite.from,
            to: rewrite.to,
        });
    }

    let df = columns.into_dataframe()?.sort(
        [START_TIME],
        SortMultipleOptions::default()
            .with_maintain_order(true)
            .with_nulls_last(true),
    )?;

    diagnostics.push(Diagnostic::TableBuilt {
        rows: df.height(),
        columns: df.width(),
    });

    Ok(FixationTable {
        df,
        duplicate_count,
        repaired_count: rewrites.len(),
    })
}

/// Counts rows whose start time already appeared earlier in the input.
/// Missing values count as equal to each other.
pub fn count_duplicate_start_times(start_times: &[Option<i64>]) -> usize {
    let mut seen = HashSet::with_capacity(start_times.len());
    start_times
        .iter()
        .filter(|value| !seen.insert(**value))
        .count()
}

/// Replaces a start time equal to its predecessor's with the predecessor's
/// end time, walking forward in place so each comparison sees already
/// rewritten values.
pub fn repair_duplicate_start_times(
    start_times: &mut [Option<i64>],
    end_times: &[Option<i64>],
    mode: DuplicateRepair,
) -> Vec<StartTimeRewrite> {
    let mut order: Vec<usize> = (0..start_times.len()).collect();
    let mut rewrites = Vec::new();

    repair_pass(start_times, end_times, &order, &mut rewrites);

    if mode == DuplicateRepair::UntilStable {
        for _ in 0..start_times.len() {
            order.sort_by_key(|&pos| (start_times[pos].is_none(), start_times[pos]));
            if repair_pass(start_times, end_times, &order, &mut rewrites) == 0 {
                break;
            }
        }
    }

    rewrites
}

fn repair_pass(
    start_times: &mut [Option<i64>],
    end_times: &[Option<i64>],
    order: &[usize],
    rewrites: &mut Vec<StartTimeRewrite>,
) -> usize {
    let mut changed = 0;
    for pair in order.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        let (Some(previous), Some(current)) = (start_times[prev], start_times[curr]) else {
            continue;
        };
        if previous != current {
            continue;
        }
        let replacement = end_times.get(prev).copied().flatten();
        if replacement == Some(current) {
            continue;
        }
        start_times[curr] = replacement;
        rewrites.push(StartTimeRewrite {
            row_index: curr,
            from: current,
            to: replacement,
        });
        changed += 1;
    }
    changed
}

fn coerce_i64(
    value: Option<&str>,
    column: &str,
    row_index: usize,
    diagnostics: &mut Diagnostics,
) -> Option<i64> {
    let raw = value?.trim();
    if let Ok(parsed) = raw.parse::<i64>() {
        return Some(parsed);
    }
    match raw.parse::<f64>() {
        Ok(parsed) if parsed.fract() == 0.0 && fits_i64(parsed) => Some(parsed as i64),
        _ => {
            report_unparsable(raw, column, row_index, diagnostics);
            None
        }
    }
}

fn coerce_f64(
    value: Option<&str>,
    column: &str,
    row_index: usize,
    diagnostics: &mut Diagnostics,
) -> Option<f64> {
    let raw = value?.trim();
    match raw.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Some(parsed),
        _ => {
            report_unparsable(raw, column, row_index, diagnostics);
            None
        }
    }
}

/// `i64::MAX as f64` rounds up to 2^63, which is itself out of range.
fn fits_i64(value: f64) -> bool {
    value >= i64::MIN as f64 && value < i64::MAX as f64
}

fn report_unparsable(raw: &str, column: &str, row_index: usize, diagnostics: &mut Diagnostics) {
    diagnostics.push(Diagnostic::UnparsableNumericField {
        row_index,
        column: column.to_string(),
        value: raw.to_string(),
    });
}
