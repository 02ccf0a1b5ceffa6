use std::io::Write;

use eyefix_parser::schema::{ROW_INDEX, START_TIME};
use eyefix_parser::{Diagnostic, Diagnostics, DropReason, FixationTable};
use polars::lazy::dsl::*;
use polars::prelude::*;

use crate::error::Result;

const EXACT_START: &str = "exact_start";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignSummary {
    pub written: usize,
    pub dropped: usize,
}

/// Writes each fixation's onset relative to the movie start, one decimal
/// integer per line, in table order. Rows that would land before the movie
/// start, or have no start time, are dropped and reported.
pub fn align_fixations<W: Write>(
    table: &FixationTable,
    movie_start: i64,
    writer: &mut W,
    diagnostics: &mut Diagnostics,
) -> Result<AlignSummary> {
    let movie_start_lit = lit(Scalar::new(DataType::Int64, AnyValue::Int64(movie_start)));
    let aligned = table
        .df
        .clone()
        .lazy()
        .select([
            col(ROW_INDEX),
            (col(START_TIME) - movie_start_lit).alias(EXACT_START),
        ])
        .collect()?;

    let row_index = aligned.column(ROW_INDEX)?.i64()?;
    let exact_start = aligned.column(EXACT_START)?.i64()?;

    let mut summary = AlignSummary::default();
    for (row, offset) in row_index.into_iter().zip(exact_start.into_iter()) {
        let row_index = row.unwrap_or_default() as usize;
        match offset {
            Some(offset) if offset >= 0 => {
                writeln!(writer, "{offset}")?;
                summary.written += 1;
            }
            Some(offset) => {
                diagnostics.push(Diagnostic::RowDropped {
                    row_index,
                    reason: DropReason::NegativeAlignedTime {
                        exact_start: offset,
                    },
                });
                summary.dropped += 1;
            }
            None => {
                diagnostics.push(Diagnostic::RowDropped {
                    row_index,
                    reason: DropReason::MissingStartTime,
                });
                summary.dropped += 1;
            }
        }
    }

    Ok(summary)
}
