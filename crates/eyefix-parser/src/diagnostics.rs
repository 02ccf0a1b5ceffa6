use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    NegativeAlignedTime { exact_start: i64 },
    MissingStartTime,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NegativeAlignedTime { exact_start } => {
                write!(f, "negative aligned time {exact_start}")
            }
            DropReason::MissingStartTime => f.write_str("missing start_time"),
        }
    }
}

/// Progress and data-quality events raised while a log is processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    MovieStartFound {
        line_number: usize,
        movie_start: i64,
    },
    MovieStartOverridden {
        movie_start: i64,
    },
    MalformedMarker {
        line_number: usize,
    },
    FixationLinesCollected {
        count: usize,
    },
    TableBuilt {
        rows: usize,
        columns: usize,
    },
    RowWidthMismatch {
        row_index: usize,
        expected: usize,
        found: usize,
    },
    UnparsableNumericField {
        row_index: usize,
        column: String,
        value: String,
    },
    DuplicateStartTimes {
        count: usize,
    },
    DuplicateStartTimeRepaired {
        row_index: usize,
        from: i64,
        to: Option<i64>,
    },
    RowDropped {
        row_index: usize,
        reason: DropReason,
    },
    OutputWritten {
        lines: usize,
    },
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Diagnostic) {
        trace_event(&event);
        self.events.push(event);
    }

    pub fn events(&self) -> &[Diagnostic] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dropped_rows(&self) -> impl Iterator<Item = (usize, DropReason)> + '_ {
        self.events.iter().filter_map(|event| match event {
            Diagnostic::RowDropped { row_index, reason } => Some((*row_index, *reason)),
            _ => None,
        })
    }
}

fn trace_event(event: &Diagnostic) {
    match event {
        Diagnostic::MovieStartFound {
            line_number,
            movie_start,
        } => info!(line_number, movie_start, "movie start marker found"),
        Diagnostic::MovieStartOverridden { movie_start } => {
            info!(movie_start, "using configured movie start")
        }
        Diagnostic::MalformedMarker { line_number } => {
            warn!(line_number, "movie start marker has no integer timestamp")
        }
        Diagnostic::FixationLinesCollected { count } => info!(count, "fixation lines collected"),
        Diagnostic::TableBuilt { rows, columns } => info!(rows, columns, "fixation table built"),
        Diagnostic::RowWidthMismatch {
            row_index,
            expected,
            found,
        } => warn!(row_index, expected, found, "fixation record width differs from first row"),
        Diagnostic::UnparsableNumericField {
            row_index,
            column,
            value,
        } => warn!(row_index, column = %column, value = %value, "non-numeric field treated as missing"),
        Diagnostic::DuplicateStartTimes { count } => info!(count, "duplicate start times"),
        Diagnostic::DuplicateStartTimeRepaired {
            row_index,
            from,
            to,
        } => debug!(row_index, from, to = ?to, "duplicate start time replaced"),
        Diagnostic::RowDropped { row_index, reason } => {
            info!(row_index, reason = %reason, "row dropped")
        }
        Diagnostic::OutputWritten { lines } => info!(lines, "fixation output written"),
    }
}
