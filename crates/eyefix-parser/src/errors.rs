use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read log line {line_number}: {source}")]
    Read {
        line_number: usize,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "fixation record {row_index} (line {line_number}) has {found} fields, expected {expected}"
    )]
    SchemaMismatch {
        row_index: usize,
        line_number: usize,
        expected: usize,
        found: usize,
    },

    #[error("no fixation records to tabulate")]
    EmptyData,

    #[error("failed to build fixation table: {0}")]
    Polars(#[from] PolarsError),
}
