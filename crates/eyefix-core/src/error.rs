use std::path::PathBuf;

use eyefix_parser::ParserError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("movie start marker not found in {} (scanning from row {start_row})", path.display())]
    MissingMovieStart { path: PathBuf, start_row: usize },

    #[error("no '{prefix}' fixation records found in {}", path.display())]
    NoFixationRecords { path: PathBuf, prefix: String },

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write fixation output: {0}")]
    Write(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
