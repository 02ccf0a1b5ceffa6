use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use eyefix_parser::{
    build_fixation_table, fixation_lines_from_path, movie_start_from_path, parse_fixation_lines,
    Diagnostic, Diagnostics,
};
use serde::Serialize;
use tracing::info_span;

use crate::align::align_fixations;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub movie_start: i64,
    /// Line the marker was read from; `None` when the start time was configured.
    pub movie_start_line: Option<usize>,
    pub fixation_lines: usize,
    pub rows: usize,
    pub duplicate_count: usize,
    pub repaired_count: usize,
    pub lines_written: usize,
    pub rows_dropped: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs one extraction with a fresh diagnostics log.
pub fn run_extraction(config: &PipelineConfig) -> Result<PipelineReport> {
    let mut diagnostics = Diagnostics::new();
    extract_fixations(config, &mut diagnostics)
}

/// Extracts movie-aligned fixation onsets from `config.input` into
/// `config.output`.
///
/// The output file is only created once every onset has been aligned, so a
/// run that halts early leaves no file behind.
/// Events are appended to `diagnostics` as they happen, including on error.
pub fn extract_fixations(
    config: &PipelineConfig,
    diagnostics: &mut Diagnostics,
) -> Result<PipelineReport> {
    config.validate()?;

    let span = info_span!("extract", input = %config.input.display());
    let _guard = span.enter();

    let (movie_start, movie_start_line) = match config.movie_start_override {
        Some(movie_start) => {
            diagnostics.push(Diagnostic::MovieStartOverridden { movie_start });
            (movie_start, None)
        }
        None => {
            let found = movie_start_from_path(
                &config.input,
                config.start_row,
                &config.classifier,
                diagnostics,
            )?
            .ok_or_else(|| PipelineError::MissingMovieStart {
                path: config.input.clone(),
                start_row: config.start_row,
            })?;
            (found.timestamp, Some(found.line_number))
        }
    };

    let lines = fixation_lines_from_path(&config.input, &config.classifier)?;
    if lines.is_empty() {
        return Err(PipelineError::NoFixationRecords {
            path: config.input.clone(),
            prefix: config.classifier.fixation_prefix.clone(),
        });
    }
    diagnostics.push(Diagnostic::FixationLinesCollected { count: lines.len() });

    let records = parse_fixation_lines(&lines);
    let table = build_fixation_table(&records, &config.table, diagnostics)?;

    let mut onsets = Vec::with_capacity(table.height() * 8);
    let summary = align_fixations(&table, movie_start, &mut onsets, diagnostics)?;

    let output_error = |source| PipelineError::Output {
        path: config.output.clone(),
        source,
    };
    let mut file = File::create(&config.output).map_err(output_error)?;
    file.write_all(&onsets).map_err(output_error)?;
    file.flush().map_err(output_error)?;
    diagnostics.push(Diagnostic::OutputWritten {
        lines: summary.written,
    });

    Ok(PipelineReport {
        input: config.input.clone(),
        output: config.output.clone(),
        movie_start,
        movie_start_line,
        fixation_lines: lines.len(),
        rows: table.height(),
        duplicate_count: table.duplicate_count,
        repaired_count: table.repaired_count,
        lines_written: summary.written,
        rows_dropped: summary.dropped,
        diagnostics: diagnostics.events().to_vec(),
    })
}
