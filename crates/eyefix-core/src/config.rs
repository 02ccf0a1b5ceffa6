use std::fs;
use std::path::{Path, PathBuf};

use eyefix_parser::{ClassifierOptions, TableOptions};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Everything one extraction run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// 1-based line to start looking for the movie start marker; 0 and 1 both
    /// mean the first line.
    #[serde(default)]
    pub start_row: usize,
    /// When set, the log is not scanned for a movie start marker.
    #[serde(default)]
    pub movie_start_override: Option<i64>,
    #[serde(default)]
    pub classifier: ClassifierOptions,
    #[serde(default)]
    pub table: TableOptions,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            start_row: 0,
            movie_start_override: None,
            classifier: ClassifierOptions::default(),
            table: TableOptions::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.classifier.marker.trim().is_empty() {
            return Err(PipelineError::Validation(
                "movie start marker cannot be empty".to_string(),
            ));
        }
        if self.classifier.fixation_prefix.trim().is_empty() {
            return Err(PipelineError::Validation(
                "fixation record prefix cannot be empty".to_string(),
            ));
        }
        if self.input == self.output {
            return Err(PipelineError::Validation(format!(
                "output path {} would overwrite the input log",
                self.output.display()
            )));
        }
        Ok(())
    }
}

/// TOML document holding shared settings; paths are optional so they can
/// come from the command line instead.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub start_row: usize,
    pub movie_start_override: Option<i64>,
    pub classifier: ClassifierOptions,
    pub table: TableOptions,
}

impl ConfigFile {
    /// Builds a run config, preferring the given paths over the file's.
    pub fn resolve(
        &self,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
    ) -> Result<PipelineConfig> {
        let input = input.or_else(|| self.input.clone()).ok_or_else(|| {
            PipelineError::Validation("no input log path configured".to_string())
        })?;
        let output = output.or_else(|| self.output.clone()).ok_or_else(|| {
            PipelineError::Validation("no output path configured".to_string())
        })?;

        Ok(PipelineConfig {
            input,
            output,
            start_row: self.start_row,
            movie_start_override: self.movie_start_override,
            classifier: self.classifier.clone(),
            table: self.table,
        })
    }
}

pub fn parse_config(toml_str: &str) -> Result<ConfigFile> {
    Ok(toml::from_str::<ConfigFile>(toml_str)?)
}

pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let content = fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}
