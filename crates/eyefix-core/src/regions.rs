use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub const UNKNOWN_REGION: &str = "Unknown";

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("failed to open region table {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),
    #[error("region '{class_name}' has inverted bounds")]
    InvertedBounds { class_name: String },
}

/// Axis-aligned screen rectangle labelled with the object it covers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Region {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    #[serde(rename = "Class Name")]
    pub class_name: String,
}

impl Region {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x_min <= x && x <= self.x_max && self.y_min <= y && y <= self.y_max
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    regions: Vec<Region>,
}

impl RegionTable {
    pub fn new(regions: Vec<Region>) -> Result<Self, RegionError> {
        if let Some(region) = regions
            .iter()
            .find(|r| r.x_min > r.x_max || r.y_min > r.y_max)
        {
            return Err(RegionError::InvertedBounds {
                class_name: region.class_name.clone(),
            });
        }
        Ok(Self { regions })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RegionError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let regions = reader
            .deserialize::<Region>()
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(regions)
    }

    pub fn from_path(path: &Path) -> Result<Self, RegionError> {
        let file = File::open(path).map_err(|source| RegionError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Class name of the first region containing the point (bounds
    /// inclusive), or [`UNKNOWN_REGION`].
    pub fn lookup(&self, x: f64, y: f64) -> &str {
        self.regions
            .iter()
            .find(|region| region.contains(x, y))
            .map(|region| region.class_name.as_str())
            .unwrap_or(UNKNOWN_REGION)
    }
}
