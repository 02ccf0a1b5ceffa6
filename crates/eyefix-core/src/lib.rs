pub mod align;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod regions;

pub use align::{align_fixations, AlignSummary};
pub use config::{load_config, parse_config, ConfigFile, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{extract_fixations, run_extraction, PipelineReport};
pub use regions::{Region, RegionError, RegionTable, UNKNOWN_REGION};

pub use eyefix_parser::{
    ClassifierOptions, Diagnostic, Diagnostics, DropReason, DuplicateRepair, FixationTable,
    SchemaPolicy, TableOptions,
};
