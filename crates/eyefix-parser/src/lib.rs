pub mod classify;
pub mod diagnostics;
pub mod errors;
pub mod record;
pub mod schema;
pub mod table;

pub use classify::{
    classify_line, collect_fixation_lines, fixation_lines_from_path, movie_start_from_path,
    scan_movie_start, ClassifierOptions, FixationLine, LineKind, MovieStart,
};
pub use diagnostics::{Diagnostic, Diagnostics, DropReason};
pub use errors::ParserError;
pub use record::{parse_fixation_lines, parse_fixation_record, ParsedRecord};
pub use table::{
    build_fixation_table, count_duplicate_start_times, repair_duplicate_start_times,
    DuplicateRepair, FixationTable, SchemaPolicy, StartTimeRewrite, TableOptions,
};
