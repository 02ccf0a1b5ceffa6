/// Named fields of a fixation record, in positional order after the
/// record-type and eye tags.
pub const FIXATION_COLUMNS: [&str; 5] = ["start_time", "end_time", "duration", "x", "y"];

pub const START_TIME: &str = "start_time";
pub const END_TIME: &str = "end_time";
pub const DURATION: &str = "duration";
pub const X: &str = "x";
pub const Y: &str = "y";

/// Position of the record in the order it appeared in the log.
pub const ROW_INDEX: &str = "row_index";

/// Tokens dropped from the front of every fixation line (`EFIX R`).
pub const LEADING_TAGS: usize = 2;

pub fn extra_column_name(position: usize) -> String {
    format!("col{}", position + 1)
}
