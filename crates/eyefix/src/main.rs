use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use eyefix_core::{
    load_config, run_extraction, ConfigFile, DuplicateRepair, PipelineConfig, PipelineReport,
    RegionTable, SchemaPolicy,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Movie-aligned fixation onsets from eye-tracker ASC logs", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract fixation onsets from one log
    Extract(ExtractArgs),
    /// Extract every matching log under a directory
    Batch(BatchArgs),
    /// Look up which labelled region contains a gaze point
    Lookup(LookupArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// ASC log to read (falls back to `input` in the config file)
    input: Option<PathBuf>,
    /// File to write onsets to (falls back to `output` in the config file)
    output: Option<PathBuf>,
    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Directory containing ASC logs
    #[arg(short, long)]
    dir: PathBuf,
    /// Glob relative to --dir selecting the logs
    #[arg(long, default_value = "**/*.asc")]
    pattern: String,
    /// Directory receiving `<stem>_fixations.txt` files, mirroring the
    /// subdirectories of --dir
    #[arg(short, long)]
    out_dir: PathBuf,
    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Args, Debug)]
struct LookupArgs {
    /// CSV with x_min,x_max,y_min,y_max,Class Name columns
    #[arg(long)]
    regions: PathBuf,
    #[arg(long, allow_hyphen_values = true)]
    x: f64,
    #[arg(long, allow_hyphen_values = true)]
    y: f64,
}

#[derive(Args, Debug, Default)]
struct TuningArgs {
    /// TOML file with extraction settings (default: $EYEFIX_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
    /// 1-based line to start scanning for the movie start marker
    #[arg(long)]
    start_row: Option<usize>,
    /// Use this movie start time instead of scanning for the marker
    #[arg(long, allow_hyphen_values = true)]
    movie_start: Option<i64>,
    /// Substring identifying the movie start message
    #[arg(long)]
    marker: Option<String>,
    /// Prefix of fixation records
    #[arg(long)]
    prefix: Option<String>,
    /// Tolerate fixation records whose field count differs from the first one
    #[arg(long)]
    lenient: bool,
    /// Duplicate start time correction strategy
    #[arg(long, value_enum)]
    repair: Option<RepairArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RepairArg {
    SinglePass,
    UntilStable,
}

impl From<RepairArg> for DuplicateRepair {
    fn from(value: RepairArg) -> Self {
        match value {
            RepairArg::SinglePass => DuplicateRepair::SinglePass,
            RepairArg::UntilStable => DuplicateRepair::UntilStable,
        }
    }
}

impl TuningArgs {
    fn config_file(&self) -> Result<ConfigFile> {
        let path = match &self.config {
            Some(path) => Some(path.clone()),
            None => env::var("EYEFIX_CONFIG").ok().map(PathBuf::from),
        };
        match path {
            Some(path) => load_config(&path)
                .with_context(|| format!("failed to load config {}", path.display())),
            None => Ok(ConfigFile::default()),
        }
    }

    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(start_row) = self.start_row {
            config.start_row = start_row;
        }
        if let Some(movie_start) = self.movie_start {
            config.movie_start_override = Some(movie_start);
        }
        if let Some(marker) = &self.marker {
            config.classifier.marker = marker.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.classifier.fixation_prefix = prefix.clone();
        }
        if self.lenient {
            config.table.schema_policy = SchemaPolicy::Lenient;
        }
        if let Some(repair) = self.repair {
            config.table.duplicate_repair = repair.into();
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Extract(args) => handle_extract(args),
        Command::Batch(args) => handle_batch(args),
        Command::Lookup(args) => handle_lookup(args),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn handle_extract(args: ExtractArgs) -> Result<()> {
    let file = args.tuning.config_file()?;
    let mut config = file.resolve(args.input, args.output)?;
    args.tuning.apply(&mut config);

    let report = run_extraction(&config)
        .with_context(|| format!("extraction failed for {}", config.input.display()))?;

    if let Some(path) = &args.report {
        write_report(path, &report)?;
        info!(path = %path.display(), "report written");
    }

    println!("{}", summary_table(std::slice::from_ref(&report)));
    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<()> {
    let file = args.tuning.config_file()?;
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let pattern = args.dir.join(&args.pattern);
    let pattern_str = pattern
        .to_str()
        .with_context(|| format!("non UTF-8 glob pattern {}", pattern.display()))?;

    let mut reports = Vec::new();
    let mut failure_count = 0usize;
    let mut outputs = HashSet::new();

    for entry in glob::glob(pattern_str)? {
        let input = match entry {
            Ok(path) => path,
            Err(err) => {
                warn!("could not read path from glob pattern: {err}");
                failure_count += 1;
                continue;
            }
        };
        if !input.is_file() {
            continue;
        }

        let output = output_path(&args.dir, &args.out_dir, &input);
        if !outputs.insert(output.clone()) {
            error!(
                input = %input.display(),
                output = %output.display(),
                "skipping log: output already written by another log"
            );
            failure_count += 1;
            continue;
        }
        if let Some(parent) = output.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                error!(output = %output.display(), "skipping log: {err}");
                failure_count += 1;
                continue;
            }
        }
        let mut config = file.resolve(Some(input.clone()), Some(output))?;
        args.tuning.apply(&mut config);

        match run_extraction(&config) {
            Ok(report) => reports.push(report),
            Err(err) => {
                error!(input = %input.display(), "skipping log: {err}");
                failure_count += 1;
            }
        }
    }

    if !reports.is_empty() {
        println!("{}", summary_table(&reports));
    }
    info!(
        succeeded = reports.len(),
        failed = failure_count,
        "batch finished"
    );

    if failure_count > 0 {
        bail!("{failure_count} log(s) failed to extract");
    }
    if reports.is_empty() {
        bail!("no logs matched {pattern_str}");
    }
    Ok(())
}

fn handle_lookup(args: LookupArgs) -> Result<()> {
    let regions = RegionTable::from_path(&args.regions)
        .with_context(|| format!("failed to load regions {}", args.regions.display()))?;
    println!("{}", regions.lookup(args.x, args.y));
    Ok(())
}

/// Places the output for `input` under `out_dir` at the same relative
/// location it has under `dir`.
fn output_path(dir: &Path, out_dir: &Path, input: &Path) -> PathBuf {
    let relative = input.strip_prefix(dir).unwrap_or(input);
    let name = output_name(relative);
    match relative.parent() {
        Some(parent) if input.starts_with(dir) => out_dir.join(parent).join(name),
        _ => out_dir.join(name),
    }
}

fn output_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    format!("{stem}_fixations.txt")
}

fn write_report(path: &Path, report: &PipelineReport) -> Result<()> {
    let json = serde_json::to_vec_pretty(report).context("failed to serialize run report")?;
    fs::write(path, json).with_context(|| format!("failed to write report {}", path.display()))
}

fn summary_table(reports: &[PipelineReport]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "input",
        "movie start",
        "fixations",
        "duplicates",
        "repaired",
        "written",
        "dropped",
    ]);
    for report in reports {
        table.add_row(vec![
            report.input.display().to_string(),
            report.movie_start.to_string(),
            report.rows.to_string(),
            report.duplicate_count.to_string(),
            report.repaired_count.to_string(),
            report.lines_written.to_string(),
            report.rows_dropped.to_string(),
        ]);
    }
    table
}
