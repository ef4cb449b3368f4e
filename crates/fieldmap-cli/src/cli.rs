//! CLI argument definitions for `fieldmap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use fieldmap_cli::source::{DEFAULT_SAMPLE_ROWS, parse_hint};
use fieldmap_model::FieldDataType;

#[derive(Parser)]
#[command(
    name = "fieldmap",
    version,
    about = "Map uploaded dataset columns onto a target entity schema",
    long_about = "Map the columns of an uploaded dataset onto a fixed target schema.\n\n\
                  Columns are matched by exact name and alias, then by embedding\n\
                  similarity, optionally by a generative reasoning backend, and\n\
                  finally by lexical heuristics. Unmatched columns are reported\n\
                  for manual mapping."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Mapper configuration file (TOML).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Directory of `{entity}.json` schema files, merged over the built-ins.
    #[arg(long = "schema-dir", value_name = "DIR", global = true)]
    pub schema_dir: Option<PathBuf>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow sample cell values to appear in trace logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Map the columns of a CSV file onto an entity.
    Map(MapArgs),

    /// Rank the known entities by how well a CSV file fits them.
    Detect(DetectArgs),

    /// Suggest targets for a single column name.
    Suggest(SuggestArgs),

    /// List the known entity schemas.
    Schemas,

    /// Rebuild cached field embeddings.
    RebuildEmbeddings(RebuildArgs),
}

#[derive(Parser)]
pub struct MapArgs {
    /// CSV file whose header row names the source columns.
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    /// Target entity. Detected from the columns when omitted.
    #[arg(long = "entity", short = 'e')]
    pub entity: Option<String>,

    /// Minimum confidence for the final lexical pass (default from config).
    #[arg(long = "min-confidence", value_name = "F")]
    pub min_confidence: Option<f32>,

    /// Column type hint, e.g. `--hint "Start=date"`. Repeatable.
    #[arg(long = "hint", value_name = "COL=TYPE", value_parser = parse_hint)]
    pub hints: Vec<(String, FieldDataType)>,

    /// Data rows sampled for reasoning prompts.
    #[arg(long = "samples", default_value_t = DEFAULT_SAMPLE_ROWS)]
    pub samples: usize,

    /// Output format.
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormatArg,
}

#[derive(Parser)]
pub struct DetectArgs {
    /// CSV file whose header row names the source columns.
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormatArg,
}

#[derive(Parser)]
pub struct SuggestArgs {
    /// Source column name.
    #[arg(value_name = "COLUMN")]
    pub column: String,

    #[arg(long = "entity", short = 'e')]
    pub entity: String,

    /// Number of suggestions.
    #[arg(long = "top-k", default_value_t = 5)]
    pub top_k: usize,

    /// Targets to leave out, e.g. the one already rejected. Repeatable.
    #[arg(long = "exclude", value_name = "FIELD")]
    pub exclude: Vec<String>,

    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormatArg,
}

#[derive(Parser)]
pub struct RebuildArgs {
    /// Entity to rebuild. All entities when omitted.
    #[arg(long = "entity", short = 'e')]
    pub entity: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatArg {
    Table,
    Json,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
