use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::io_utils;

#[derive(Debug, Parser)]
#[command(author, version, about = "Rebuild nested records from flat CSV files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Group a delimited file into nested records described by a job file
    Group(GroupArgs),
    /// Show how a job file's levels map onto the input columns
    Layout(LayoutArgs),
}

#[derive(Debug, Args)]
pub struct GroupArgs {
    /// Job file (YAML) describing levels, group keys, and preprocessing
    #[arg(short = 'j', long = "job")]
    pub job: PathBuf,
    /// Input file, overriding the job's `name` ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format for the grouped records
    #[arg(long, value_enum, default_value = "jsonl")]
    pub format: OutputFormat,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to the job's, then utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct LayoutArgs {
    /// Job file (YAML) to describe
    #[arg(short = 'j', long = "job")]
    pub job: PathBuf,
    /// Input file used to resolve header names
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// One JSON object per root, one per line
    #[default]
    Jsonl,
    /// A single pretty-printed JSON array
    Json,
    /// A YAML sequence
    Yaml,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    io_utils::parse_delimiter(value).map_err(|err| err.to_string())
}
