pub mod cli;
pub mod describe;
pub mod error;
pub mod grouping;
pub mod io_utils;
pub mod item;
pub mod job;
pub mod layout;
pub mod output;
pub mod preprocess;
pub mod reject;
pub mod yaml_provider;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    job::{JobConfig, RunOptions},
    output::RootWriter,
};

pub use crate::{
    error::ConfigError,
    grouping::{ChangeLevel, GroupEngine, assemble, for_each_root},
    item::Item,
    layout::{Layout, LevelMapping},
    preprocess::{Preprocessor, StripColumns},
};

/// One parsed cell. `None` for empty fields and columns past the end of a row.
pub type Cell = Option<String>;
/// One parsed line of delimited input.
pub type Row = Vec<Cell>;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_regroup", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Group(args) => handle_group(&args),
        Commands::Layout(args) => handle_layout(&args),
    }
}

fn handle_group(args: &cli::GroupArgs) -> Result<()> {
    let config = JobConfig::load(&args.job)?;
    let options = RunOptions {
        input: args.input.clone(),
        delimiter: args.delimiter,
        encoding: args.input_encoding.clone(),
    };
    let mut writer = RootWriter::open(args.output.as_deref(), args.format)?;
    config
        .run(&options, |root| writer.write_root(root))
        .with_context(|| format!("Running job {:?}", args.job))?;
    let written = writer.finish()?;
    info!(
        "Wrote {written} root item(s) to {}",
        args.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".into())
    );
    Ok(())
}

fn handle_layout(args: &cli::LayoutArgs) -> Result<()> {
    let config = JobConfig::load(&args.job)?;
    let options = RunOptions {
        input: args.input.clone(),
        delimiter: args.delimiter,
        encoding: args.input_encoding.clone(),
    };
    let rows = if options.input.is_some() || config.name.is_some() {
        config.read_input(&options)?.unwrap_or_default()
    } else {
        Vec::new()
    };
    let plan = config.plan(&rows)?;
    let headers = config.header_names(&rows);
    print!(
        "{}",
        describe::render_layout(&plan.layout, headers.as_deref())
    );
    info!(
        "Layout has {} level(s) and {} group key(s)",
        plan.layout.depth(),
        plan.layout.group_keys().len()
    );
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
