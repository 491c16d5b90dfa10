//! Job files: everything needed to turn one delimited file into root items.
//!
//! A job is described in YAML (see [`JobConfig`]). Running it reads the input,
//! resolves column names against the header row, validates the layout, runs
//! the preprocessor, and hands each finished root to a callback. Every
//! configuration problem is reported before the first row is grouped.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    Row,
    error::JobError,
    grouping,
    io_utils,
    item::Item,
    layout::{ColumnRef, Layout, LevelSpec},
    preprocess::{Preprocessor, StripSpec},
    reject, yaml_provider,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Input file, relative to the job file's directory.
    #[serde(default)]
    pub name: Option<PathBuf>,
    /// Fail when the input file is missing instead of skipping it.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub has_headers: bool,
    #[serde(default)]
    pub reject: Vec<String>,
    #[serde(default)]
    pub strip: Option<StripSpec>,
    #[serde(default)]
    pub sort: Vec<ColumnRef>,
    #[serde(default)]
    pub group: Vec<ColumnRef>,
    #[serde(default)]
    pub levels: Vec<LevelSpec>,
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// Command-line overrides applied on top of a job file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub input: Option<PathBuf>,
    pub delimiter: Option<u8>,
    pub encoding: Option<String>,
}

/// A job resolved against its input: concrete layout plus preprocessing steps.
#[derive(Debug)]
pub struct JobPlan {
    pub layout: Layout,
    pub preprocessor: Preprocessor,
}

impl JobConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: JobConfig = yaml_provider::load_from_path(path)
            .with_context(|| format!("Loading job from {path:?}"))?;
        config.base_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);
        Ok(config)
    }

    pub fn input_path(&self) -> Option<PathBuf> {
        let name = self.name.as_ref()?;
        Some(match &self.base_dir {
            Some(dir) if name.is_relative() && !io_utils::is_dash(name) => dir.join(name),
            _ => name.clone(),
        })
    }

    /// Header names taken from row 0, when the job declares a header row.
    pub fn header_names(&self, rows: &[Row]) -> Option<Vec<String>> {
        if !self.has_headers {
            return None;
        }
        Some(
            rows.first()
                .map(|header| {
                    header
                        .iter()
                        .map(|cell| cell.clone().unwrap_or_default())
                        .collect()
                })
                .unwrap_or_default(),
        )
    }

    /// Resolves columns against the header row (row 0 when `has_headers`) and
    /// checks every referenced column against the width of that row.
    pub fn plan(&self, rows: &[Row]) -> Result<JobPlan> {
        let headers = self.header_names(rows);
        let headers = headers.as_deref();

        let layout = Layout::resolve(&self.levels, &self.group, headers)
            .context("Resolving level mappings")?;
        if let Some(first) = rows.first() {
            layout
                .validate_width(first.len())
                .context("Validating level mappings against input width")?;
        }

        let mut preprocessor = Preprocessor::new().with_header_row(self.has_headers);
        if !self.reject.is_empty() {
            let rules = reject::parse_rules(&self.reject).context("Parsing reject rules")?;
            let resolved = reject::resolve_rules(&rules, headers)?;
            preprocessor = preprocessor.with_reject(reject::into_predicate(resolved));
        }
        if let Some(strip) = &self.strip {
            preprocessor = preprocessor.with_strip(strip.resolve(headers)?);
        }
        if !self.sort.is_empty() {
            let keys = self
                .sort
                .iter()
                .map(|column| {
                    column
                        .resolve(headers)
                        .with_context(|| format!("Resolving sort column '{column}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            preprocessor = preprocessor.with_sort_keys(keys);
        }
        debug!("Resolved job plan: {preprocessor:?}");

        Ok(JobPlan {
            layout,
            preprocessor,
        })
    }

    fn delimiter_for(&self, path: &Path, options: &RunOptions) -> Result<u8> {
        let configured = match (options.delimiter, self.delimiter.as_deref()) {
            (Some(delimiter), _) => Some(delimiter),
            (None, Some(text)) => Some(io_utils::parse_delimiter(text)?),
            (None, None) => None,
        };
        Ok(io_utils::resolve_input_delimiter(path, configured))
    }

    /// Reads the job's input and returns the raw rows, or `None` when an
    /// optional input is missing.
    pub fn read_input(&self, options: &RunOptions) -> Result<Option<Vec<Row>>> {
        let path = options
            .input
            .clone()
            .or_else(|| self.input_path())
            .context("No input file given on the command line or in the job")?;
        if !io_utils::is_dash(&path) && !path.exists() {
            if self.required {
                return Err(JobError::MissingRequiredFile(path).into());
            }
            warn!("Skipping missing optional input {path:?}");
            return Ok(None);
        }
        let delimiter = self.delimiter_for(&path, options)?;
        let encoding = io_utils::resolve_encoding(
            options.encoding.as_deref().or(self.encoding.as_deref()),
        )?;
        info!(
            "Reading '{}' with delimiter '{}' and encoding {}",
            path.display(),
            crate::printable_delimiter(delimiter),
            encoding.name()
        );
        io_utils::read_rows_from_path(&path, delimiter, encoding).map(Some)
    }

    /// Runs the job over already-parsed rows.
    pub fn run_rows<F>(&self, rows: Vec<Row>, callback: F) -> Result<usize>
    where
        F: FnMut(Item) -> Result<()>,
    {
        let plan = self.plan(&rows)?;
        let rows = plan.preprocessor.apply(rows)?;
        grouping::for_each_root(&plan.layout, &rows, callback)
    }

    /// Reads the input and runs the job. Returns the number of roots delivered.
    pub fn run<F>(&self, options: &RunOptions, callback: F) -> Result<usize>
    where
        F: FnMut(Item) -> Result<()>,
    {
        Layout::check_config(&self.levels, &self.group).context("Validating level mappings")?;
        let Some(rows) = self.read_input(options)? else {
            return Ok(0);
        };
        if rows.is_empty() {
            info!("Input is empty; nothing to group");
            return Ok(0);
        }
        let row_count = rows.len();
        let roots = self.run_rows(rows, callback)?;
        info!("Grouped {row_count} input row(s) into {roots} root item(s)");
        Ok(roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCTS_JOB: &str = r#"
name: products.csv
has_headers: true
reject: ["id is empty"]
strip: all
sort: [id, colorCode]
group: [id, colorCode]
levels:
  - {number: id, name: name}
  - {name: color, code: colorCode}
  - {name: size}
"#;

    fn row(cells: &[&str]) -> Row {
        cells
            .iter()
            .map(|c| (!c.is_empty()).then(|| c.to_string()))
            .collect()
    }

    #[test]
    fn parses_job_yaml() {
        let config: JobConfig = yaml_provider::from_str(PRODUCTS_JOB).unwrap();
        assert_eq!(config.name.as_deref(), Some(Path::new("products.csv")));
        assert!(config.has_headers);
        assert!(!config.required);
        assert_eq!(config.levels.len(), 3);
        assert_eq!(config.strip, Some(StripSpec::All));
        assert_eq!(config.group[1], ColumnRef::Name("colorCode".into()));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<JobConfig> = yaml_provider::from_str("levels: []\ngroups: [1]\n");
        assert!(result.is_err());
    }

    #[test]
    fn input_path_is_relative_to_job_file() {
        let mut config: JobConfig = yaml_provider::from_str(PRODUCTS_JOB).unwrap();
        config.base_dir = Some(PathBuf::from("/data/jobs"));
        assert_eq!(
            config.input_path(),
            Some(PathBuf::from("/data/jobs/products.csv"))
        );
    }

    #[test]
    fn plan_resolves_names_and_strips_header() {
        let config: JobConfig = yaml_provider::from_str(PRODUCTS_JOB).unwrap();
        let rows = vec![
            row(&["id", "name", "color", "colorCode", "size"]),
            row(&["002", "product 2", "red", "color 1", "small"]),
            row(&["", "junk", "", "", ""]),
            row(&[" 001", "product 1", "red", "color 1", "small "]),
        ];
        let plan = config.plan(&rows).unwrap();
        assert_eq!(plan.layout.group_keys(), &[0, 3]);
        let prepared = plan.preprocessor.apply(rows).unwrap();
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0][0].as_deref(), Some("001"));
        assert_eq!(prepared[0][4].as_deref(), Some("small"));
    }

    #[test]
    fn plan_fails_fast_on_out_of_range_columns() {
        let config: JobConfig =
            yaml_provider::from_str("group: [0]\nlevels:\n  - {a: 0}\n  - {b: 9}\n").unwrap();
        let err = config.plan(&[row(&["x", "y"])]).unwrap_err();
        assert!(format!("{err:#}").contains("references column 9"));
    }

    #[test]
    fn missing_levels_is_a_config_error() {
        let config = JobConfig::default();
        let err = config.run_rows(vec![row(&["a"])], |_| Ok(())).unwrap_err();
        assert!(format!("{err:#}").contains("At least one level mapping is required"));
    }
}
