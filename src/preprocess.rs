//! Row preparation ahead of grouping.
//!
//! Steps run in a fixed order, each one optional:
//!
//! 1. header strip (drop row 0)
//! 2. line rejection (drop rows the predicate flags)
//! 3. whitespace strip on the selected columns
//! 4. stable sort on the configured key columns
//!
//! Every step works on the whole table. Sorting in particular needs all rows
//! in memory, so nothing is handed to the assembler until the last step ends.

use std::{cmp::Ordering, collections::HashSet, fmt};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{Cell, Row, layout::ColumnRef};

/// Which columns get leading/trailing whitespace removed, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StripSpec {
    All,
    Only(Vec<ColumnRef>),
    Except(Vec<ColumnRef>),
}

impl StripSpec {
    pub fn resolve(&self, headers: Option<&[String]>) -> Result<StripColumns> {
        let resolve_all = |columns: &[ColumnRef]| {
            columns
                .iter()
                .map(|column| {
                    column
                        .resolve(headers)
                        .with_context(|| format!("Resolving strip column '{column}'"))
                })
                .collect::<Result<HashSet<_>>>()
        };
        Ok(match self {
            StripSpec::All => StripColumns::All,
            StripSpec::Only(columns) => StripColumns::Only(resolve_all(columns)?),
            StripSpec::Except(columns) => StripColumns::Except(resolve_all(columns)?),
        })
    }
}

/// Resolved whitespace-strip selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StripColumns {
    All,
    Only(HashSet<usize>),
    Except(HashSet<usize>),
}

impl StripColumns {
    fn selects(&self, index: usize) -> bool {
        match self {
            StripColumns::All => true,
            StripColumns::Only(columns) => columns.contains(&index),
            StripColumns::Except(columns) => !columns.contains(&index),
        }
    }

    /// Trims the selected cells of `row` in place. Absent cells stay absent.
    pub fn apply(&self, row: &mut [Cell]) {
        for (index, cell) in row.iter_mut().enumerate() {
            if !self.selects(index) {
                continue;
            }
            if let Some(value) = cell {
                let trimmed = value.trim();
                if trimmed.len() != value.len() {
                    *value = trimmed.to_string();
                }
            }
        }
    }
}

pub type RejectPredicate = Box<dyn Fn(&[Cell]) -> Result<bool>>;

#[derive(Default)]
pub struct Preprocessor {
    pub has_header_row: bool,
    pub reject: Option<RejectPredicate>,
    pub strip: Option<StripColumns>,
    pub sort_keys: Option<Vec<usize>>,
}

impl fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preprocessor")
            .field("has_header_row", &self.has_header_row)
            .field("reject", &self.reject.is_some())
            .field("strip", &self.strip)
            .field("sort_keys", &self.sort_keys)
            .finish()
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header_row(mut self, has_header_row: bool) -> Self {
        self.has_header_row = has_header_row;
        self
    }

    pub fn with_reject<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[Cell]) -> Result<bool> + 'static,
    {
        self.reject = Some(Box::new(predicate));
        self
    }

    pub fn with_strip(mut self, strip: StripColumns) -> Self {
        self.strip = Some(strip);
        self
    }

    pub fn with_sort_keys(mut self, keys: Vec<usize>) -> Self {
        self.sort_keys = Some(keys);
        self
    }

    /// Runs every enabled step over `rows`. Predicate errors abort the run and
    /// reach the caller unchanged.
    pub fn apply(&self, mut rows: Vec<Row>) -> Result<Vec<Row>> {
        if self.has_header_row && !rows.is_empty() {
            rows.remove(0);
        }

        if let Some(predicate) = &self.reject {
            let before = rows.len();
            let mut kept = Vec::with_capacity(before);
            for (ordinal, row) in rows.into_iter().enumerate() {
                let reject = predicate(row.as_slice()).inspect_err(|_| {
                    debug!("Reject predicate failed on row {}", ordinal + 1);
                })?;
                if !reject {
                    kept.push(row);
                }
            }
            debug!("Rejected {} of {} row(s)", before - kept.len(), before);
            rows = kept;
        }

        if let Some(strip) = &self.strip {
            for row in rows.iter_mut() {
                strip.apply(row);
            }
        }

        if let Some(keys) = self.sort_keys.as_deref().filter(|keys| !keys.is_empty()) {
            rows.sort_by(|a, b| compare_rows(a, b, keys));
        }

        Ok(rows)
    }
}

/// Lexicographic comparison over `keys`; absent cells sort before any value.
fn compare_rows(a: &[Cell], b: &[Cell], keys: &[usize]) -> Ordering {
    for &index in keys {
        let left = a.get(index).and_then(|cell| cell.as_deref());
        let right = b.get(index).and_then(|cell| cell.as_deref());
        let ord = left.cmp(&right);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
