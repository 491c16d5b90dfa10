#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_regroup::{Cell, Layout, LevelMapping, Row};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Builds a row where empty strings stand for absent cells.
pub fn row(cells: &[&str]) -> Row {
    cells
        .iter()
        .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
        .collect()
}

pub fn cell(value: &str) -> Cell {
    Some(value.to_string())
}

/// Columns: id, name, color, colorCode, size.
pub fn product_layout() -> Layout {
    Layout::new(
        vec![
            LevelMapping::new([("number", 0), ("name", 1)]),
            LevelMapping::new([("name", 2), ("code", 3)]),
            LevelMapping::new([("name", 4)]),
        ],
        vec![0, 3],
    )
    .expect("valid product layout")
}

pub fn product_rows() -> Vec<Row> {
    vec![
        row(&["001", "product 1", "red", "color 1", "small"]),
        row(&["001", "product 1", "red", "color 1", "medium"]),
        row(&["001", "product 1", "red", "color 1", "large"]),
        row(&["001", "product 1", "green", "color 2", "small"]),
        row(&["001", "product 1", "green", "color 2", "medium"]),
        row(&["001", "product 1", "green", "color 2", "large"]),
        row(&["002", "product 2", "red", "color 1", "small"]),
        row(&["002", "product 2", "red", "color 1", "medium"]),
        row(&["002", "product 2", "red", "color 1", "large"]),
        row(&["002", "product 2", "green", "color 2", "small"]),
        row(&["002", "product 2", "green", "color 2", "medium"]),
        row(&["002", "product 2", "green", "color 2", "large"]),
    ]
}
