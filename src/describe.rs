//! Plain-text rendering of a resolved layout for the `layout` command.

use std::fmt::Write as _;

use itertools::Itertools;

use crate::layout::Layout;

/// One line per mapped field: level, field, column index, header name, and
/// whether the column is that level's group key.
pub fn layout_rows(layout: &Layout, headers: Option<&[String]>) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for (level, mapping) in layout.levels().iter().enumerate() {
        let group_key = layout.group_keys().get(level).copied();
        for (field, column) in mapping.fields() {
            let header = headers
                .and_then(|names| names.get(*column))
                .cloned()
                .unwrap_or_default();
            let key = if group_key == Some(*column) { "yes" } else { "" };
            rows.push(vec![
                level.to_string(),
                field.clone(),
                column.to_string(),
                header,
                key.to_string(),
            ]);
        }
        if let Some(column) = group_key {
            if !mapping.fields().iter().any(|(_, mapped)| *mapped == column) {
                let header = headers
                    .and_then(|names| names.get(column))
                    .cloned()
                    .unwrap_or_default();
                rows.push(vec![
                    level.to_string(),
                    String::new(),
                    column.to_string(),
                    header,
                    "yes".to_string(),
                ]);
            }
        }
    }
    rows
}

pub fn render_layout(layout: &Layout, headers: Option<&[String]>) -> String {
    let titles = ["level", "field", "column", "header", "group key"].map(String::from);
    let rows = layout_rows(layout, headers);

    let mut widths = titles.iter().map(|t| t.chars().count()).collect_vec();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect_vec();
    for line in std::iter::once(titles.as_slice())
        .chain(std::iter::once(separator.as_slice()))
        .chain(rows.iter().map(Vec::as_slice))
    {
        let padded = line
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .join("  ");
        let _ = writeln!(output, "{}", padded.trim_end());
    }
    output
}
