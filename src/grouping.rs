//! Rebuilds nested item trees from grouped-contiguous rows.
//!
//! Rows are consumed strictly in order. For each row the engine finds the
//! shallowest level whose group key differs from the previous row
//! ([`detect_change`]), builds one fresh item for that level and every level
//! below it ([`build_items`]), and closes the items they replace. A closed
//! item is attached as the last child of the item still open one level up;
//! a closed level-0 item is a finished root.
//!
//! Input must already be sorted so that every entity's rows are adjacent. A
//! key value that reappears after a different value starts a new sibling.

use anyhow::Result;
use log::debug;

use crate::{Cell, item::Item, layout::Layout};

/// Outcome of comparing a row against the currently open chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeLevel {
    /// The entity at this level (and so every deeper one) is new.
    Changed(usize),
    /// Every grouped level matches; only a new leaf is needed.
    Unchanged,
}

impl ChangeLevel {
    /// First level that receives a new item for a layout with `group_keys` keys.
    pub fn first_new_level(self, group_keys: usize) -> usize {
        match self {
            ChangeLevel::Changed(level) => level,
            ChangeLevel::Unchanged => group_keys,
        }
    }
}

fn cell(row: &[Cell], column: usize) -> Option<&str> {
    row.get(column).and_then(|value| value.as_deref())
}

/// Finds the shallowest grouped level whose key in `row` differs from the
/// cached key of the open chain. `cached[i]` holds level `i`'s key value; a
/// missing entry means the level has never been opened.
///
/// An absent cached key always counts as a change, so rows without a key
/// value never merge into one entity.
pub fn detect_change(row: &[Cell], cached: &[Cell], group_keys: &[usize]) -> ChangeLevel {
    for (level, &column) in group_keys.iter().enumerate() {
        match cached.get(level) {
            None | Some(None) => return ChangeLevel::Changed(level),
            Some(Some(previous)) if cell(row, column) != Some(previous.as_str()) => {
                return ChangeLevel::Changed(level);
            }
            Some(Some(_)) => {}
        }
    }
    ChangeLevel::Unchanged
}

/// Maps `row` once per level from the change point down to the leaf, trunk first.
pub fn build_items(layout: &Layout, row: &[Cell], change: ChangeLevel) -> Vec<Item> {
    let start = match change {
        ChangeLevel::Changed(level) => level,
        ChangeLevel::Unchanged => layout.depth() - 1,
    };
    layout.levels()[start..]
        .iter()
        .map(|mapping| mapping.apply(row))
        .collect()
}

/// Incremental tree assembler. One engine per row stream.
#[derive(Debug)]
pub struct GroupEngine<'a> {
    layout: &'a Layout,
    open: Vec<Item>,
    cached: Vec<Cell>,
    rows_seen: usize,
    items_built: usize,
    roots_completed: usize,
}

impl<'a> GroupEngine<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        GroupEngine {
            layout,
            open: Vec::with_capacity(layout.depth()),
            cached: Vec::with_capacity(layout.group_keys().len()),
            rows_seen: 0,
            items_built: 0,
            roots_completed: 0,
        }
    }

    /// Feeds one row. Returns the previous root once this row starts a new one.
    pub fn push_row(&mut self, row: &[Cell]) -> Option<Item> {
        let layout = self.layout;
        let group_keys = layout.group_keys();
        let change = detect_change(row, &self.cached, group_keys);
        let level = change.first_new_level(group_keys.len());
        let new_items = build_items(layout, row, change);

        let completed = self.close_from(level);

        self.cached.truncate(level);
        self.cached.extend(
            group_keys[level..]
                .iter()
                .map(|&column| cell(row, column).map(str::to_string)),
        );

        self.rows_seen += 1;
        self.items_built += new_items.len();
        self.open.extend(new_items);
        completed
    }

    /// Closes the open chain and returns the last root, if any rows were seen.
    pub fn finish(&mut self) -> Option<Item> {
        self.cached.clear();
        self.close_from(0)
    }

    /// Items currently open, trunk first. Each one becomes the parent of the
/// next once that item closes.
    pub fn open_items(&self) -> &[Item] {
        &self.open
    }

    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    pub fn items_built(&self) -> usize {
        self.items_built
    }

    pub fn roots_completed(&self) -> usize {
        self.roots_completed
    }

    fn close_from(&mut self, level: usize) -> Option<Item> {
        let mut completed = None;
        while self.open.len() > level {
            let Some(item) = self.open.pop() else { break };
            match self.open.last_mut() {
                Some(parent) => parent.push_child(item),
                None => completed = Some(item),
            }
        }
        if completed.is_some() {
            self.roots_completed += 1;
            debug!(
                "Completed root {} after {} row(s)",
                self.roots_completed, self.rows_seen
            );
        }
        completed
    }
}

/// Groups `rows` into root items, in order of first appearance.
pub fn assemble<I>(layout: &Layout, rows: I) -> Vec<Item>
where
    I: IntoIterator,
    I::Item: AsRef<[Cell]>,
{
    let mut roots = Vec::new();
    let mut engine = GroupEngine::new(layout);
    for row in rows {
        roots.extend(engine.push_row(row.as_ref()));
    }
    roots.extend(engine.finish());
    roots
}

/// Groups `rows` and hands each root to `callback` as soon as it is complete.
///
/// A callback error stops processing immediately; roots already handed over
/// stay handed over. Returns the number of roots delivered.
pub fn for_each_root<I, F>(layout: &Layout, rows: I, mut callback: F) -> Result<usize>
where
    I: IntoIterator,
    I::Item: AsRef<[Cell]>,
    F: FnMut(Item) -> Result<()>,
{
    let mut engine = GroupEngine::new(layout);
    let mut delivered = 0usize;
    for row in rows {
        if let Some(root) = engine.push_row(row.as_ref()) {
            callback(root)?;
            delivered += 1;
        }
    }
    if let Some(root) = engine.finish() {
        callback(root)?;
        delivered += 1;
    }
    debug!(
        "Grouped {} row(s) into {} item(s) across {} root(s)",
        engine.rows_seen(),
        engine.items_built(),
        delivered
    );
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LevelMapping;

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Some(c.to_string())).collect()
    }

    fn cached(cells: &[&str]) -> Vec<Cell> {
        row(cells)
    }

    fn product_layout() -> Layout {
        Layout::new(
            vec![
                LevelMapping::new([("number", 0), ("name", 1)]),
                LevelMapping::new([("color_name", 2)]),
                LevelMapping::new([("size_name", 3)]),
            ],
            vec![0, 2],
        )
        .unwrap()
    }

    #[test]
    fn detects_change_at_first_grouped_level() {
        let change = detect_change(&row(&["a", "e", "a"]), &cached(&["b", "b"]), &[1]);
        assert_eq!(change, ChangeLevel::Changed(0));
    }

    #[test]
    fn reports_unchanged_when_every_key_matches() {
        let change = detect_change(&row(&["a", "b", "a"]), &cached(&["b"]), &[1]);
        assert_eq!(change, ChangeLevel::Unchanged);
        assert_eq!(change.first_new_level(1), 1);
    }

    #[test]
    fn detects_nested_change() {
        let line = row(&["a", "f", "i", "e"]);
        let change = detect_change(&line, &cached(&["a", "s", "z"]), &[0, 2, 4]);
        assert_eq!(change, ChangeLevel::Changed(1));
    }

    #[test]
    fn unset_cache_entry_counts_as_change() {
        let change = detect_change(&row(&["a", "b"]), &cached(&["a"]), &[0, 1]);
        assert_eq!(change, ChangeLevel::Changed(1));
        assert_eq!(detect_change(&row(&["a"]), &[], &[0]), ChangeLevel::Changed(0));
    }

    #[test]
    fn absent_cached_key_counts_as_change() {
        let line: Vec<Cell> = vec![Some("a".into()), None];
        let previous: Vec<Cell> = vec![Some("a".into()), None];
        assert_eq!(detect_change(&line, &previous, &[0, 1]), ChangeLevel::Changed(1));
        assert_eq!(detect_change(&[], &previous, &[0, 1]), ChangeLevel::Changed(0));

        let line: Vec<Cell> = vec![Some("a".into()), Some("b".into())];
        assert_eq!(detect_change(&line, &previous, &[0, 1]), ChangeLevel::Changed(1));
    }

    #[test]
    fn keyless_rows_become_separate_roots() {
        let layout = Layout::new(
            vec![LevelMapping::new([("id", 0)]), LevelMapping::new([("v", 1)])],
            vec![0],
        )
        .unwrap();
        let rows: Vec<Vec<Cell>> = vec![vec![None, Some("a".into())], vec![None, Some("b".into())]];
        let roots = assemble(&layout, &rows);
        assert_eq!(roots.len(), 2);
        assert!(roots.iter().all(|root| root.leaf_count() == 1));
    }

    #[test]
    fn builds_every_level_from_change_point() {
        let layout = product_layout();
        let line = row(&["01", "product 1", "red", "small"]);

        let items = build_items(&layout, &line, ChangeLevel::Changed(0));
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].get("name"), Some("product 1"));
        assert_eq!(items[0].get("color_name"), None);
        assert_eq!(items[1].get("color_name"), Some("red"));
        assert_eq!(items[2].get("size_name"), Some("small"));

        let items = build_items(&layout, &line, ChangeLevel::Changed(1));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("color_name"), Some("red"));
    }

    #[test]
    fn unchanged_builds_only_the_leaf() {
        let layout = product_layout();
        let line = row(&["01", "p", "red", "large"]);
        let items = build_items(&layout, &line, ChangeLevel::Unchanged);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get("size_name"), Some("large"));
    }

    #[test]
    fn engine_keeps_full_chain_open() {
        let layout = product_layout();
        let mut engine = GroupEngine::new(&layout);
        assert!(engine.push_row(&row(&["01", "p", "red", "small"])).is_none());
        assert_eq!(engine.open_items().len(), 3);
        assert!(engine.push_row(&row(&["01", "p", "red", "large"])).is_none());
        assert_eq!(engine.open_items().len(), 3);
        assert_eq!(engine.items_built(), 4);
        assert_eq!(engine.open_items()[1].children().len(), 1);

        let root = engine.push_row(&row(&["02", "q", "red", "small"])).unwrap();
        assert_eq!(root.get("number"), Some("01"));
        assert_eq!(root.children()[0].children().len(), 2);
        assert_eq!(engine.roots_completed(), 1);

        let last = engine.finish().unwrap();
        assert_eq!(last.get("number"), Some("02"));
        assert!(engine.finish().is_none());
    }

    #[test]
    fn single_level_layout_emits_one_root_per_row() {
        let layout = Layout::new(vec![LevelMapping::new([("v", 0)])], vec![]).unwrap();
        let roots = assemble(&layout, vec![row(&["a"]), row(&["a"]), row(&["b"])]);
        assert_eq!(roots.len(), 3);
        assert!(roots.iter().all(|root| root.children().is_empty()));
    }
}
