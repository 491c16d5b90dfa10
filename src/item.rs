//! Materialized entities produced by the grouping engine.
//!
//! An [`Item`] is one level's mapped fields plus the items nested below it.
//! Items own their children outright; nothing points back up the tree.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Key under which children are emitted when an item is serialized.
pub const CHILDREN_KEY: &str = "children";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    fields: Vec<(String, Option<String>)>,
    children: Vec<Item>,
}

impl Item {
    /// Builds an item from `(field, value)` pairs, keeping their order.
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        Item {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            children: Vec::new(),
        }
    }

    /// Sets `field`, replacing an existing value in place.
    pub fn insert(&mut self, field: impl Into<String>, value: Option<String>) {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Value of `field`. Returns `None` both for unmapped fields and absent cells.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == field)
    }

    pub fn fields(&self) -> &[(String, Option<String>)] {
        &self.fields
    }

    pub fn children(&self) -> &[Item] {
        &self.children
    }

    pub fn push_child(&mut self, child: Item) {
        self.children.push(child);
    }

    /// Number of items without children in this subtree (the item itself counts
    /// when it is a leaf).
    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(Item::leaf_count).sum()
        }
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(!self.children.is_empty());
        let mut map = serializer.serialize_map(Some(self.fields.len() + extra))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        if !self.children.is_empty() {
            map.serialize_entry(CHILDREN_KEY, &self.children)?;
        }
        map.end()
    }
}
