//! Level mappings and group keys: the shape of the tree rebuilt from rows.
//!
//! A layout with `L` levels carries `L` field mappings (trunk first) and
//! `L - 1` group key columns. Configuration files refer to columns either by
//! zero-based index or by header name ([`ColumnRef`]); both resolve to plain
//! indices before any row is touched, so a bad reference fails the whole run
//! up front instead of producing a half-built tree.

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::{Cell, error::ConfigError, item::CHILDREN_KEY, item::Item};

/// A column named in configuration, by position or by header text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl ColumnRef {
    /// Interprets bare digits as an index and anything else as a header name.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed.parse::<usize>() {
            Ok(index) => ColumnRef::Index(index),
            Err(_) => ColumnRef::Name(trimmed.to_string()),
        }
    }

    pub fn resolve(&self, headers: Option<&[String]>) -> Result<usize, ConfigError> {
        match self {
            ColumnRef::Index(index) => Ok(*index),
            ColumnRef::Name(name) => {
                let headers =
                    headers.ok_or_else(|| ConfigError::NamedColumnWithoutHeaders(name.clone()))?;
                headers
                    .iter()
                    .position(|header| header.trim() == name)
                    .ok_or_else(|| ConfigError::UnknownColumn(name.clone()))
            }
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(index) => write!(f, "{index}"),
            ColumnRef::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Field mapping for one level as written in configuration. Field order is
/// the order of the YAML mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelSpec {
    pub fields: Vec<(String, ColumnRef)>,
}

impl LevelSpec {
    pub fn resolve(&self, headers: Option<&[String]>) -> Result<LevelMapping, ConfigError> {
        let fields = self
            .fields
            .iter()
            .map(|(name, column)| Ok((name.clone(), column.resolve(headers)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(LevelMapping { fields })
    }
}

impl<'de> Deserialize<'de> for LevelSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelVisitor;

        impl<'de> Visitor<'de> for LevelVisitor {
            type Value = LevelSpec;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of field names to column indices or header names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<LevelSpec, A::Error> {
                let mut fields: Vec<(String, ColumnRef)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, column)) = access.next_entry::<String, ColumnRef>()? {
                    if fields.iter().any(|(existing, _)| *existing == name) {
                        return Err(de::Error::custom(format!("duplicate field '{name}'")));
                    }
                    fields.push((name, column));
                }
                Ok(LevelSpec { fields })
            }
        }

        deserializer.deserialize_map(LevelVisitor)
    }
}

impl Serialize for LevelSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, column) in &self.fields {
            map.serialize_entry(name, column)?;
        }
        map.end()
    }
}

/// Resolved field mapping for one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelMapping {
    fields: Vec<(String, usize)>,
}

impl LevelMapping {
    pub fn new<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, usize)>,
        K: Into<String>,
    {
        LevelMapping {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn fields(&self) -> &[(String, usize)] {
        &self.fields
    }

    /// Maps `row` into a fresh item. Columns past the end of the row yield
    /// absent values.
    pub fn apply(&self, row: &[Cell]) -> Item {
        Item::from_fields(
            self.fields
                .iter()
                .map(|(name, column)| (name.as_str(), row.get(*column).cloned().flatten())),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    levels: Vec<LevelMapping>,
    group_keys: Vec<usize>,
}

impl Layout {
    pub fn new(levels: Vec<LevelMapping>, group_keys: Vec<usize>) -> Result<Self, ConfigError> {
        check_shape(
            levels.iter().map(|mapping| mapping.fields.as_slice()),
            group_keys.len(),
        )?;
        Ok(Layout { levels, group_keys })
    }

    /// Checks level and group-key counts and field names of an unresolved
    /// configuration. Needs no header row, so it runs even on empty input.
    pub fn check_config(
        levels: &[LevelSpec],
        group_keys: &[ColumnRef],
    ) -> Result<(), ConfigError> {
        check_shape(
            levels.iter().map(|level| level.fields.as_slice()),
            group_keys.len(),
        )
    }

    /// Resolves configured levels and group keys against an optional header row.
    pub fn resolve(
        levels: &[LevelSpec],
        group_keys: &[ColumnRef],
        headers: Option<&[String]>,
    ) -> Result<Self, ConfigError> {
        let levels = levels
            .iter()
            .map(|level| level.resolve(headers))
            .collect::<Result<Vec<_>, _>>()?;
        let group_keys = group_keys
            .iter()
            .map(|column| column.resolve(headers))
            .collect::<Result<Vec<_>, _>>()?;
        Layout::new(levels, group_keys)
    }

    /// Number of nesting levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[LevelMapping] {
        &self.levels
    }

    pub fn group_keys(&self) -> &[usize] {
        &self.group_keys
    }

    /// Fails when any mapping or group key points past `width` columns.
    pub fn validate_width(&self, width: usize) -> Result<(), ConfigError> {
        for (level, &column) in self.group_keys.iter().enumerate() {
            if column >= width {
                return Err(ConfigError::ColumnOutOfRange {
                    context: format!("Group key for level {level}"),
                    column,
                    width,
                });
            }
        }
        for (level, mapping) in self.levels.iter().enumerate() {
            for (name, column) in &mapping.fields {
                if *column >= width {
                    return Err(ConfigError::ColumnOutOfRange {
                        context: format!("Field '{name}' on level {level}"),
                        column: *column,
                        width,
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_shape<'a, T: 'a>(
    levels: impl ExactSizeIterator<Item = &'a [(String, T)]>,
    group_keys: usize,
) -> Result<(), ConfigError> {
    let depth = levels.len();
    if depth == 0 {
        return Err(ConfigError::NoLevels);
    }
    if group_keys != depth - 1 {
        return Err(ConfigError::GroupKeyCount {
            expected: depth - 1,
            levels: depth,
            found: group_keys,
        });
    }
    for (level, fields) in levels.enumerate() {
        if fields.is_empty() {
            return Err(ConfigError::EmptyLevel { level });
        }
        for (idx, (name, _)) in fields.iter().enumerate() {
            if name == CHILDREN_KEY {
                return Err(ConfigError::ReservedField {
                    level,
                    field: name.clone(),
                });
            }
            if fields[..idx].iter().any(|(other, _)| other == name) {
                return Err(ConfigError::DuplicateField {
                    level,
                    field: name.clone(),
                });
            }
        }
    }
    Ok(())
}
