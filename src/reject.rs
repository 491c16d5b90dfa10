//! Declarative line-rejection rules.
//!
//! Rules are short text expressions such as `id is empty`, `status = void` or
//! `sku ~ ^TMP-`. A row is rejected when *any* rule matches it. Column names
//! resolve against the header row the same way layout columns do.

use anyhow::{Context, Result};
use regex::Regex;

use crate::{Cell, error::ConfigError, layout::ColumnRef};

#[derive(Debug, Clone)]
pub enum RejectOperator {
    IsEmpty,
    IsPresent,
    Eq(String),
    NotEq(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Matches(Regex),
}

#[derive(Debug, Clone)]
pub struct RejectRule {
    pub column: ColumnRef,
    pub operator: RejectOperator,
}

impl RejectRule {
    pub fn parse(rule: &str) -> Result<Self, ConfigError> {
        let trimmed = rule.trim();
        let invalid = |reason: &str| ConfigError::InvalidRejectRule {
            rule: trimmed.to_string(),
            reason: reason.to_string(),
        };
        if trimmed.is_empty() {
            return Err(invalid("empty rule"));
        }

        let lowered = trimmed.to_ascii_lowercase();
        for (suffix, operator) in [
            (" is empty", RejectOperator::IsEmpty),
            (" is blank", RejectOperator::IsEmpty),
            (" is present", RejectOperator::IsPresent),
        ] {
            if lowered.ends_with(suffix) {
                let column = trimmed[..trimmed.len() - suffix.len()].trim();
                if column.is_empty() {
                    return Err(invalid("missing column"));
                }
                return Ok(RejectRule {
                    column: ColumnRef::parse(column),
                    operator,
                });
            }
        }

        for needle in [" contains ", " startswith ", " endswith "] {
            if let Some(idx) = lowered.find(needle) {
                let column = trimmed[..idx].trim();
                let value = unquote(trimmed[idx + needle.len()..].trim()).to_string();
                let operator = match needle {
                    " contains " => RejectOperator::Contains(value),
                    " startswith " => RejectOperator::StartsWith(value),
                    _ => RejectOperator::EndsWith(value),
                };
                return build(column, operator).ok_or_else(|| invalid("missing column"));
            }
        }

        // The leftmost operator wins so values may contain '=' or '~'.
        let Some((idx, needle)) = ["!=", "=", "~"]
            .into_iter()
            .filter_map(|needle| trimmed.find(needle).map(|idx| (idx, needle)))
            .min_by_key(|(idx, _)| *idx)
        else {
            return Err(invalid("unrecognised operator"));
        };
        let column = trimmed[..idx].trim();
        let value = unquote(trimmed[idx + needle.len()..].trim()).to_string();
        let operator = match needle {
            "!=" => RejectOperator::NotEq(value),
            "=" => RejectOperator::Eq(value),
            _ => RejectOperator::Matches(
                Regex::new(&value).map_err(|err| invalid(&err.to_string()))?,
            ),
        };
        build(column, operator).ok_or_else(|| invalid("missing column"))
    }

    pub fn resolve(&self, headers: Option<&[String]>) -> Result<ResolvedRule, ConfigError> {
        Ok(ResolvedRule {
            index: self.column.resolve(headers)?,
            operator: self.operator.clone(),
        })
    }
}

fn build(column: &str, operator: RejectOperator) -> Option<RejectRule> {
    (!column.is_empty()).then(|| RejectRule {
        column: ColumnRef::parse(column),
        operator,
    })
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

pub fn parse_rules(rules: &[String]) -> Result<Vec<RejectRule>, ConfigError> {
    rules.iter().map(|rule| RejectRule::parse(rule)).collect()
}

/// A rule bound to a concrete column index.
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    index: usize,
    operator: RejectOperator,
}

impl ResolvedRule {
    pub fn matches(&self, row: &[Cell]) -> bool {
        let value = row.get(self.index).and_then(|cell| cell.as_deref());
        use RejectOperator::*;
        match (&self.operator, value) {
            (IsEmpty, value) => value.is_none_or(|v| v.trim().is_empty()),
            (IsPresent, value) => value.is_some_and(|v| !v.trim().is_empty()),
            (Eq(expected), value) => value.unwrap_or("") == expected,
            (NotEq(expected), value) => value.unwrap_or("") != expected,
            (_, None) => false,
            (Contains(needle), Some(v)) => v.contains(needle.as_str()),
            (StartsWith(needle), Some(v)) => v.starts_with(needle.as_str()),
            (EndsWith(needle), Some(v)) => v.ends_with(needle.as_str()),
            (Matches(regex), Some(v)) => regex.is_match(v),
        }
    }
}

/// Compiles resolved rules into a predicate usable by the preprocessor.
pub fn into_predicate(rules: Vec<ResolvedRule>) -> impl Fn(&[Cell]) -> Result<bool> {
    move |row: &[Cell]| Ok(rules.iter().any(|rule| rule.matches(row)))
}

/// Resolves every rule, failing on the first unknown column.
pub fn resolve_rules(
    rules: &[RejectRule],
    headers: Option<&[String]>,
) -> Result<Vec<ResolvedRule>> {
    rules
        .iter()
        .map(|rule| {
            rule.resolve(headers)
                .with_context(|| format!("Resolving reject rule on column '{}'", rule.column))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[Option<&str>]) -> Vec<Cell> {
        cells.iter().map(|c| c.map(str::to_string)).collect()
    }

    fn resolved(rule: &str) -> ResolvedRule {
        RejectRule::parse(rule).unwrap().resolve(None).unwrap()
    }

    #[test]
    fn is_empty_matches_absent_and_blank_cells() {
        let rule = resolved("0 is empty");
        assert!(rule.matches(&row(&[None, Some("x")])));
        assert!(rule.matches(&row(&[Some("   "), Some("x")])));
        assert!(rule.matches(&[]));
        assert!(!rule.matches(&row(&[Some("001")])));
    }

    #[test]
    fn comparison_operators_parse_with_quotes() {
        let rule = resolved("2 = 'void'");
        assert!(rule.matches(&row(&[None, None, Some("void")])));
        assert!(!rule.matches(&row(&[None, None, Some("ok")])));

        let rule = resolved("1 != ok");
        assert!(rule.matches(&row(&[None, None])));
        assert!(!rule.matches(&row(&[None, Some("ok")])));
    }

    #[test]
    fn text_operators_ignore_absent_cells() {
        let rule = resolved("0 contains tmp");
        assert!(rule.matches(&row(&[Some("a-tmp-b")])));
        assert!(!rule.matches(&row(&[None])));
        assert!(resolved("0 StartsWith ab").matches(&row(&[Some("abc")])));
        assert!(resolved("0 endswith bc").matches(&row(&[Some("abc")])));
    }

    #[test]
    fn regex_rules_compile_eagerly() {
        assert!(resolved("0 ~ ^TMP-\\d+$").matches(&row(&[Some("TMP-12")])));
        assert!(resolved("0 ~ k=v$").matches(&row(&[Some("k=v")])));
        let err = RejectRule::parse("0 ~ (").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRejectRule { .. }));
    }

    #[test]
    fn named_columns_need_headers() {
        let rule = RejectRule::parse("id is empty").unwrap();
        assert_eq!(rule.column, ColumnRef::Name("id".into()));
        let headers = vec!["name".to_string(), "id".to_string()];
        let resolved = rule.resolve(Some(headers.as_slice())).unwrap();
        assert!(resolved.matches(&row(&[Some("n"), None])));
        assert!(rule.resolve(None).is_err());
    }

    #[test]
    fn unparseable_rules_are_config_errors() {
        assert!(RejectRule::parse("").is_err());
        assert!(RejectRule::parse("just words").is_err());
        assert!(RejectRule::parse(" is empty").is_err());
    }

    #[test]
    fn predicate_rejects_when_any_rule_matches() {
        let predicate = into_predicate(vec![resolved("0 is empty"), resolved("1 = skip")]);
        assert!(predicate(&row(&[None, Some("keep")])).unwrap());
        assert!(predicate(&row(&[Some("a"), Some("skip")])).unwrap());
        assert!(!predicate(&row(&[Some("a"), Some("keep")])).unwrap());
    }
}
