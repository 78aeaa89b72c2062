//! WHERE clauses with positional parameters

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::workbook::CellValue;

/// A boolean SQL clause plus the values bound to its `?` placeholders, in order
///
/// Deserializing goes through [`Filter::new`], so a stored filter with a
/// mismatched placeholder count is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FilterParts")]
pub struct Filter {
    clause: String,
    params: Vec<CellValue>,
}

#[derive(Deserialize)]
struct FilterParts {
    clause: String,
    params: Vec<CellValue>,
}

impl TryFrom<FilterParts> for Filter {
    type Error = anyhow::Error;

    fn try_from(parts: FilterParts) -> Result<Self> {
        Filter::new(parts.clause, parts.params)
    }
}

impl Filter {
    /// Custom clause; the number of `?` placeholders must equal `params.len()`
    pub fn new(clause: impl Into<String>, params: Vec<CellValue>) -> Result<Self> {
        let clause = clause.into();
        let placeholders = count_placeholders(&clause);
        if placeholders != params.len() {
            bail!(
                "Filter '{}' has {} placeholders but {} parameters were supplied",
                clause,
                placeholders,
                params.len()
            );
        }
        Ok(Self { clause, params })
    }

    /// Clauses built here always carry one param per placeholder
    fn built(clause: String, params: Vec<CellValue>) -> Self {
        debug_assert_eq!(count_placeholders(&clause), params.len());
        Self { clause, params }
    }

    /// Matches every record
    pub fn all() -> Self {
        Self::built("1 = 1".to_string(), Vec::new())
    }

    /// `"a" = ? AND "b" IS NULL`; no pairs matches every record
    pub fn equals<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, CellValue)>,
        S: AsRef<str>,
    {
        let mut parts = Vec::new();
        let mut params = Vec::new();
        for (column, value) in pairs {
            let column = quote_ident(column.as_ref());
            // `= NULL` is never true in SQL
            if value == CellValue::Null {
                parts.push(format!("{} IS NULL", column));
            } else {
                parts.push(format!("{} = ?", column));
                params.push(value);
            }
        }

        if parts.is_empty() {
            return Self::all();
        }

        Self::built(parts.join(" AND "), params)
    }

    /// `"column" IN (?, ?, ...)`; an empty value list matches nothing
    pub fn any_of(column: &str, values: Vec<CellValue>) -> Self {
        if values.is_empty() {
            return Self::built("1 = 0".to_string(), Vec::new());
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        Self::built(
            format!("{} IN ({})", quote_ident(column), placeholders),
            values,
        )
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn params(&self) -> &[CellValue] {
        &self.params
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.clause)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
            write!(f, " [{}]", params.join(", "))?;
        }
        Ok(())
    }
}

/// Double-quote an identifier, escaping embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Count `?` placeholders outside of quoted literals and identifiers
fn count_placeholders(clause: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;

    for c in clause.chars() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '?') => count += 1,
            _ => {}
        }
    }

    count
}
