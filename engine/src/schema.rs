//! Ordered column schemas.

use crate::value::DataType;
use serde::{Deserialize, Serialize};

/// A single column of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as exposed to SQL.
    pub name: String,
    /// Declared or inferred data type.
    pub data_type: DataType,
    /// Source qualifier (table alias) the column belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl Column {
    /// Creates an unqualified column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            qualifier: None,
        }
    }

    /// Sets the source qualifier.
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Returns true if this column answers to `name` (and `qualifier` when
    /// given), compared case-insensitively.
    #[must_use]
    pub fn matches(&self, qualifier: Option<&str>, name: &str) -> bool {
        if !self.name.eq_ignore_ascii_case(name) {
            return false;
        }
        match (qualifier, &self.qualifier) {
            (None, _) => true,
            (Some(q), Some(own)) => own.eq_ignore_ascii_case(q),
            (Some(_), None) => false,
        }
    }
}

/// Ordered list of columns describing a row layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Creates a schema from columns.
    #[must_use]
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Creates a schema with no columns.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Builds a source schema from raw names, renaming case-insensitive
    /// duplicates to `name_2`, `name_3`, ... and blank names to `field_N`.
    #[must_use]
    pub fn from_names<S: AsRef<str>>(names: &[S], data_type: DataType) -> Self {
        let mut columns: Vec<Column> = Vec::with_capacity(names.len());
        for (i, raw) in names.iter().enumerate() {
            let raw = raw.as_ref().trim();
            let base = if raw.is_empty() {
                format!("field_{}", i + 1)
            } else {
                raw.to_string()
            };
            let mut name = base.clone();
            let mut suffix = 2;
            while columns.iter().any(|c| c.name.eq_ignore_ascii_case(&name)) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            columns.push(Column::new(name, data_type));
        }
        Self { columns }
    }

    /// Columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column at `index`.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Positions of every column matching the (optionally qualified) name.
    #[must_use]
    pub fn find(&self, qualifier: Option<&str>, name: &str) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.matches(qualifier, name))
            .map(|(i, _)| i)
            .collect()
    }

    /// Position of the first column named `name`, ignoring qualifiers.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Appends a column, returning its position.
    pub fn push(&mut self, column: Column) -> usize {
        self.columns.push(column);
        self.columns.len() - 1
    }

    /// Returns a copy of this schema with every column re-qualified.
    #[must_use]
    pub fn qualified(&self, qualifier: &str) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    qualifier: Some(qualifier.to_string()),
                    ..c.clone()
                })
                .collect(),
        }
    }

    /// Concatenates two schemas (left columns first).
    #[must_use]
    pub fn join(&self, right: &Self) -> Self {
        let mut columns = self.columns.clone();
        columns.extend(right.columns.iter().cloned());
        Self { columns }
    }

    /// Returns true if any column has a qualifier equal to `qualifier`.
    #[must_use]
    pub fn has_qualifier(&self, qualifier: &str) -> bool {
        self.columns.iter().any(|c| {
            c.qualifier
                .as_deref()
                .is_some_and(|q| q.eq_ignore_ascii_case(qualifier))
        })
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| match &c.qualifier {
                Some(q) => format!("{q}.{}:{}", c.name, c.data_type),
                None => format!("{}:{}", c.name, c.data_type),
            })
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
