//! Name scopes used while binding.

use crate::plan::BoundExpr;
use crate::schema::Schema;
use crate::value::DataType;

/// A source whose records may carry columns outside its sampled schema.
#[derive(Debug, Clone)]
pub(crate) struct DynamicSource {
    /// Qualifier the source answers to.
    pub qualifier: String,
    /// Key of the FROM entry, used to register late columns.
    pub key: usize,
}

/// Columns visible to the expressions of one SELECT block.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    pub schema: Schema,
    pub dynamic: Vec<DynamicSource>,
}

impl Scope {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            dynamic: Vec::new(),
        }
    }

    /// Concatenates two scopes, `self` first.
    pub fn join(self, right: Self) -> Self {
        let mut dynamic = self.dynamic;
        dynamic.extend(right.dynamic);
        Self {
            schema: self.schema.join(&right.schema),
            dynamic,
        }
    }

    /// Dynamic sources answering to `qualifier` (all of them when `None`).
    pub fn dynamic_matches(&self, qualifier: Option<&str>) -> Vec<&DynamicSource> {
        self.dynamic
            .iter()
            .filter(|d| qualifier.is_none_or(|q| d.qualifier.eq_ignore_ascii_case(q)))
            .collect()
    }
}

/// One query nesting level. Level `n + 1` belongs to a subquery of level
/// `n`; its captures are expressions over level `n` passed down as
/// parameters.
#[derive(Debug, Default)]
pub(crate) struct Level {
    pub scope: Option<Scope>,
    pub captures: Vec<BoundExpr>,
}

impl Level {
    /// Registers a capture, returning the parameter that reads it.
    pub fn capture(&mut self, expr: BoundExpr, data_type: DataType) -> BoundExpr {
        let index = match self.captures.iter().position(|c| *c == expr) {
            Some(index) => index,
            None => {
                self.captures.push(expr);
                self.captures.len() - 1
            }
        };
        BoundExpr::Parameter { index, data_type }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    #[test]
    fn test_capture_deduplicates() {
        let mut level = Level::default();
        let a = level.capture(BoundExpr::Column(3), DataType::Integer);
        let b = level.capture(BoundExpr::Column(1), DataType::String);
        let c = level.capture(BoundExpr::Column(3), DataType::Integer);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(level.captures.len(), 2);
    }

    #[test]
    fn test_dynamic_matches_by_qualifier() {
        let scope = Scope {
            schema: Schema::new(vec![Column::new("x", DataType::Integer)]),
            dynamic: vec![
                DynamicSource {
                    qualifier: "a".into(),
                    key: 1,
                },
                DynamicSource {
                    qualifier: "b".into(),
                    key: 2,
                },
            ],
        };
        assert_eq!(scope.dynamic_matches(None).len(), 2);
        assert_eq!(scope.dynamic_matches(Some("B"))[0].key, 2);
        assert!(scope.dynamic_matches(Some("c")).is_empty());
    }
}
