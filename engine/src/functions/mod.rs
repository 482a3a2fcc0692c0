//! Function library.
//!
//! Functions are registered by case-insensitive name with a fixed arity
//! range and resolved once at bind time into one of three kinds:
//!
//! - [`ScalarFunction`] - evaluated per row
//! - [`AggregateFunction`] - folded over a group by an [`Accumulator`]
//! - [`WindowFunction`] - evaluated over an ordered partition
//!
//! Every aggregate may also be used as a window function with `OVER`.

pub mod aggregate;
pub mod scalar;
pub mod window;

pub use aggregate::{Accumulator, AggregateFunction};
pub use scalar::ScalarFunction;
pub use window::WindowFunction;

use std::fmt;

/// Accepted argument counts, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    /// Fewest arguments.
    pub min: usize,
    /// Most arguments.
    pub max: usize,
}

impl Arity {
    /// Exactly `n` arguments.
    #[must_use]
    pub const fn exact(n: usize) -> Self {
        Self { min: n, max: n }
    }

    /// Between `min` and `max` arguments.
    #[must_use]
    pub const fn range(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Returns true if `n` arguments are accepted.
    #[must_use]
    pub fn accepts(self, n: usize) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{} to {}", self.min, self.max)
        }
    }
}

/// A resolved function name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Row-level function.
    Scalar(ScalarFunction),
    /// Aggregate function.
    Aggregate(AggregateFunction),
    /// Window-only function.
    Window(WindowFunction),
}

impl FunctionKind {
    /// Accepted argument counts.
    #[must_use]
    pub fn arity(self) -> Arity {
        match self {
            Self::Scalar(f) => f.arity(),
            Self::Aggregate(f) => f.arity(),
            Self::Window(f) => f.arity(),
        }
    }
}

/// Resolves a function name, case-insensitively.
///
/// # Example
///
/// ```
/// use engine::functions::{lookup, FunctionKind, ScalarFunction};
///
/// assert_eq!(lookup("to_uppercase"), Some(FunctionKind::Scalar(ScalarFunction::Upper)));
/// assert!(lookup("no_such_function").is_none());
/// ```
#[must_use]
pub fn lookup(name: &str) -> Option<FunctionKind> {
    let upper = name.to_ascii_uppercase();
    if let Some(f) = AggregateFunction::from_name(&upper) {
        return Some(FunctionKind::Aggregate(f));
    }
    if let Some(f) = WindowFunction::from_name(&upper) {
        return Some(FunctionKind::Window(f));
    }
    ScalarFunction::from_name(&upper).map(FunctionKind::Scalar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_kinds() {
        assert_eq!(
            lookup("count"),
            Some(FunctionKind::Aggregate(AggregateFunction::Count))
        );
        assert_eq!(
            lookup("Row_Number"),
            Some(FunctionKind::Window(WindowFunction::RowNumber))
        );
        assert_eq!(
            lookup("ceiling"),
            Some(FunctionKind::Scalar(ScalarFunction::Ceil))
        );
    }

    #[test]
    fn test_arity() {
        let substr = lookup("SUBSTR").unwrap().arity();
        assert!(substr.accepts(2));
        assert!(substr.accepts(3));
        assert!(!substr.accepts(1));
        assert_eq!(substr.to_string(), "2 to 3");
        assert_eq!(Arity::exact(1).to_string(), "1");
    }
}
