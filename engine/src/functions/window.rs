//! Window-only functions. Evaluation lives in the window operator; this
//! module holds the signatures.

use super::Arity;
use crate::value::DataType;

/// Functions valid only with `OVER (...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum WindowFunction {
    RowNumber,
    Rank,
    DenseRank,
    Ntile,
    Lag,
    Lead,
    FirstValue,
    LastValue,
}

impl WindowFunction {
    /// Resolves an upper-case function name.
    #[must_use]
    pub fn from_name(upper: &str) -> Option<Self> {
        let f = match upper {
            "ROW_NUMBER" => Self::RowNumber,
            "RANK" => Self::Rank,
            "DENSE_RANK" => Self::DenseRank,
            "NTILE" => Self::Ntile,
            "LAG" => Self::Lag,
            "LEAD" => Self::Lead,
            "FIRST_VALUE" => Self::FirstValue,
            "LAST_VALUE" => Self::LastValue,
            _ => return None,
        };
        Some(f)
    }

    /// Canonical name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RowNumber => "ROW_NUMBER",
            Self::Rank => "RANK",
            Self::DenseRank => "DENSE_RANK",
            Self::Ntile => "NTILE",
            Self::Lag => "LAG",
            Self::Lead => "LEAD",
            Self::FirstValue => "FIRST_VALUE",
            Self::LastValue => "LAST_VALUE",
        }
    }

    /// Accepted argument counts.
    #[must_use]
    pub fn arity(self) -> Arity {
        match self {
            Self::RowNumber | Self::Rank | Self::DenseRank => Arity::exact(0),
            Self::Ntile | Self::FirstValue | Self::LastValue => Arity::exact(1),
            Self::Lag | Self::Lead => Arity::range(1, 3),
        }
    }

    /// Whether the function reads the window frame rather than the whole
    /// partition.
    #[must_use]
    pub fn uses_frame(self) -> bool {
        matches!(self, Self::FirstValue | Self::LastValue)
    }

    /// Result type given the argument types.
    #[must_use]
    pub fn return_type(self, args: &[DataType]) -> DataType {
        match self {
            Self::RowNumber | Self::Rank | Self::DenseRank | Self::Ntile => DataType::Integer,
            Self::Lag | Self::Lead => {
                let value = args.first().copied().unwrap_or(DataType::Dynamic);
                match args.get(2) {
                    Some(default) => value.common_supertype(*default).unwrap_or(DataType::Dynamic),
                    None => value,
                }
            }
            Self::FirstValue | Self::LastValue => {
                args.first().copied().unwrap_or(DataType::Dynamic)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_signatures() {
        assert_eq!(WindowFunction::from_name("DENSE_RANK"), Some(WindowFunction::DenseRank));
        assert!(WindowFunction::Lag.arity().accepts(3));
        assert!(!WindowFunction::RowNumber.arity().accepts(1));
        assert_eq!(
            WindowFunction::Lag.return_type(&[DataType::Integer, DataType::Integer, DataType::Float]),
            DataType::Float
        );
        assert!(WindowFunction::LastValue.uses_frame());
    }
}
