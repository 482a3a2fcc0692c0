//! Aggregate functions and their accumulators.

use super::Arity;
use crate::value::{DataType, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Folds the argument values of one group into a single result.
///
/// `add` receives the evaluated arguments for one input row; `COUNT(*)`
/// receives an empty slice. An `Err` is a runtime warning: the row is
/// skipped and the caller counts the warning.
pub trait Accumulator: Send {
    /// Folds one row.
    ///
    /// # Errors
    ///
    /// Returns a message when the value cannot be aggregated.
    fn add(&mut self, args: &[Value]) -> Result<(), String>;

    /// Current result. May be called repeatedly.
    fn finish(&self) -> Value;
}

/// Built-in aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Stddev,
    Variance,
    First,
    Last,
    StringAgg,
}

impl AggregateFunction {
    /// Resolves an upper-case function name, including aliases.
    #[must_use]
    pub fn from_name(upper: &str) -> Option<Self> {
        let f = match upper {
            "COUNT" => Self::Count,
            "SUM" => Self::Sum,
            "AVG" => Self::Avg,
            "MIN" => Self::Min,
            "MAX" => Self::Max,
            "STDDEV" | "STDDEV_SAMP" | "STDEV" => Self::Stddev,
            "VARIANCE" | "VAR_SAMP" | "VAR" => Self::Variance,
            "FIRST" => Self::First,
            "LAST" => Self::Last,
            "STRING_AGG" | "GROUP_CONCAT" => Self::StringAgg,
            _ => return None,
        };
        Some(f)
    }

    /// Canonical name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Stddev => "STDDEV",
            Self::Variance => "VARIANCE",
            Self::First => "FIRST",
            Self::Last => "LAST",
            Self::StringAgg => "STRING_AGG",
        }
    }

    /// Accepted argument counts. `COUNT(*)` is checked separately.
    #[must_use]
    pub fn arity(self) -> Arity {
        match self {
            Self::StringAgg => Arity::range(1, 2),
            _ => Arity::exact(1),
        }
    }

    /// Whether the function may be used with `OVER (...)`.
    #[must_use]
    pub fn allowed_in_window(self, distinct: bool) -> bool {
        !distinct && self != Self::StringAgg
    }

    /// Result type given the argument types.
    #[must_use]
    pub fn return_type(self, args: &[DataType]) -> DataType {
        let first = args.first().copied().unwrap_or(DataType::Dynamic);
        match self {
            Self::Count => DataType::Integer,
            Self::Sum => match first {
                DataType::Integer | DataType::Dynamic => first,
                _ => DataType::Float,
            },
            Self::Avg | Self::Stddev | Self::Variance => DataType::Float,
            Self::Min | Self::Max | Self::First | Self::Last => first,
            Self::StringAgg => DataType::String,
        }
    }

    /// Creates an empty accumulator.
    #[must_use]
    pub fn accumulator(self, distinct: bool) -> Box<dyn Accumulator> {
        let inner: Box<dyn Accumulator> = match self {
            Self::Count => Box::new(CountAccumulator::default()),
            Self::Sum => Box::new(SumAccumulator::default()),
            Self::Avg => Box::new(AvgAccumulator::default()),
            Self::Min => Box::new(ExtremeAccumulator::new(Ordering::Less)),
            Self::Max => Box::new(ExtremeAccumulator::new(Ordering::Greater)),
            Self::Stddev => Box::new(VarianceAccumulator::new(true)),
            Self::Variance => Box::new(VarianceAccumulator::new(false)),
            Self::First => Box::new(PickAccumulator::new(false)),
            Self::Last => Box::new(PickAccumulator::new(true)),
            Self::StringAgg => Box::new(StringAggAccumulator::default()),
        };
        if distinct {
            Box::new(DistinctAccumulator {
                seen: HashSet::new(),
                inner,
            })
        } else {
            inner
        }
    }
}

fn first_arg(args: &[Value]) -> &Value {
    args.first().unwrap_or(&Value::Null)
}

#[derive(Default)]
struct CountAccumulator {
    count: i64,
}

impl Accumulator for CountAccumulator {
    fn add(&mut self, args: &[Value]) -> Result<(), String> {
        if args.is_empty() || !args[0].is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn finish(&self) -> Value {
        Value::Integer(self.count)
    }
}

#[derive(Default)]
enum SumState {
    #[default]
    Empty,
    Integer(i64),
    Float(f64),
    Overflow,
}

#[derive(Default)]
struct SumAccumulator {
    state: SumState,
}

impl Accumulator for SumAccumulator {
    fn add(&mut self, args: &[Value]) -> Result<(), String> {
        let value = first_arg(args);
        if value.is_null() {
            return Ok(());
        }
        let next = match (&self.state, value) {
            (SumState::Overflow, _) => return Ok(()),
            (SumState::Empty, Value::Integer(i)) => SumState::Integer(*i),
            (SumState::Integer(acc), Value::Integer(i)) => match acc.checked_add(*i) {
                Some(sum) => SumState::Integer(sum),
                None => {
                    self.state = SumState::Overflow;
                    return Err("integer overflow in SUM".to_string());
                }
            },
            (state, other) => {
                let x = other
                    .to_f64()
                    .ok_or_else(|| format!("SUM of non-numeric value '{other}'"))?;
                match state {
                    SumState::Integer(acc) => SumState::Float(*acc as f64 + x),
                    SumState::Float(acc) => SumState::Float(acc + x),
                    _ => SumState::Float(x),
                }
            }
        };
        self.state = next;
        Ok(())
    }

    fn finish(&self) -> Value {
        match self.state {
            SumState::Integer(i) => Value::Integer(i),
            SumState::Float(f) => Value::Float(f),
            SumState::Empty | SumState::Overflow => Value::Null,
        }
    }
}

#[derive(Default)]
struct AvgAccumulator {
    sum: f64,
    count: u64,
}

impl Accumulator for AvgAccumulator {
    fn add(&mut self, args: &[Value]) -> Result<(), String> {
        let value = first_arg(args);
        if value.is_null() {
            return Ok(());
        }
        let x = value
            .to_f64()
            .ok_or_else(|| format!("AVG of non-numeric value '{value}'"))?;
        self.sum += x;
        self.count += 1;
        Ok(())
    }

    fn finish(&self) -> Value {
        if self.count == 0 {
            Value::Null
        } else {
            Value::Float(self.sum / self.count as f64)
        }
    }
}

/// MIN and MAX under the total sort order.
struct ExtremeAccumulator {
    wanted: Ordering,
    best: Option<Value>,
}

impl ExtremeAccumulator {
    fn new(wanted: Ordering) -> Self {
        Self { wanted, best: None }
    }
}

impl Accumulator for ExtremeAccumulator {
    fn add(&mut self, args: &[Value]) -> Result<(), String> {
        let value = first_arg(args);
        if value.is_null() {
            return Ok(());
        }
        let replace = self
            .best
            .as_ref()
            .is_none_or(|best| value.sort_cmp(best) == self.wanted);
        if replace {
            self.best = Some(value.clone());
        }
        Ok(())
    }

    fn finish(&self) -> Value {
        self.best.clone().unwrap_or_default()
    }
}

/// Sample variance via Welford's online algorithm.
struct VarianceAccumulator {
    sqrt: bool,
    count: u64,
    mean: f64,
    m2: f64,
}

impl VarianceAccumulator {
    fn new(sqrt: bool) -> Self {
        Self {
            sqrt,
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }
}

impl Accumulator for VarianceAccumulator {
    fn add(&mut self, args: &[Value]) -> Result<(), String> {
        let value = first_arg(args);
        if value.is_null() {
            return Ok(());
        }
        let x = value
            .to_f64()
            .ok_or_else(|| format!("non-numeric value '{value}'"))?;
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        Ok(())
    }

    fn finish(&self) -> Value {
        if self.count < 2 {
            return Value::Null;
        }
        let variance = self.m2 / (self.count - 1) as f64;
        Value::Float(if self.sqrt { variance.sqrt() } else { variance })
    }
}

/// FIRST and LAST: the first or last non-null value seen.
struct PickAccumulator {
    last: bool,
    value: Option<Value>,
}

impl PickAccumulator {
    fn new(last: bool) -> Self {
        Self { last, value: None }
    }
}

impl Accumulator for PickAccumulator {
    fn add(&mut self, args: &[Value]) -> Result<(), String> {
        let value = first_arg(args);
        if !value.is_null() && (self.last || self.value.is_none()) {
            self.value = Some(value.clone());
        }
        Ok(())
    }

    fn finish(&self) -> Value {
        self.value.clone().unwrap_or_default()
    }
}

#[derive(Default)]
struct StringAggAccumulator {
    joined: Option<String>,
}

impl Accumulator for StringAggAccumulator {
    fn add(&mut self, args: &[Value]) -> Result<(), String> {
        let Some(text) = first_arg(args).to_text() else {
            return Ok(());
        };
        match &mut self.joined {
            Some(joined) => {
                let separator = args
                    .get(1)
                    .and_then(Value::to_text)
                    .unwrap_or_else(|| ",".to_string());
                joined.push_str(&separator);
                joined.push_str(&text);
            }
            None => self.joined = Some(text),
        }
        Ok(())
    }

    fn finish(&self) -> Value {
        self.joined.clone().map_or(Value::Null, Value::String)
    }
}

/// Feeds each distinct first argument to the inner accumulator once.
struct DistinctAccumulator {
    seen: HashSet<Value>,
    inner: Box<dyn Accumulator>,
}

impl Accumulator for DistinctAccumulator {
    fn add(&mut self, args: &[Value]) -> Result<(), String> {
        let value = first_arg(args);
        if value.is_null() || !self.seen.insert(value.clone()) {
            return Ok(());
        }
        self.inner.add(args)
    }

    fn finish(&self) -> Value {
        self.inner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(f: AggregateFunction, distinct: bool, values: &[Value]) -> Value {
        let mut acc = f.accumulator(distinct);
        for v in values {
            let _ = acc.add(std::slice::from_ref(v));
        }
        acc.finish()
    }

    #[test]
    fn test_count_star_and_expr() {
        let mut star = AggregateFunction::Count.accumulator(false);
        star.add(&[]).unwrap();
        star.add(&[]).unwrap();
        assert_eq!(star.finish(), Value::Integer(2));

        let values = [Value::Integer(1), Value::Null, Value::Integer(1)];
        assert_eq!(fold(AggregateFunction::Count, false, &values), Value::Integer(2));
        assert_eq!(fold(AggregateFunction::Count, true, &values), Value::Integer(1));
        assert_eq!(fold(AggregateFunction::Count, false, &[]), Value::Integer(0));
    }

    #[test]
    fn test_sum_widens_and_overflows() {
        assert_eq!(
            fold(AggregateFunction::Sum, false, &[Value::Integer(1), Value::Integer(2)]),
            Value::Integer(3)
        );
        assert_eq!(
            fold(AggregateFunction::Sum, false, &[Value::Integer(1), Value::Float(0.5)]),
            Value::Float(1.5)
        );
        assert_eq!(fold(AggregateFunction::Sum, false, &[Value::Null]), Value::Null);

        let mut acc = AggregateFunction::Sum.accumulator(false);
        acc.add(&[Value::Integer(i64::MAX)]).unwrap();
        assert!(acc.add(&[Value::Integer(1)]).is_err());
        assert_eq!(acc.finish(), Value::Null);
    }

    #[test]
    fn test_sum_rejects_text() {
        let mut acc = AggregateFunction::Sum.accumulator(false);
        assert!(acc.add(&[Value::from("abc")]).is_err());
        acc.add(&[Value::from("2.5")]).unwrap();
        assert_eq!(acc.finish(), Value::Float(2.5));
    }

    #[test]
    fn test_avg_min_max() {
        let values = [Value::Integer(3), Value::Null, Value::Integer(1), Value::Integer(2)];
        assert_eq!(fold(AggregateFunction::Avg, false, &values), Value::Float(2.0));
        assert_eq!(fold(AggregateFunction::Min, false, &values), Value::Integer(1));
        assert_eq!(fold(AggregateFunction::Max, false, &values), Value::Integer(3));
        assert_eq!(fold(AggregateFunction::Avg, false, &[]), Value::Null);
    }

    #[test]
    fn test_sample_variance() {
        let values: Vec<Value> = [2, 4, 4, 4, 5, 5, 7, 9].into_iter().map(Value::Integer).collect();
        let Value::Float(variance) = fold(AggregateFunction::Variance, false, &values) else {
            panic!("expected float");
        };
        assert!((variance - 32.0 / 7.0).abs() < 1e-9);
        assert_eq!(
            fold(AggregateFunction::Stddev, false, &[Value::Integer(1)]),
            Value::Null
        );
    }

    #[test]
    fn test_first_last_string_agg() {
        let values = [Value::Null, Value::from("a"), Value::from("b")];
        assert_eq!(fold(AggregateFunction::First, false, &values), Value::from("a"));
        assert_eq!(fold(AggregateFunction::Last, false, &values), Value::from("b"));

        let mut acc = AggregateFunction::StringAgg.accumulator(false);
        for v in ["x", "y", "z"] {
            acc.add(&[Value::from(v), Value::from("|")]).unwrap();
        }
        assert_eq!(acc.finish(), Value::from("x|y|z"));
    }

    #[test]
    fn test_return_types() {
        assert_eq!(
            AggregateFunction::Sum.return_type(&[DataType::Integer]),
            DataType::Integer
        );
        assert_eq!(
            AggregateFunction::Avg.return_type(&[DataType::Integer]),
            DataType::Float
        );
        assert_eq!(
            AggregateFunction::Max.return_type(&[DataType::Timestamp]),
            DataType::Timestamp
        );
    }
}
