//! Scalar functions.
//!
//! Functions return `Err(message)` for runtime type problems (an argument
//! that does not coerce, a domain error, overflow); the evaluator turns that
//! into a null result plus a runtime warning.

use super::Arity;
use crate::value::{DataType, Value};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use std::cmp::Ordering;
use std::fmt::Write as _;

/// Built-in scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ScalarFunction {
    Upper,
    Lower,
    Length,
    Trim,
    Ltrim,
    Rtrim,
    Substr,
    Replace,
    Concat,
    Strcat,
    IndexOf,
    ExtractToken,
    Left,
    Right,
    Reverse,
    StartsWith,
    EndsWith,
    Contains,
    Abs,
    Round,
    Floor,
    Ceil,
    Sqrt,
    Power,
    Mod,
    Ln,
    Log10,
    Exp,
    Sign,
    Now,
    ToTimestamp,
    Strftime,
    DatePart,
    DateTrunc,
    Quantize,
    DateAdd,
    DateDiff,
    Coalesce,
    NullIf,
    IfNull,
    Iif,
    Greatest,
    Least,
}

type EvalResult = Result<Value, String>;

impl ScalarFunction {
    /// Resolves an upper-case function name, including aliases.
    #[must_use]
    pub fn from_name(upper: &str) -> Option<Self> {
        let f = match upper {
            "UPPER" | "TO_UPPERCASE" => Self::Upper,
            "LOWER" | "TO_LOWERCASE" => Self::Lower,
            "LENGTH" | "STRLEN" => Self::Length,
            "TRIM" => Self::Trim,
            "LTRIM" => Self::Ltrim,
            "RTRIM" => Self::Rtrim,
            "SUBSTR" | "SUBSTRING" => Self::Substr,
            "REPLACE" | "REPLACE_STR" => Self::Replace,
            "CONCAT" => Self::Concat,
            "STRCAT" => Self::Strcat,
            "INDEX_OF" => Self::IndexOf,
            "EXTRACT_TOKEN" => Self::ExtractToken,
            "LEFT" => Self::Left,
            "RIGHT" => Self::Right,
            "REVERSE" | "STRREV" => Self::Reverse,
            "STARTS_WITH" => Self::StartsWith,
            "ENDS_WITH" => Self::EndsWith,
            "CONTAINS" => Self::Contains,
            "ABS" => Self::Abs,
            "ROUND" => Self::Round,
            "FLOOR" => Self::Floor,
            "CEIL" | "CEILING" => Self::Ceil,
            "SQRT" => Self::Sqrt,
            "POWER" | "POW" => Self::Power,
            "MOD" => Self::Mod,
            "LN" => Self::Ln,
            "LOG10" => Self::Log10,
            "EXP" => Self::Exp,
            "SIGN" => Self::Sign,
            "NOW" | "SYSTEM_TIMESTAMP" => Self::Now,
            "TO_TIMESTAMP" => Self::ToTimestamp,
            "STRFTIME" | "TO_STRING" => Self::Strftime,
            "DATE_PART" => Self::DatePart,
            "DATE_TRUNC" => Self::DateTrunc,
            "QUANTIZE" => Self::Quantize,
            "DATE_ADD" => Self::DateAdd,
            "DATE_DIFF" => Self::DateDiff,
            "COALESCE" => Self::Coalesce,
            "NULLIF" => Self::NullIf,
            "IFNULL" | "NVL" => Self::IfNull,
            "IIF" => Self::Iif,
            "GREATEST" => Self::Greatest,
            "LEAST" => Self::Least,
            _ => return None,
        };
        Some(f)
    }

    /// Canonical name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Upper => "UPPER",
            Self::Lower => "LOWER",
            Self::Length => "LENGTH",
            Self::Trim => "TRIM",
            Self::Ltrim => "LTRIM",
            Self::Rtrim => "RTRIM",
            Self::Substr => "SUBSTR",
            Self::Replace => "REPLACE",
            Self::Concat => "CONCAT",
            Self::Strcat => "STRCAT",
            Self::IndexOf => "INDEX_OF",
            Self::ExtractToken => "EXTRACT_TOKEN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Reverse => "REVERSE",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::Contains => "CONTAINS",
            Self::Abs => "ABS",
            Self::Round => "ROUND",
            Self::Floor => "FLOOR",
            Self::Ceil => "CEIL",
            Self::Sqrt => "SQRT",
            Self::Power => "POWER",
            Self::Mod => "MOD",
            Self::Ln => "LN",
            Self::Log10 => "LOG10",
            Self::Exp => "EXP",
            Self::Sign => "SIGN",
            Self::Now => "NOW",
            Self::ToTimestamp => "TO_TIMESTAMP",
            Self::Strftime => "STRFTIME",
            Self::DatePart => "DATE_PART",
            Self::DateTrunc => "DATE_TRUNC",
            Self::Quantize => "QUANTIZE",
            Self::DateAdd => "DATE_ADD",
            Self::DateDiff => "DATE_DIFF",
            Self::Coalesce => "COALESCE",
            Self::NullIf => "NULLIF",
            Self::IfNull => "IFNULL",
            Self::Iif => "IIF",
            Self::Greatest => "GREATEST",
            Self::Least => "LEAST",
        }
    }

    /// Accepted argument counts.
    #[must_use]
    pub fn arity(self) -> Arity {
        match self {
            Self::Now => Arity::exact(0),
            Self::Upper
            | Self::Lower
            | Self::Length
            | Self::Trim
            | Self::Ltrim
            | Self::Rtrim
            | Self::Reverse
            | Self::Abs
            | Self::Floor
            | Self::Ceil
            | Self::Sqrt
            | Self::Ln
            | Self::Log10
            | Self::Exp
            | Self::Sign => Arity::exact(1),
            Self::Round | Self::ToTimestamp => Arity::range(1, 2),
            Self::Strcat
            | Self::IndexOf
            | Self::Left
            | Self::Right
            | Self::StartsWith
            | Self::EndsWith
            | Self::Contains
            | Self::Power
            | Self::Mod
            | Self::Strftime
            | Self::DatePart
            | Self::DateTrunc
            | Self::Quantize
            | Self::DateAdd
            | Self::DateDiff
            | Self::NullIf
            | Self::IfNull => Arity::exact(2),
            Self::Substr | Self::ExtractToken => Arity::range(2, 3),
            Self::Replace | Self::Iif => Arity::exact(3),
            Self::Concat | Self::Coalesce | Self::Greatest | Self::Least => Arity::range(1, 16),
        }
    }

    /// Result type given the argument types.
    #[must_use]
    pub fn return_type(self, args: &[DataType]) -> DataType {
        let first = args.first().copied().unwrap_or(DataType::Dynamic);
        match self {
            Self::Upper
            | Self::Lower
            | Self::Trim
            | Self::Ltrim
            | Self::Rtrim
            | Self::Substr
            | Self::Replace
            | Self::Concat
            | Self::Strcat
            | Self::ExtractToken
            | Self::Left
            | Self::Right
            | Self::Reverse
            | Self::Strftime => DataType::String,
            Self::Length | Self::IndexOf | Self::Sign | Self::DatePart => DataType::Integer,
            Self::StartsWith | Self::EndsWith | Self::Contains => DataType::Boolean,
            Self::Abs | Self::Round | Self::Floor | Self::Ceil | Self::Mod | Self::Quantize => {
                match first {
                    DataType::Integer | DataType::Float | DataType::Timestamp | DataType::Dynamic => {
                        first
                    }
                    _ => DataType::Float,
                }
            }
            Self::Sqrt | Self::Power | Self::Ln | Self::Log10 | Self::Exp | Self::DateDiff => {
                DataType::Float
            }
            Self::Now | Self::ToTimestamp | Self::DateTrunc | Self::DateAdd => DataType::Timestamp,
            Self::Coalesce | Self::IfNull | Self::NullIf | Self::Greatest | Self::Least => {
                common_type(args)
            }
            Self::Iif => common_type(args.get(1..).unwrap_or_default()),
        }
    }

    fn handles_nulls(self) -> bool {
        matches!(
            self,
            Self::Concat
                | Self::Strcat
                | Self::Coalesce
                | Self::NullIf
                | Self::IfNull
                | Self::Iif
                | Self::Greatest
                | Self::Least
        )
    }

    /// Evaluates the function.
    ///
    /// `now` is the query start time, so every `NOW()` in one query agrees.
    ///
    /// # Errors
    ///
    /// Returns a message describing a runtime type or domain error.
    pub fn eval(self, args: &[Value], now: DateTime<Utc>) -> EvalResult {
        if !self.handles_nulls() && args.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        match self {
            Self::Upper => Ok(Value::String(text(&args[0]).to_uppercase())),
            Self::Lower => Ok(Value::String(text(&args[0]).to_lowercase())),
            Self::Length => Ok(Value::Integer(count_chars(&text(&args[0])))),
            Self::Trim => Ok(Value::String(text(&args[0]).trim().to_string())),
            Self::Ltrim => Ok(Value::String(text(&args[0]).trim_start().to_string())),
            Self::Rtrim => Ok(Value::String(text(&args[0]).trim_end().to_string())),
            Self::Substr => substr(args),
            Self::Replace => {
                let (s, from, to) = (text(&args[0]), text(&args[1]), text(&args[2]));
                if from.is_empty() {
                    Ok(Value::String(s))
                } else {
                    Ok(Value::String(s.replace(&from, &to)))
                }
            }
            Self::Concat | Self::Strcat => Ok(Value::String(
                args.iter().filter_map(Value::to_text).collect(),
            )),
            Self::IndexOf => {
                let (s, needle) = (text(&args[0]), text(&args[1]));
                Ok(Value::Integer(
                    s.find(&needle)
                        .map_or(0, |byte| count_chars(&s[..byte]) + 1),
                ))
            }
            Self::ExtractToken => extract_token(args),
            Self::Left | Self::Right => {
                let s = text(&args[0]);
                let n = usize::try_from(int(&args[1])?)
                    .map_err(|_| format!("{} length must not be negative", self.name()))?;
                let total = s.chars().count();
                let out: String = if self == Self::Left {
                    s.chars().take(n).collect()
                } else {
                    s.chars().skip(total.saturating_sub(n)).collect()
                };
                Ok(Value::String(out))
            }
            Self::Reverse => Ok(Value::String(text(&args[0]).chars().rev().collect())),
            Self::StartsWith => Ok(Value::Boolean(text(&args[0]).starts_with(&text(&args[1])))),
            Self::EndsWith => Ok(Value::Boolean(text(&args[0]).ends_with(&text(&args[1])))),
            Self::Contains => Ok(Value::Boolean(text(&args[0]).contains(&text(&args[1])))),
            Self::Abs => match &args[0] {
                Value::Integer(i) => i
                    .checked_abs()
                    .map(Value::Integer)
                    .ok_or_else(|| "integer overflow in ABS".to_string()),
                other => Ok(Value::Float(num(other)?.abs())),
            },
            Self::Round => round(args),
            Self::Floor => match &args[0] {
                Value::Integer(i) => Ok(Value::Integer(*i)),
                other => Ok(Value::Float(num(other)?.floor())),
            },
            Self::Ceil => match &args[0] {
                Value::Integer(i) => Ok(Value::Integer(*i)),
                other => Ok(Value::Float(num(other)?.ceil())),
            },
            Self::Sqrt => {
                let x = num(&args[0])?;
                if x < 0.0 {
                    return Err("square root of a negative number".to_string());
                }
                Ok(Value::Float(x.sqrt()))
            }
            Self::Power => finite(num(&args[0])?.powf(num(&args[1])?), "POWER"),
            Self::Mod => modulo(&args[0], &args[1]),
            Self::Ln | Self::Log10 => {
                let x = num(&args[0])?;
                if x <= 0.0 {
                    return Err(format!("{} of a non-positive number", self.name()));
                }
                Ok(Value::Float(if self == Self::Ln { x.ln() } else { x.log10() }))
            }
            Self::Exp => finite(num(&args[0])?.exp(), "EXP"),
            Self::Sign => match &args[0] {
                Value::Integer(i) => Ok(Value::Integer(i.signum())),
                other => {
                    let x = num(other)?;
                    Ok(Value::Integer(match x.partial_cmp(&0.0) {
                        Some(Ordering::Greater) => 1,
                        Some(Ordering::Less) => -1,
                        _ => 0,
                    }))
                }
            },
            Self::Now => Ok(Value::Timestamp(now)),
            Self::ToTimestamp => to_timestamp(args),
            Self::Strftime => {
                let ts = timestamp(&args[0])?;
                let format = text(&args[1]);
                let mut out = String::new();
                write!(out, "{}", ts.format(&format))
                    .map_err(|_| format!("invalid format string '{format}'"))?;
                Ok(Value::String(out))
            }
            Self::DatePart => date_part(&text(&args[0]), timestamp(&args[1])?),
            Self::DateTrunc => date_trunc(&text(&args[0]), timestamp(&args[1])?),
            Self::Quantize => quantize(&args[0], &args[1]),
            Self::DateAdd => {
                let ts = timestamp(&args[0])?;
                let millis = (num(&args[1])? * 1000.0).round();
                TimeDelta::try_milliseconds(millis as i64)
                    .and_then(|delta| ts.checked_add_signed(delta))
                    .map(Value::Timestamp)
                    .ok_or_else(|| "timestamp out of range in DATE_ADD".to_string())
            }
            Self::DateDiff => {
                let (a, b) = (timestamp(&args[0])?, timestamp(&args[1])?);
                Ok(Value::Float((a - b).num_milliseconds() as f64 / 1000.0))
            }
            Self::Coalesce => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or_default()),
            Self::NullIf => {
                if args[0].sql_compare(&args[1]) == Some(Ordering::Equal) {
                    Ok(Value::Null)
                } else {
                    Ok(args[0].clone())
                }
            }
            Self::IfNull => Ok(if args[0].is_null() {
                args[1].clone()
            } else {
                args[0].clone()
            }),
            Self::Iif => Ok(if args[0].as_bool() == Some(true) {
                args[1].clone()
            } else {
                args[2].clone()
            }),
            Self::Greatest => extreme(args, Ordering::Greater),
            Self::Least => extreme(args, Ordering::Less),
        }
    }
}

fn common_type(args: &[DataType]) -> DataType {
    let mut known = args.iter().copied().filter(|t| *t != DataType::Dynamic);
    let Some(first) = known.next() else {
        return DataType::Dynamic;
    };
    known
        .try_fold(first, DataType::common_supertype)
        .unwrap_or(DataType::Dynamic)
}

fn text(value: &Value) -> String {
    value.to_text().unwrap_or_default()
}

fn count_chars(s: &str) -> i64 {
    i64::try_from(s.chars().count()).unwrap_or(i64::MAX)
}

fn int(value: &Value) -> Result<i64, String> {
    value
        .to_i64()
        .ok_or_else(|| format!("expected an integer, got '{value}'"))
}

fn num(value: &Value) -> Result<f64, String> {
    value
        .to_f64()
        .ok_or_else(|| format!("expected a number, got '{value}'"))
}

fn timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    value
        .to_timestamp()
        .ok_or_else(|| format!("expected a timestamp, got '{value}'"))
}

fn finite(x: f64, name: &str) -> EvalResult {
    if x.is_finite() {
        Ok(Value::Float(x))
    } else {
        Err(format!("{name} result out of range"))
    }
}

fn substr(args: &[Value]) -> EvalResult {
    let chars: Vec<char> = text(&args[0]).chars().collect();
    let start = int(&args[1])?;
    let length = match args.get(2) {
        Some(len) => {
            let len = int(len)?;
            if len < 0 {
                return Err("SUBSTR length must not be negative".to_string());
            }
            Some(len)
        }
        None => None,
    };
    let begin = start.saturating_sub(1);
    let end = length.map_or(i64::MAX, |len| begin.saturating_add(len));
    let total = i64::try_from(chars.len()).unwrap_or(i64::MAX);
    let (b, e) = (begin.clamp(0, total), end.clamp(0, total));
    if e <= b {
        return Ok(Value::String(String::new()));
    }
    // Both bounds are clamped to 0..=len.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(Value::String(chars[b as usize..e as usize].iter().collect()))
}

fn extract_token(args: &[Value]) -> EvalResult {
    let s = text(&args[0]);
    let index = int(&args[1])?;
    let separator = args.get(2).map_or_else(|| ",".to_string(), text);
    if separator.is_empty() {
        return Err("EXTRACT_TOKEN separator must not be empty".to_string());
    }
    let Ok(index) = usize::try_from(index) else {
        return Ok(Value::Null);
    };
    Ok(s.split(separator.as_str())
        .nth(index)
        .map_or(Value::Null, |token| Value::String(token.to_string())))
}

fn round(args: &[Value]) -> EvalResult {
    let digits = match args.get(1) {
        // Past 10^400 every f64 rounds to itself or to zero.
        Some(d) => i32::try_from(int(d)?.clamp(-400, 400)).unwrap_or_default(),
        None => 0,
    };
    match &args[0] {
        Value::Integer(i) if digits >= 0 => Ok(Value::Integer(*i)),
        Value::Integer(i) => {
            let p = 10f64.powi(-digits);
            // Rounding to a power of ten beyond f64 range leaves nothing.
            #[allow(clippy::cast_precision_loss)]
            let rounded = if p.is_finite() {
                (*i as f64 / p).round() * p
            } else {
                0.0
            };
            #[allow(clippy::cast_precision_loss)]
            let (min, max) = (i64::MIN as f64, i64::MAX as f64);
            if rounded >= max || rounded < min {
                return Err("integer overflow in ROUND".to_string());
            }
            #[allow(clippy::cast_possible_truncation)]
            Ok(Value::Integer(rounded as i64))
        }
        other => {
            let x = num(other)?;
            let p = 10f64.powi(digits);
            if p == 0.0 {
                return Ok(Value::Float(0.0_f64.copysign(x)));
            }
            let scaled = x * p;
            if !scaled.is_finite() {
                // Finer than f64 can represent: already exact.
                return Ok(Value::Float(x));
            }
            Ok(Value::Float(scaled.round() / p))
        }
    }
}

fn modulo(a: &Value, b: &Value) -> EvalResult {
    if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
        if *y == 0 {
            return Err("division by zero".to_string());
        }
        return x
            .checked_rem(*y)
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow in MOD".to_string());
    }
    let (x, y) = (num(a)?, num(b)?);
    if y == 0.0 {
        return Err("division by zero".to_string());
    }
    Ok(Value::Float(x % y))
}

fn to_timestamp(args: &[Value]) -> EvalResult {
    let Some(format) = args.get(1) else {
        return timestamp(&args[0]).map(Value::Timestamp);
    };
    let (s, format) = (text(&args[0]), text(format));
    if let Ok(naive) = NaiveDateTime::parse_from_str(&s, &format) {
        return Ok(Value::Timestamp(naive.and_utc()));
    }
    if let Ok(ts) = DateTime::parse_from_str(&s, &format) {
        return Ok(Value::Timestamp(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(&s, &format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Value::Timestamp(naive.and_utc()))
        .ok_or_else(|| format!("'{s}' does not match format '{format}'"))
}

fn date_part(part: &str, ts: DateTime<Utc>) -> EvalResult {
    let value = match part.to_ascii_lowercase().as_str() {
        "year" => i64::from(ts.year()),
        "quarter" => i64::from((ts.month() - 1) / 3 + 1),
        "month" => i64::from(ts.month()),
        "week" => i64::from(ts.iso_week().week()),
        "day" => i64::from(ts.day()),
        "dow" => i64::from(ts.weekday().num_days_from_sunday()),
        "doy" => i64::from(ts.ordinal()),
        "hour" => i64::from(ts.hour()),
        "minute" => i64::from(ts.minute()),
        "second" => i64::from(ts.second()),
        "millisecond" => i64::from(ts.timestamp_subsec_millis()),
        "epoch" => ts.timestamp(),
        other => return Err(format!("unknown date part '{other}'")),
    };
    Ok(Value::Integer(value))
}

fn date_trunc(part: &str, ts: DateTime<Utc>) -> EvalResult {
    let date = ts.date_naive();
    let truncated = match part.to_ascii_lowercase().as_str() {
        "year" => NaiveDate::from_ymd_opt(ts.year(), 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        "month" => {
            NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        "week" => date
            .checked_sub_days(chrono::Days::new(u64::from(
                ts.weekday().num_days_from_monday(),
            )))
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        "day" => date.and_hms_opt(0, 0, 0),
        "hour" => date.and_hms_opt(ts.hour(), 0, 0),
        "minute" => date.and_hms_opt(ts.hour(), ts.minute(), 0),
        "second" => date.and_hms_opt(ts.hour(), ts.minute(), ts.second()),
        other => return Err(format!("unknown date part '{other}'")),
    };
    truncated
        .map(|naive| Value::Timestamp(naive.and_utc()))
        .ok_or_else(|| "timestamp out of range in DATE_TRUNC".to_string())
}

fn quantize(value: &Value, step: &Value) -> EvalResult {
    match (value, step) {
        (Value::Timestamp(ts), step) => {
            let step_ms = (num(step)? * 1000.0).round();
            if step_ms < 1.0 {
                return Err("QUANTIZE step must be positive".to_string());
            }
            #[allow(clippy::cast_possible_truncation)]
            let step_ms = step_ms as i64;
            let floored = ts
                .timestamp_millis()
                .div_euclid(step_ms)
                .checked_mul(step_ms)
                .ok_or_else(|| "timestamp out of range in QUANTIZE".to_string())?;
            DateTime::from_timestamp_millis(floored)
                .map(Value::Timestamp)
                .ok_or_else(|| "timestamp out of range in QUANTIZE".to_string())
        }
        (Value::Integer(x), Value::Integer(n)) => {
            if *n <= 0 {
                return Err("QUANTIZE step must be positive".to_string());
            }
            x.div_euclid(*n)
                .checked_mul(*n)
                .map(Value::Integer)
                .ok_or_else(|| "integer overflow in QUANTIZE".to_string())
        }
        (x, n) => {
            let (x, n) = (num(x)?, num(n)?);
            if n <= 0.0 {
                return Err("QUANTIZE step must be positive".to_string());
            }
            Ok(Value::Float((x / n).floor() * n))
        }
    }
}

fn extreme(args: &[Value], wanted: Ordering) -> EvalResult {
    let mut best: Option<&Value> = None;
    for value in args.iter().filter(|v| !v.is_null()) {
        best = match best {
            None => Some(value),
            Some(current) => match value.sql_compare(current) {
                Some(ord) if ord == wanted => Some(value),
                Some(_) => Some(current),
                None => return Err(format!("cannot compare '{value}' with '{current}'")),
            },
        };
    }
    Ok(best.cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn call(f: ScalarFunction, args: &[Value]) -> EvalResult {
        f.eval(args, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call(ScalarFunction::Upper, &[s("abc")]), Ok(s("ABC")));
        assert_eq!(call(ScalarFunction::Length, &[s("héllo")]), Ok(Value::Integer(5)));
        assert_eq!(
            call(ScalarFunction::Substr, &[s("hello"), Value::Integer(2), Value::Integer(3)]),
            Ok(s("ell"))
        );
        assert_eq!(
            call(ScalarFunction::Substr, &[s("hello"), Value::Integer(0), Value::Integer(2)]),
            Ok(s("h"))
        );
        assert_eq!(
            call(ScalarFunction::Substr, &[s("hello"), Value::Integer(4)]),
            Ok(s("lo"))
        );
        assert_eq!(
            call(ScalarFunction::IndexOf, &[s("abcabc"), s("ca")]),
            Ok(Value::Integer(3))
        );
        assert_eq!(
            call(ScalarFunction::IndexOf, &[s("abc"), s("z")]),
            Ok(Value::Integer(0))
        );
        assert_eq!(
            call(ScalarFunction::Right, &[s("hello"), Value::Integer(3)]),
            Ok(s("llo"))
        );
        assert_eq!(
            call(ScalarFunction::Replace, &[s("a-b-c"), s("-"), s("+")]),
            Ok(s("a+b+c"))
        );
    }

    #[test]
    fn test_null_propagation() {
        assert_eq!(call(ScalarFunction::Upper, &[Value::Null]), Ok(Value::Null));
        assert_eq!(
            call(ScalarFunction::Concat, &[s("a"), Value::Null, Value::Integer(1)]),
            Ok(s("a1"))
        );
        assert_eq!(
            call(ScalarFunction::Coalesce, &[Value::Null, Value::Integer(2)]),
            Ok(Value::Integer(2))
        );
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(
            call(ScalarFunction::ExtractToken, &[s("a,b,c"), Value::Integer(1)]),
            Ok(s("b"))
        );
        assert_eq!(
            call(ScalarFunction::ExtractToken, &[s("a b"), Value::Integer(0), s(" ")]),
            Ok(s("a"))
        );
        assert_eq!(
            call(ScalarFunction::ExtractToken, &[s("a,b"), Value::Integer(5)]),
            Ok(Value::Null)
        );
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(
            call(ScalarFunction::Round, &[Value::Float(2.345), Value::Integer(2)]),
            Ok(Value::Float(2.35))
        );
        assert_eq!(
            call(ScalarFunction::Round, &[Value::Float(-2.5)]),
            Ok(Value::Float(-3.0))
        );
        assert_eq!(
            call(ScalarFunction::Mod, &[Value::Integer(7), Value::Integer(3)]),
            Ok(Value::Integer(1))
        );
        assert!(call(ScalarFunction::Mod, &[Value::Integer(7), Value::Integer(0)]).is_err());
        assert!(call(ScalarFunction::Sqrt, &[Value::Integer(-1)]).is_err());
        assert!(call(ScalarFunction::Abs, &[Value::Integer(i64::MIN)]).is_err());
        assert_eq!(call(ScalarFunction::Abs, &[s("-3.5")]), Ok(Value::Float(3.5)));
        assert!(call(ScalarFunction::Abs, &[s("abc")]).is_err());
    }

    #[test]
    fn test_round_with_extreme_digits() {
        assert_eq!(
            call(ScalarFunction::Round, &[Value::Float(1.23456), Value::Integer(400)]),
            Ok(Value::Float(1.23456))
        );
        assert_eq!(
            call(ScalarFunction::Round, &[Value::Float(1.5), Value::Integer(-400)]),
            Ok(Value::Float(0.0))
        );
        assert_eq!(
            call(ScalarFunction::Round, &[Value::Integer(1234), Value::Integer(-2)]),
            Ok(Value::Integer(1200))
        );
        assert_eq!(
            call(ScalarFunction::Round, &[Value::Integer(1234), Value::Integer(-400)]),
            Ok(Value::Integer(0))
        );
        assert!(call(ScalarFunction::Round, &[Value::Integer(i64::MAX), Value::Integer(-19)]).is_err());
        assert_eq!(
            call(ScalarFunction::Round, &[Value::Float(2.5), Value::Integer(i64::MIN)]),
            Ok(Value::Float(0.0))
        );
    }

    #[test]
    fn test_quantize_overflow_is_an_error() {
        assert_eq!(
            call(ScalarFunction::Quantize, &[Value::Integer(17), Value::Integer(5)]),
            Ok(Value::Integer(15))
        );
        assert_eq!(
            call(ScalarFunction::Quantize, &[Value::Integer(-3), Value::Integer(5)]),
            Ok(Value::Integer(-5))
        );
        assert_eq!(
            call(ScalarFunction::Quantize, &[Value::Integer(i64::MIN), Value::Integer(7)]),
            Err("integer overflow in QUANTIZE".to_string())
        );
    }

    #[test]
    fn test_date_functions() {
        let ts = Value::Timestamp(Utc.with_ymd_and_hms(2024, 3, 15, 13, 47, 12).unwrap());
        assert_eq!(
            call(ScalarFunction::DatePart, &[s("hour"), ts.clone()]),
            Ok(Value::Integer(13))
        );
        assert_eq!(
            call(ScalarFunction::DatePart, &[s("dow"), ts.clone()]),
            Ok(Value::Integer(5))
        );
        assert_eq!(
            call(ScalarFunction::DateTrunc, &[s("hour"), ts.clone()]),
            Ok(Value::Timestamp(
                Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap()
            ))
        );
        assert_eq!(
            call(ScalarFunction::Quantize, &[ts.clone(), Value::Integer(600)]),
            Ok(Value::Timestamp(
                Utc.with_ymd_and_hms(2024, 3, 15, 13, 40, 0).unwrap()
            ))
        );
        assert_eq!(
            call(ScalarFunction::Strftime, &[ts.clone(), s("%Y/%m/%d")]),
            Ok(s("2024/03/15"))
        );
        assert!(call(ScalarFunction::Strftime, &[ts.clone(), s("%Q")]).is_err());
        assert_eq!(
            call(
                ScalarFunction::DateDiff,
                &[ts.clone(), s("2024-03-15 13:47:00")]
            ),
            Ok(Value::Float(12.0))
        );
        assert_eq!(
            call(ScalarFunction::ToTimestamp, &[s("15/03/2024"), s("%d/%m/%Y")]),
            Ok(Value::Timestamp(
                Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
            ))
        );
        assert_eq!(
            call(ScalarFunction::Now, &[]),
            Ok(Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_quantize_numbers() {
        assert_eq!(
            call(ScalarFunction::Quantize, &[Value::Integer(17), Value::Integer(5)]),
            Ok(Value::Integer(15))
        );
        assert_eq!(
            call(ScalarFunction::Quantize, &[Value::Float(1.7), Value::Float(0.5)]),
            Ok(Value::Float(1.5))
        );
    }

    #[test]
    fn test_conditional_functions() {
        assert_eq!(
            call(ScalarFunction::Iif, &[Value::Boolean(false), s("a"), s("b")]),
            Ok(s("b"))
        );
        assert_eq!(
            call(ScalarFunction::NullIf, &[Value::Integer(1), Value::Float(1.0)]),
            Ok(Value::Null)
        );
        assert_eq!(
            call(
                ScalarFunction::Greatest,
                &[Value::Integer(1), Value::Null, Value::Float(2.5)]
            ),
            Ok(Value::Float(2.5))
        );
        assert!(call(ScalarFunction::Least, &[Value::Integer(1), Value::Boolean(true)]).is_err());
    }

    #[test]
    fn test_return_types() {
        assert_eq!(
            ScalarFunction::Abs.return_type(&[DataType::Integer]),
            DataType::Integer
        );
        assert_eq!(
            ScalarFunction::Coalesce.return_type(&[DataType::Integer, DataType::Float]),
            DataType::Float
        );
        assert_eq!(
            ScalarFunction::Iif.return_type(&[DataType::Boolean, DataType::String, DataType::Dynamic]),
            DataType::String
        );
    }
}
