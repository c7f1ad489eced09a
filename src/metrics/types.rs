//! Core metric types for the aggregation engine

use super::error::{ArithmeticError, MetricsError};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

/// Kind of metric being emitted; determines the merge rule of its bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    /// Summed occurrences since the last flush
    Count,
    /// Last value set wins
    Gauge,
    /// Every sample since the last flush
    Histogram,
    /// Distinct members seen since the last flush
    Set,
}

impl MetricKind {
    /// Order in which a flush walks the buckets
    pub const FLUSH_ORDER: [MetricKind; 4] = [
        MetricKind::Count,
        MetricKind::Gauge,
        MetricKind::Set,
        MetricKind::Histogram,
    ];

    /// Name used in the emitted line
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Count => "count",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Set => "set",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(MetricKind::Count),
            "gauge" => Ok(MetricKind::Gauge),
            "histogram" => Ok(MetricKind::Histogram),
            "set" => Ok(MetricKind::Set),
            other => Err(format!("Unknown metric kind: {}", other)),
        }
    }
}

/// Numeric metric value.
///
/// Whole counts stay integral until they meet a fractional value (or
/// overflow `i64`), after which the accumulator is a decimal. The textual
/// form is the value's own stringification, so `2.25 + -1.25` prints `1.00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Number {
    Int(i64),
    Decimal(Decimal),
}

impl Number {
    pub const ZERO: Number = Number::Int(0);

    /// Add two values, promoting to decimal when the integer sum overflows
    pub fn checked_add(self, other: Number) -> Result<Number, ArithmeticError> {
        if let (Number::Int(a), Number::Int(b)) = (self, other) {
            if let Some(sum) = a.checked_add(b) {
                return Ok(Number::Int(sum));
            }
        }

        self.to_decimal()
            .checked_add(other.to_decimal())
            .map(Number::Decimal)
            .ok_or_else(|| ArithmeticError::overflow(self, other))
    }

    /// Widen to decimal
    pub fn to_decimal(self) -> Decimal {
        match self {
            Number::Int(i) => Decimal::from(i),
            Number::Decimal(d) => d,
        }
    }

    /// Duration in seconds, trailing zeros trimmed (`100ms` -> `0.1`)
    pub fn from_duration(duration: Duration) -> Result<Number, MetricsError> {
        let nanos = i128::try_from(duration.as_nanos())
            .map_err(|_| ArithmeticError::out_of_range(format!("{:?}", duration)))?;
        let seconds = Decimal::try_from_i128_with_scale(nanos, 9)
            .map_err(|_| ArithmeticError::out_of_range(format!("{:?}", duration)))?;
        Ok(Number::Decimal(seconds.normalize()))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Number::Int(_))
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::ZERO
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Decimal(d) => write!(f, "{}", d),
        }
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Number::Int(v)
    }
}

impl From<i32> for Number {
    fn from(v: i32) -> Self {
        Number::Int(i64::from(v))
    }
}

impl From<u32> for Number {
    fn from(v: u32) -> Self {
        Number::Int(i64::from(v))
    }
}

impl From<u64> for Number {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Number::Int(i),
            Err(_) => Number::Decimal(Decimal::from(v)),
        }
    }
}

impl From<Decimal> for Number {
    fn from(v: Decimal) -> Self {
        Number::Decimal(v)
    }
}

impl TryFrom<f64> for Number {
    type Error = MetricsError;

    fn try_from(v: f64) -> Result<Self, Self::Error> {
        if !v.is_finite() {
            return Err(MetricsError::NonFinite(v));
        }
        Decimal::try_from(v)
            .map(Number::Decimal)
            .map_err(|_| ArithmeticError::out_of_range(v).into())
    }
}

impl FromStr for Number {
    type Err = rust_decimal::Error;

    /// Integers parse as `Int`; anything else must be a decimal literal
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Number::Int(i));
        }
        Decimal::from_str(s).map(Number::Decimal)
    }
}

/// Order-independent identity of a bucket's tags.
///
/// Stored sorted so two collections with the same members in a different
/// order compare and hash equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagSet {
    tags: BTreeSet<String>,
}

impl TagSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<String> for TagSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        TagSet {
            tags: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for TagSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_names() {
        assert_eq!(MetricKind::Count.as_str(), "count");
        assert_eq!(MetricKind::Histogram.to_string(), "histogram");
        assert_eq!("set".parse::<MetricKind>(), Ok(MetricKind::Set));
        assert!("timer".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_int_sum_stays_integral() {
        let sum = Number::Int(5).checked_add(Number::Int(4)).unwrap();
        assert_eq!(sum, Number::Int(9));
        assert_eq!(sum.to_string(), "9");
    }

    #[test]
    fn test_decimal_sum_keeps_scale() {
        let sum = Number::from(dec!(2.25))
            .checked_add(Number::from(dec!(-1.25)))
            .unwrap();
        assert_eq!(sum.to_string(), "1.00");
    }

    #[test]
    fn test_int_promoted_by_decimal() {
        let sum = Number::Int(5).checked_add(Number::from(dec!(-1.25))).unwrap();
        assert!(!sum.is_integer());
        assert_eq!(sum.to_string(), "3.75");
    }

    #[test]
    fn test_int_overflow_retries_as_decimal() {
        let sum = Number::Int(i64::MAX).checked_add(Number::Int(1)).unwrap();
        assert_eq!(sum.to_string(), "9223372036854775808");
    }

    #[test]
    fn test_decimal_overflow_is_error() {
        let err = Number::from(Decimal::MAX)
            .checked_add(Number::from(Decimal::MAX))
            .unwrap_err();
        assert!(err.to_string().contains("Arithmetic overflow"));
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(Number::try_from(75.5).unwrap().to_string(), "75.5");
        assert!(matches!(
            Number::try_from(f64::NAN),
            Err(MetricsError::NonFinite(_))
        ));
        assert!(Number::try_from(f64::INFINITY).is_err());
    }

    #[test]
    fn test_from_duration_seconds() {
        let n = Number::from_duration(Duration::from_millis(100)).unwrap();
        assert_eq!(n.to_string(), "0.1");
        let n = Number::from_duration(Duration::from_secs(3)).unwrap();
        assert_eq!(n.to_string(), "3");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!("12".parse::<Number>().unwrap(), Number::Int(12));
        assert_eq!("1.50".parse::<Number>().unwrap().to_string(), "1.50");
        assert!("abc".parse::<Number>().is_err());
    }

    #[test]
    fn test_tag_set_order_independent() {
        let a: TagSet = ["a", "b"].into_iter().collect();
        let b: TagSet = ["b", "a"].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert!(a.contains("a"));
        assert!(TagSet::empty().is_empty());
    }
}
