//! Metric Recording Errors
//!
//! Every failure is surfaced to the caller of the recording or flush
//! operation. Nothing here is retried internally.

use rust_decimal::Decimal;

/// Tag collection contained the same tag more than once.
///
/// Raised before any aggregation state is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTagsError {
    /// Tags exactly as supplied, with default tags appended
    pub tags: Vec<String>,
    /// Each tag that appeared more than once, in first-seen order
    pub duplicates: Vec<String>,
}

impl std::fmt::Display for InvalidTagsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid tags {:?}: duplicate entries {:?}",
            self.tags, self.duplicates
        )
    }
}

impl std::error::Error for InvalidTagsError {}

/// Counter merge that overflowed even after coercing to decimal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArithmeticError {
    pub current: String,
    pub increment: String,
}

impl ArithmeticError {
    pub(crate) fn overflow(current: impl ToString, increment: impl ToString) -> Self {
        ArithmeticError {
            current: current.to_string(),
            increment: increment.to_string(),
        }
    }

    pub(crate) fn out_of_range(value: impl ToString) -> Self {
        ArithmeticError {
            current: Decimal::ZERO.to_string(),
            increment: value.to_string(),
        }
    }
}

impl std::fmt::Display for ArithmeticError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Arithmetic overflow: cannot add {} to {}",
            self.increment, self.current
        )
    }
}

impl std::error::Error for ArithmeticError {}

/// Error type for all metric operations
#[derive(Debug)]
pub enum MetricsError {
    /// Duplicate tags supplied by the caller
    InvalidTags(InvalidTagsError),
    /// Counter accumulation overflowed
    Arithmetic(ArithmeticError),
    /// NaN or infinite float offered as a metric value
    NonFinite(f64),
    /// Writing an emitted line failed
    Io(std::io::Error),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::InvalidTags(e) => write!(f, "{}", e),
            MetricsError::Arithmetic(e) => write!(f, "{}", e),
            MetricsError::NonFinite(v) => write!(f, "Metric value is not finite: {}", v),
            MetricsError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for MetricsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetricsError::InvalidTags(e) => Some(e),
            MetricsError::Arithmetic(e) => Some(e),
            MetricsError::NonFinite(_) => None,
            MetricsError::Io(e) => Some(e),
        }
    }
}

impl From<InvalidTagsError> for MetricsError {
    fn from(e: InvalidTagsError) -> Self {
        MetricsError::InvalidTags(e)
    }
}

impl From<ArithmeticError> for MetricsError {
    fn from(e: ArithmeticError) -> Self {
        MetricsError::Arithmetic(e)
    }
}

impl From<std::io::Error> for MetricsError {
    fn from(e: std::io::Error) -> Self {
        MetricsError::Io(e)
    }
}
