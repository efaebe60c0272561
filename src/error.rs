use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// A `new_cases` value that is missing or not a finite number.
    #[error("invalid new cases at index {index} ({date}): {reason}")]
    InvalidInput {
        index: usize,
        date: NaiveDate,
        reason: &'static str,
    },
}
