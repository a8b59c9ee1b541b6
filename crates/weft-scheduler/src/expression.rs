//! Cron expression parsing.

use std::str::FromStr;

use cron::Schedule;

use crate::error::SchedulerError;

/// Parse a standard 5- or 6-field cron expression.
///
/// The `cron` crate expects a seconds field; 5-field expressions are
/// normalised by prepending `0`.
pub fn parse_expression(expression: &str) -> Result<Schedule, SchedulerError> {
  let fields = expression.split_whitespace().count();
  let normalised = if fields == 5 {
    format!("0 {expression}")
  } else {
    expression.to_string()
  };

  Schedule::from_str(&normalised).map_err(|e| SchedulerError::InvalidCronExpression {
    expression: expression.to_string(),
    message: e.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn five_field_expressions_are_normalised() {
    // Fires at second 0 of every minute.
    let schedule = parse_expression("* * * * *").unwrap();
    let next = schedule.upcoming(chrono::Utc).next().unwrap();
    assert_eq!(next.timestamp() % 60, 0);
  }

  #[test]
  fn six_field_expressions_pass_through() {
    assert!(parse_expression("*/5 * * * * *").is_ok());
  }

  #[test]
  fn garbage_is_rejected() {
    let err = parse_expression("not a cron").unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidCronExpression { .. }));
  }
}
