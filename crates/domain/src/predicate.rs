use std::fmt::{Display, Formatter};

use retentor_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Token in a predicate template that stands for the retention age in days.
///
/// The spelling matches the column naming of existing configuration tables.
pub const RETENTION_PLACEHOLDER: &str = "RETENSION";

/// Retention window in whole days.
///
/// Only ever built from a `u32` or from a plain run of ASCII digits, so its
/// rendered form can be spliced into SQL without quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetentionDays(u32);

impl RetentionDays {
    /// Creates a retention window from a day count.
    #[must_use]
    pub fn new(days: u32) -> Self {
        Self(days)
    }

    /// Parses a raw stored value, accepting only plain decimal digits.
    pub fn parse(value: &str) -> AppResult<Self> {
        if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(AppError::Validation(format!(
                "retention days must be a plain non-negative integer, got '{value}'"
            )));
        }

        value.parse::<u32>().map(Self).map_err(|error| {
            AppError::Validation(format!("retention days '{value}' is out of range: {error}"))
        })
    }
}

impl Display for RetentionDays {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Operator-authored WHERE fragment with exactly one retention placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateTemplate(String);

impl PredicateTemplate {
    /// Validates a template, requiring exactly one placeholder occurrence.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "predicate template must not be empty".to_owned(),
            ));
        }

        let occurrences = trimmed.matches(RETENTION_PLACEHOLDER).count();
        if occurrences != 1 {
            return Err(AppError::Validation(format!(
                "predicate template must contain exactly one '{RETENTION_PLACEHOLDER}' placeholder, found {occurrences}"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Substitutes the placeholder with the retention window.
    #[must_use]
    pub fn materialize(&self, retention_days: RetentionDays) -> String {
        self.0
            .replacen(RETENTION_PLACEHOLDER, retention_days.to_string().as_str(), 1)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{PredicateTemplate, RETENTION_PLACEHOLDER, RetentionDays};

    #[test]
    fn template_materializes_retention_days() {
        let template = PredicateTemplate::new("created_at < NOW() - INTERVAL RETENSION DAY");
        assert!(template.is_ok());
        let template = template.unwrap_or_else(|_| unreachable!());

        assert_eq!(
            template.materialize(RetentionDays::new(30)),
            "created_at < NOW() - INTERVAL 30 DAY"
        );
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        assert!(PredicateTemplate::new("created_at < NOW() - INTERVAL 30 DAY").is_err());
    }

    #[test]
    fn template_with_two_placeholders_is_rejected() {
        let template = PredicateTemplate::new(
            "created_at < NOW() - INTERVAL RETENSION DAY OR updated_at < NOW() - INTERVAL RETENSION DAY",
        );
        assert!(template.is_err());
    }

    #[test]
    fn retention_days_rejects_signs_and_whitespace() {
        for raw in ["", "-1", "+5", " 5", "5 ", "3.5", "30; DROP TABLE t", "1e3"] {
            assert!(RetentionDays::parse(raw).is_err(), "accepted '{raw}'");
        }
    }

    #[test]
    fn retention_days_rejects_overflow() {
        assert!(RetentionDays::parse("99999999999").is_err());
    }

    proptest! {
        #[test]
        fn materialized_predicate_contains_only_the_day_count(
            prefix in "[a-z_ <()-]{0,24}",
            suffix in "[a-z_ <()-]{0,24}",
            days in any::<u32>(),
        ) {
            let raw = format!("{prefix}{RETENTION_PLACEHOLDER}{suffix}");
            let template = PredicateTemplate::new(raw.as_str());
            prop_assume!(template.is_ok());
            let template = template.unwrap_or_else(|_| unreachable!());

            let materialized = template.materialize(RetentionDays::new(days));
            prop_assert!(!materialized.contains(RETENTION_PLACEHOLDER));
            prop_assert_eq!(materialized, raw.trim().replace(RETENTION_PLACEHOLDER, days.to_string().as_str()));
        }

        #[test]
        fn digit_strings_parse_to_their_value(days in any::<u32>()) {
            let parsed = RetentionDays::parse(days.to_string().as_str());
            prop_assert_eq!(parsed.ok(), Some(RetentionDays::new(days)));
        }
    }
}
