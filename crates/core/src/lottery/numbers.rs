//! Validation of submitted number selections, identity numbers and draw payloads.
//!
//! Checks run in a fixed order: every token must be a whole number, every
//! value must lie in `LOWEST..=HIGHEST`, duplicates collapse, and only then
//! is the count of distinct values checked against `MIN_PICKS..=MAX_PICKS`.
//! So `"1,1,2,3,4,5"` is rejected for having five distinct numbers.

use std::collections::BTreeSet;
use std::num::IntErrorKind;

use serde::Deserialize;
use thiserror::Error;

pub const MIN_PICKS: usize = 6;
pub const MAX_PICKS: usize = 10;
pub const LOWEST: i64 = 1;
pub const HIGHEST: i64 = 45;
pub const MAX_ID_NUMBER_LEN: usize = 20;

/// Malformed user or admin input. Always reported back, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(
        "count out of range: pick between {min} and {max} distinct numbers (got {count})",
        min = MIN_PICKS,
        max = MAX_PICKS
    )]
    CountOutOfRange { count: usize },

    #[error("not integer: {token:?} is not a whole number")]
    NotInteger { token: String },

    #[error(
        "out of domain: {value} is outside {low}..={high}",
        low = LOWEST,
        high = HIGHEST
    )]
    OutOfDomain { value: i64 },

    #[error("identity number is required")]
    IdentityMissing,

    #[error(
        "identity number is {length} characters long, at most {max} allowed",
        max = MAX_ID_NUMBER_LEN
    )]
    IdentityTooLong { length: usize },

    #[error("draw numbers must be a non-empty list")]
    EmptyDraw,
}

impl ValidationError {
    /// Stable label for metrics and logs.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::CountOutOfRange { .. } => "count_out_of_range",
            ValidationError::NotInteger { .. } => "not_integer",
            ValidationError::OutOfDomain { .. } => "out_of_domain",
            ValidationError::IdentityMissing => "identity_missing",
            ValidationError::IdentityTooLong { .. } => "identity_too_long",
            ValidationError::EmptyDraw => "empty_draw",
        }
    }
}

/// Raw number selection as it arrives from a form or JSON body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    /// "5, 12, 19" (commas, semicolons or whitespace)
    Delimited(String),
    /// `[5, "12", 19.0]`
    Tokens(Vec<serde_json::Value>),
}

impl From<&str> for NumberInput {
    fn from(raw: &str) -> Self {
        NumberInput::Delimited(raw.to_string())
    }
}

impl From<Vec<u8>> for NumberInput {
    fn from(numbers: Vec<u8>) -> Self {
        NumberInput::Tokens(numbers.into_iter().map(serde_json::Value::from).collect())
    }
}

/// Parse and canonicalize a number selection: sorted ascending, no duplicates.
pub fn validate_numbers(input: &NumberInput) -> Result<Vec<u8>, ValidationError> {
    match input {
        NumberInput::Delimited(raw) => validate_tokens(
            raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace()),
        ),
        NumberInput::Tokens(values) => {
            let tokens = values
                .iter()
                .map(|value| match value {
                    serde_json::Value::Number(n) => Ok(n.to_string()),
                    serde_json::Value::String(s) => Ok(s.clone()),
                    other => Err(ValidationError::NotInteger {
                        token: other.to_string(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            validate_tokens(tokens.iter().map(String::as_str))
        }
    }
}

/// Shorthand for a delimited string.
pub fn parse_numbers(raw: &str) -> Result<Vec<u8>, ValidationError> {
    validate_numbers(&NumberInput::from(raw))
}

fn validate_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Vec<u8>, ValidationError> {
    let mut distinct = BTreeSet::new();

    for token in tokens.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
        let value = parse_whole_number(token)?;
        if !(LOWEST..=HIGHEST).contains(&value) {
            return Err(ValidationError::OutOfDomain { value });
        }
        distinct.insert(value as u8);
    }

    if !(MIN_PICKS..=MAX_PICKS).contains(&distinct.len()) {
        return Err(ValidationError::CountOutOfRange {
            count: distinct.len(),
        });
    }

    Ok(distinct.into_iter().collect())
}

/// Integers, or decimals without a fractional part ("7.0"). Whole numbers
/// too large for `i64` are out of domain, not malformed.
fn parse_whole_number(token: &str) -> Result<i64, ValidationError> {
    match token.parse::<i64>() {
        Ok(value) => return Ok(value),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
            return Err(ValidationError::OutOfDomain { value: i64::MAX })
        }
        Err(e) if *e.kind() == IntErrorKind::NegOverflow => {
            return Err(ValidationError::OutOfDomain { value: i64::MIN })
        }
        Err(_) => {}
    }

    match token.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => {
            if value.abs() < 1e15 {
                Ok(value as i64)
            } else if value > 0.0 {
                Err(ValidationError::OutOfDomain { value: i64::MAX })
            } else {
                Err(ValidationError::OutOfDomain { value: i64::MIN })
            }
        }
        _ => Err(ValidationError::NotInteger {
            token: token.to_string(),
        }),
    }
}

/// Trimmed identity number, 1 to `MAX_ID_NUMBER_LEN` characters.
pub fn validate_identity(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::IdentityMissing);
    }

    let length = trimmed.chars().count();
    if length > MAX_ID_NUMBER_LEN {
        return Err(ValidationError::IdentityTooLong { length });
    }

    Ok(trimmed.to_string())
}

/// Deduplicate and sort published draw numbers. No range check applies.
pub fn normalize_draw(numbers: &[i64]) -> Result<Vec<i64>, ValidationError> {
    if numbers.is_empty() {
        return Err(ValidationError::EmptyDraw);
    }
    Ok(numbers
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect())
}
