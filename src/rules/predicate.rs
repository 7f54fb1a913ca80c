//! Predicates that a single field value is checked against
//!
//! Architecture: Value Objects - Predicates are plain data that know how to evaluate themselves
//! - Predicates deserialize directly from rule configuration files
//! - Absent values pass every predicate except the presence checks
//! - Applying a predicate to an unsupported value type is a configuration error

use crate::domain::violations::{GuardianError, GuardianResult};
use crate::rules::{FieldKind, FieldValue};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{(\w+)\}").expect("valid placeholder regex");
}

/// A numeric bound used by comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Self::Integer(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A boolean condition over one field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "predicate", rename_all = "snake_case")]
pub enum Predicate {
    /// Value must be present
    NotNull,
    /// Value must be present, not blank text and not the type's default value
    NotEmpty,
    /// Text length in characters must lie within `[min, max]`
    #[serde(alias = "length_between")]
    Length { min: usize, max: usize },
    MinLength { min: usize },
    MaxLength { max: usize },
    GreaterThan { value: Number },
    GreaterThanOrEqual { value: Number },
    LessThan { value: Number },
    LessThanOrEqual { value: Number },
    /// Number must lie within `[from, to]`
    InclusiveBetween { from: Number, to: Number },
    /// Text must contain a match of the regular expression
    Matches { pattern: String },
    /// Text must contain exactly one `@` that is neither first nor last
    EmailAddress,
}

impl Predicate {
    /// `length(min, max)` under the name the rule builders use
    pub fn length_between(min: usize, max: usize) -> Self {
        Self::Length { min, max }
    }

    pub fn greater_than(value: impl Into<Number>) -> Self {
        Self::GreaterThan {
            value: value.into(),
        }
    }

    pub fn greater_than_or_equal(value: impl Into<Number>) -> Self {
        Self::GreaterThanOrEqual {
            value: value.into(),
        }
    }

    pub fn less_than(value: impl Into<Number>) -> Self {
        Self::LessThan {
            value: value.into(),
        }
    }

    pub fn less_than_or_equal(value: impl Into<Number>) -> Self {
        Self::LessThanOrEqual {
            value: value.into(),
        }
    }

    pub fn inclusive_between(from: impl Into<Number>, to: impl Into<Number>) -> Self {
        Self::InclusiveBetween {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn matches(pattern: impl Into<String>) -> Self {
        Self::Matches {
            pattern: pattern.into(),
        }
    }

    /// Stable code reported on failures
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotNull => "not_null",
            Self::NotEmpty => "not_empty",
            Self::Length { .. } => "length",
            Self::MinLength { .. } => "min_length",
            Self::MaxLength { .. } => "max_length",
            Self::GreaterThan { .. } => "greater_than",
            Self::GreaterThanOrEqual { .. } => "greater_than_or_equal",
            Self::LessThan { .. } => "less_than",
            Self::LessThanOrEqual { .. } => "less_than_or_equal",
            Self::InclusiveBetween { .. } => "inclusive_between",
            Self::Matches { .. } => "matches",
            Self::EmailAddress => "email_address",
        }
    }

    /// Message template used when a check configures none
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::NotNull => "{field} must not be null",
            Self::NotEmpty => "{field} must not be empty",
            Self::Length { .. } => "{field} must be between {min} and {max} characters",
            Self::MinLength { .. } => "{field} must be at least {min} characters",
            Self::MaxLength { .. } => "{field} must be at most {max} characters",
            Self::GreaterThan { .. } => "{field} must be greater than {bound}",
            Self::GreaterThanOrEqual { .. } => "{field} must be greater than or equal to {bound}",
            Self::LessThan { .. } => "{field} must be less than {bound}",
            Self::LessThanOrEqual { .. } => "{field} must be at most {bound}",
            Self::InclusiveBetween { .. } => "{field} must be between {from} and {to}",
            Self::Matches { .. } => "{field} is not in the correct format",
            Self::EmailAddress => "{field} is not a valid email address",
        }
    }

    /// Whether the predicate can check values of the given kind
    pub fn applies_to(&self, kind: FieldKind) -> bool {
        match self {
            Self::NotNull | Self::NotEmpty => true,
            Self::Length { .. }
            | Self::MinLength { .. }
            | Self::MaxLength { .. }
            | Self::Matches { .. }
            | Self::EmailAddress => kind == FieldKind::Text,
            Self::GreaterThan { .. }
            | Self::GreaterThanOrEqual { .. }
            | Self::LessThan { .. }
            | Self::LessThanOrEqual { .. }
            | Self::InclusiveBetween { .. } => kind.is_numeric(),
        }
    }

    /// Check parameters and compile the regex for `matches`
    pub(crate) fn prepare(&self) -> GuardianResult<Option<Regex>> {
        match self {
            Self::Length { min, max } if min > max => Err(GuardianError::config(format!(
                "length bounds are inverted: min {min} > max {max}"
            ))),
            Self::InclusiveBetween { from, to } if from.as_f64() > to.as_f64() => {
                Err(GuardianError::config(format!(
                    "inclusive_between bounds are inverted: from {from} > to {to}"
                )))
            }
            Self::Matches { pattern } => Regex::new(pattern).map(Some).map_err(|e| {
                GuardianError::config(format!("Invalid regex pattern '{pattern}': {e}"))
            }),
            _ => Ok(None),
        }
    }

    /// Evaluate against a value; `Ok(true)` means the check passed
    pub(crate) fn evaluate(
        &self,
        field: &str,
        value: &FieldValue,
        regex: Option<&Regex>,
    ) -> GuardianResult<bool> {
        match self {
            Self::NotNull => Ok(!value.is_missing()),
            Self::NotEmpty => Ok(!is_empty_value(value)),
            _ if value.is_missing() => Ok(true),
            Self::Length { min, max } => {
                let len = self.text_len(field, value)?;
                Ok((*min..=*max).contains(&len))
            }
            Self::MinLength { min } => Ok(self.text_len(field, value)? >= *min),
            Self::MaxLength { max } => Ok(self.text_len(field, value)? <= *max),
            Self::GreaterThan { value: bound } => {
                Ok(self.compare(field, value, bound)? == Some(Ordering::Greater))
            }
            Self::GreaterThanOrEqual { value: bound } => Ok(matches!(
                self.compare(field, value, bound)?,
                Some(Ordering::Greater | Ordering::Equal)
            )),
            Self::LessThan { value: bound } => {
                Ok(self.compare(field, value, bound)? == Some(Ordering::Less))
            }
            Self::LessThanOrEqual { value: bound } => Ok(matches!(
                self.compare(field, value, bound)?,
                Some(Ordering::Less | Ordering::Equal)
            )),
            Self::InclusiveBetween { from, to } => {
                let above = self.compare(field, value, from)?;
                let below = self.compare(field, value, to)?;
                Ok(matches!(above, Some(Ordering::Greater | Ordering::Equal))
                    && matches!(below, Some(Ordering::Less | Ordering::Equal)))
            }
            Self::Matches { pattern } => {
                let text = self.text(field, value)?;
                let regex = regex.ok_or_else(|| {
                    GuardianError::config(format!(
                        "Regex '{pattern}' for field '{field}' was never compiled"
                    ))
                })?;
                Ok(regex.is_match(text))
            }
            Self::EmailAddress => {
                let text = self.text(field, value)?;
                Ok(match (text.find('@'), text.rfind('@')) {
                    (Some(first), Some(last)) => {
                        first > 0 && first == last && first + 1 < text.len()
                    }
                    _ => false,
                })
            }
        }
    }

    /// Render a message template for a failing value.
    ///
    /// Placeholders are expanded in a single pass over the template, so text
    /// inside the value or field name is never expanded. Unknown placeholders
    /// are left as written.
    pub(crate) fn render(&self, template: &str, field: &str, value: &FieldValue) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| {
                self.placeholder(&caps[1], field, value)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    fn placeholder(&self, key: &str, field: &str, value: &FieldValue) -> Option<String> {
        match (key, self) {
            ("field", _) => Some(field.to_string()),
            ("value", _) => Some(value.render().unwrap_or_default()),
            ("length", _) => match value {
                FieldValue::Text(text) => Some(text.chars().count().to_string()),
                _ => None,
            },
            ("min", Self::Length { min, .. } | Self::MinLength { min }) => Some(min.to_string()),
            ("max", Self::Length { max, .. } | Self::MaxLength { max }) => Some(max.to_string()),
            (
                "bound",
                Self::GreaterThan { value: bound }
                | Self::GreaterThanOrEqual { value: bound }
                | Self::LessThan { value: bound }
                | Self::LessThanOrEqual { value: bound },
            ) => Some(bound.to_string()),
            ("from", Self::InclusiveBetween { from, .. }) => Some(from.to_string()),
            ("to", Self::InclusiveBetween { to, .. }) => Some(to.to_string()),
            ("pattern", Self::Matches { pattern }) => Some(pattern.clone()),
            _ => None,
        }
    }

    fn text<'v>(&self, field: &str, value: &'v FieldValue) -> GuardianResult<&'v str> {
        match value {
            FieldValue::Text(text) => Ok(text),
            other => Err(GuardianError::type_mismatch(field, self.code(), other.type_name())),
        }
    }

    fn text_len(&self, field: &str, value: &FieldValue) -> GuardianResult<usize> {
        self.text(field, value).map(|text| text.chars().count())
    }

    fn compare(
        &self,
        field: &str,
        value: &FieldValue,
        bound: &Number,
    ) -> GuardianResult<Option<Ordering>> {
        let ordering = match (value, bound) {
            (FieldValue::Integer(a), Number::Integer(b)) => Some(a.cmp(b)),
            (FieldValue::Integer(a), Number::Float(b)) => cmp_int_float(*a, *b),
            (FieldValue::Float(a), Number::Integer(b)) => {
                cmp_int_float(*b, *a).map(Ordering::reverse)
            }
            (FieldValue::Float(a), Number::Float(b)) => a.partial_cmp(b),
            (other, _) => {
                return Err(GuardianError::type_mismatch(
                    field,
                    self.code(),
                    other.type_name(),
                ))
            }
        };
        Ok(ordering)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length { min, max } => write!(f, "length({min}, {max})"),
            Self::MinLength { min } => write!(f, "min_length({min})"),
            Self::MaxLength { max } => write!(f, "max_length({max})"),
            Self::GreaterThan { value }
            | Self::GreaterThanOrEqual { value }
            | Self::LessThan { value }
            | Self::LessThanOrEqual { value } => write!(f, "{}({value})", self.code()),
            Self::InclusiveBetween { from, to } => write!(f, "inclusive_between({from}, {to})"),
            Self::Matches { pattern } => write!(f, "matches(/{pattern}/)"),
            _ => f.write_str(self.code()),
        }
    }
}

/// Compare an integer with a float without rounding the integer.
///
/// Integral floats inside the `i64` range are compared as integers.
/// Non-integral floats are below 2^52 in magnitude, where rounding the
/// integer to `f64` cannot change the ordering.
fn cmp_int_float(int: i64, float: f64) -> Option<Ordering> {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if float.is_nan() {
        None
    } else if float >= TWO_POW_63 {
        Some(Ordering::Less)
    } else if float < -TWO_POW_63 {
        Some(Ordering::Greater)
    } else if float.fract() == 0.0 {
        Some(int.cmp(&(float as i64)))
    } else {
        (int as f64).partial_cmp(&float)
    }
}

fn is_empty_value(value: &FieldValue) -> bool {
    match value {
        FieldValue::Missing => true,
        FieldValue::Text(text) => text.trim().is_empty(),
        FieldValue::Integer(i) => *i == 0,
        FieldValue::Float(f) => *f == 0.0,
        FieldValue::Bool(b) => !*b,
    }
}
