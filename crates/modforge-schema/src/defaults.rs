//! Default-value grammar per subtype.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use modforge_core::{DefaultValue, PasswordPolicy, Subtype};
use regex::Regex;
use serde_json::Value;
use validator::ValidateEmail;

use crate::errors::{Result, SchemaError};

pub const DEFAULT_PHONE_REGION: &str = "IN";

const DECIMAL_PATTERN: &str = r"^-?\d+(\.\d+)?$";
const TIME_PATTERN: &str = r"^([01]\d|2[0-3]):[0-5]\d:[0-5]\d$";
const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";
const DATETIME_PATTERN: &str = r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$";
const INTERNATIONAL_PHONE_PATTERN: &str = r"^\+[1-9]\d{6,14}$";

/// Local number pattern for a supported region code.
fn local_phone_pattern(region: &str) -> Option<&'static str> {
    match region.to_ascii_uppercase().as_str() {
        "IN" => Some(r"^(?:\+91[\-\s]?|0)?[6-9]\d{4}[\-\s]?\d{5}$"),
        "US" | "CA" => Some(r"^(?:\+1[\-\s]?)?\(?[2-9]\d{2}\)?[\-\s]?[2-9]\d{2}[\-\s]?\d{4}$"),
        "GB" => Some(r"^(?:\+44\s?|0)7\d{3}\s?\d{6}$"),
        _ => None,
    }
}

/// Pattern a phone number of `subtype` must match; `None` for an unsupported
/// region or a non-phone subtype.
pub fn phone_pattern(subtype: Subtype, region: &str) -> Option<&'static str> {
    match subtype {
        Subtype::LocalPhoneNumber => local_phone_pattern(region),
        Subtype::InternationalPhoneNumber => Some(INTERNATIONAL_PHONE_PATTERN),
        _ => None,
    }
}

/// What a default is checked against besides its subtype.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContext<'a> {
    /// Permitted values of an enum or set field.
    pub values: &'a [String],
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub policy: Option<&'a PasswordPolicy>,
}

/// Compiled default-value grammars.
#[derive(Debug, Clone)]
pub struct DefaultRules {
    decimal: Regex,
    time: Regex,
    date: Regex,
    datetime: Regex,
    local_phone: Regex,
    international_phone: Regex,
    region: String,
}

impl DefaultRules {
    pub fn new(phone_region: &str) -> Result<Self> {
        let local = local_phone_pattern(phone_region).ok_or_else(|| {
            SchemaError::Schema(format!("unsupported phone region '{phone_region}'"))
        })?;
        Ok(Self {
            decimal: Regex::new(DECIMAL_PATTERN)?,
            time: Regex::new(TIME_PATTERN)?,
            date: Regex::new(DATE_PATTERN)?,
            datetime: Regex::new(DATETIME_PATTERN)?,
            local_phone: Regex::new(local)?,
            international_phone: Regex::new(INTERNATIONAL_PHONE_PATTERN)?,
            region: phone_region.to_ascii_uppercase(),
        })
    }

    /// Check `value` against the grammar of `subtype`.
    ///
    /// Returns the normalized default or a message describing the violation.
    pub fn check(
        &self,
        subtype: Subtype,
        value: &Value,
        context: &DefaultContext<'_>,
    ) -> std::result::Result<DefaultValue, String> {
        match subtype {
            Subtype::Decimal | Subtype::Float | Subtype::Double => {
                let text = match value {
                    Value::String(text) => text.clone(),
                    Value::Number(number) => number.to_string(),
                    _ => return Err(format!("default for {subtype} must be a decimal number")),
                };
                if !self.decimal.is_match(&text) {
                    return Err(format!("'{text}' is not a valid {subtype} default"));
                }
                if subtype == Subtype::Decimal {
                    check_decimal_digits(&text, context)?;
                }
                Ok(DefaultValue::Decimal(text))
            }
            Subtype::SmallInt | Subtype::Int | Subtype::BigInt => {
                let number = value
                    .as_i64()
                    .ok_or_else(|| format!("default for {subtype} must be an integer"))?;
                let in_range = match subtype {
                    Subtype::SmallInt => i16::try_from(number).is_ok(),
                    Subtype::Int => i32::try_from(number).is_ok(),
                    _ => true,
                };
                if !in_range {
                    return Err(format!("{number} is out of range for {subtype}"));
                }
                Ok(DefaultValue::Integer(number))
            }
            Subtype::Boolean => value
                .as_bool()
                .map(DefaultValue::Bool)
                .ok_or_else(|| "default for boolean must be true or false".to_string()),
            Subtype::Varchar | Subtype::Char | Subtype::TinyText | Subtype::Text => {
                let text = expect_string(subtype, value)?;
                if let Some(length) = context.length
                    && text.chars().count() > length as usize
                {
                    return Err(format!("default exceeds the column length of {length}"));
                }
                Ok(DefaultValue::Text(text))
            }
            Subtype::Time => {
                let text = expect_string(subtype, value)?;
                if matches!(text.as_str(), "NOW()" | "CURRENT_TIME") {
                    return Ok(DefaultValue::Expression(text));
                }
                if self.time.is_match(&text) && NaiveTime::parse_from_str(&text, "%H:%M:%S").is_ok() {
                    return Ok(DefaultValue::Text(text));
                }
                Err("default for time must be HH:mm:ss, NOW() or CURRENT_TIME".to_string())
            }
            Subtype::Date => {
                let text = expect_string(subtype, value)?;
                if text == "CURRENT_DATE" {
                    return Ok(DefaultValue::Expression(text));
                }
                if self.date.is_match(&text) && NaiveDate::parse_from_str(&text, "%Y-%m-%d").is_ok()
                {
                    return Ok(DefaultValue::Text(text));
                }
                Err("default for date must be YYYY-MM-DD or CURRENT_DATE".to_string())
            }
            Subtype::DateTime => {
                let text = expect_string(subtype, value)?;
                if matches!(text.as_str(), "NOW()" | "CURRENT_TIMESTAMP") {
                    return Ok(DefaultValue::Expression(text));
                }
                if self.datetime.is_match(&text)
                    && NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S").is_ok()
                {
                    return Ok(DefaultValue::Text(text));
                }
                Err(
                    "default for datetime must be YYYY-MM-DD HH:mm:ss, NOW() or CURRENT_TIMESTAMP"
                        .to_string(),
                )
            }
            Subtype::Timestamp => {
                let text = expect_string(subtype, value)?;
                if matches!(text.as_str(), "NOW()" | "CURRENT_TIMESTAMP") {
                    return Ok(DefaultValue::Expression(text));
                }
                if is_iso8601(&text) {
                    return Ok(DefaultValue::Text(text));
                }
                Err("default for timestamp must be ISO 8601, NOW() or CURRENT_TIMESTAMP".to_string())
            }
            Subtype::Enum => {
                let text = expect_string(subtype, value)?;
                if context.values.contains(&text) {
                    Ok(DefaultValue::Text(text))
                } else {
                    Err(format!(
                        "default '{text}' is not one of [{}]",
                        context.values.join(", ")
                    ))
                }
            }
            Subtype::SimpleArray => {
                let items = value
                    .as_array()
                    .ok_or_else(|| "default for a set must be an array of strings".to_string())?;
                let mut selected = Vec::with_capacity(items.len());
                for item in items {
                    let text = item
                        .as_str()
                        .ok_or_else(|| "default for a set must be an array of strings".to_string())?;
                    if !context.values.iter().any(|value| value == text) {
                        return Err(format!(
                            "default member '{text}' is not one of [{}]",
                            context.values.join(", ")
                        ));
                    }
                    selected.push(text.to_string());
                }
                Ok(DefaultValue::List(selected))
            }
            Subtype::Email => {
                let text = expect_string(subtype, value)?;
                if text.validate_email() {
                    Ok(DefaultValue::Text(text))
                } else {
                    Err(format!("'{text}' is not a valid email address"))
                }
            }
            Subtype::LocalPhoneNumber => {
                let text = expect_string(subtype, value)?;
                if self.local_phone.is_match(&text) {
                    Ok(DefaultValue::Text(text))
                } else {
                    Err(format!("'{text}' is not a valid {} phone number", self.region))
                }
            }
            Subtype::InternationalPhoneNumber => {
                let text = expect_string(subtype, value)?;
                if self.international_phone.is_match(&text) {
                    Ok(DefaultValue::Text(text))
                } else {
                    Err(format!("'{text}' is not a valid international phone number"))
                }
            }
            Subtype::Password => {
                let text = expect_string(subtype, value)?;
                let policy = context.policy.copied().unwrap_or_default();
                if policy.accepts(&text) {
                    Ok(DefaultValue::Text(text))
                } else {
                    Err(policy.describe())
                }
            }
            Subtype::MediumText | Subtype::Json | Subtype::Uuid | Subtype::StringId => {
                Err(format!("default values are not supported for subtype '{subtype}'"))
            }
        }
    }
}

fn expect_string(subtype: Subtype, value: &Value) -> std::result::Result<String, String> {
    value
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| format!("default for {subtype} must be a string"))
}

fn check_decimal_digits(text: &str, context: &DefaultContext<'_>) -> std::result::Result<(), String> {
    let precision = context
        .precision
        .unwrap_or(modforge_core::types::DEFAULT_DECIMAL_PRECISION);
    let scale = context
        .scale
        .unwrap_or(modforge_core::types::DEFAULT_DECIMAL_SCALE);
    let unsigned = text.trim_start_matches('-');
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let whole_digits = whole.trim_start_matches('0').len() as u32;
    if fraction.len() as u32 > scale || whole_digits > precision.saturating_sub(scale) {
        return Err(format!("'{text}' does not fit DECIMAL({precision},{scale})"));
    }
    Ok(())
}

fn is_iso8601(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rules() -> DefaultRules {
        DefaultRules::new(DEFAULT_PHONE_REGION).expect("rules")
    }

    #[test]
    fn decimal_default_follows_grammar_and_precision() {
        let rules = rules();
        let context = DefaultContext {
            precision: Some(10),
            scale: Some(2),
            ..DefaultContext::default()
        };
        assert_eq!(
            rules.check(Subtype::Decimal, &json!("12345678.99"), &context),
            Ok(DefaultValue::Decimal("12345678.99".to_string()))
        );
        assert!(rules.check(Subtype::Decimal, &json!("abc"), &context).is_err());
        assert!(rules.check(Subtype::Decimal, &json!("123456789.99"), &context).is_err());
        assert!(rules.check(Subtype::Float, &json!(1.25), &context).is_ok());
    }

    #[test]
    fn temporal_defaults_accept_sentinels() {
        let rules = rules();
        let context = DefaultContext::default();
        assert_eq!(
            rules.check(Subtype::DateTime, &json!("NOW()"), &context),
            Ok(DefaultValue::Expression("NOW()".to_string()))
        );
        assert!(rules.check(Subtype::DateTime, &json!("2024-01-31 10:00:00"), &context).is_ok());
        assert!(rules.check(Subtype::Date, &json!("2024-02-30"), &context).is_err());
        assert!(rules.check(Subtype::Date, &json!("CURRENT_TIMESTAMP"), &context).is_err());
        assert!(rules.check(Subtype::Time, &json!("24:00:00"), &context).is_err());
        assert!(rules.check(Subtype::Timestamp, &json!("2024-01-31T10:00:00Z"), &context).is_ok());
    }

    #[test]
    fn integer_defaults_respect_subtype_range() {
        let rules = rules();
        let context = DefaultContext::default();
        assert!(rules.check(Subtype::SmallInt, &json!(40000), &context).is_err());
        assert!(rules.check(Subtype::BigInt, &json!(40000), &context).is_ok());
        assert!(rules.check(Subtype::Int, &json!("7"), &context).is_err());
    }

    #[test]
    fn set_default_must_be_subset() {
        let rules = rules();
        let values = vec!["red".to_string(), "blue".to_string()];
        let context = DefaultContext {
            values: &values,
            ..DefaultContext::default()
        };
        assert!(rules.check(Subtype::SimpleArray, &json!(["red"]), &context).is_ok());
        assert!(rules.check(Subtype::SimpleArray, &json!(["green"]), &context).is_err());
        assert!(rules.check(Subtype::SimpleArray, &json!("red"), &context).is_err());
    }

    #[test]
    fn phone_defaults_are_region_aware() {
        let rules = rules();
        let context = DefaultContext::default();
        assert!(rules.check(Subtype::LocalPhoneNumber, &json!("9876543210"), &context).is_ok());
        assert!(rules.check(Subtype::LocalPhoneNumber, &json!("98765 43210"), &context).is_ok());
        assert!(rules.check(Subtype::LocalPhoneNumber, &json!("+91 98765-43210"), &context).is_ok());
        assert!(rules.check(Subtype::LocalPhoneNumber, &json!("1234567890"), &context).is_err());
        assert!(rules.check(Subtype::LocalPhoneNumber, &json!("987654 3210"), &context).is_err());
        assert!(
            rules
                .check(Subtype::InternationalPhoneNumber, &json!("+14155552671"), &context)
                .is_ok()
        );
        assert!(DefaultRules::new("ZZ").is_err());
    }

    #[test]
    fn email_defaults_follow_the_validator_grammar() {
        let rules = rules();
        let context = DefaultContext::default();
        for address in ["o'brien@example.com", "admin@localhost", "a!b@example.com"] {
            assert_eq!(
                rules.check(Subtype::Email, &json!(address), &context),
                Ok(DefaultValue::Text(address.to_string()))
            );
        }
        for address in ["not-an-email", "a@@example.com", "@example.com"] {
            assert!(rules.check(Subtype::Email, &json!(address), &context).is_err());
        }
    }

    #[test]
    fn uncovered_subtypes_reject_any_default() {
        let rules = rules();
        let context = DefaultContext::default();
        for subtype in [Subtype::Uuid, Subtype::Json, Subtype::MediumText, Subtype::StringId] {
            assert!(rules.check(subtype, &json!("x"), &context).is_err());
        }
    }
}
