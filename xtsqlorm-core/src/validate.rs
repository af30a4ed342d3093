//! Payload validation
//!
//! Standalone field checks (`validate_email`, `validate_range`, ..), the
//! [`Validator`] hook used by [`crate::Operations`], and a rule-based
//! [`Schema`] built from those checks.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::{Record, Value};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex is valid")
});

// Mainland China mobile numbers
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^1[3-9][0-9]{9}$").expect("phone regex is valid"));

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*)://[^/?#\s]+[^\s]*$").expect("url regex is valid")
});

static ID_CARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{17}[0-9Xx]$").expect("id card regex is valid"));

static SPECIAL_CHAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).expect("special char regex is valid"));

const ID_CARD_FACTORS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];
const ID_CARD_CHECK_CODES: &[u8; 11] = b"10X98765432";

/// A rejected field value
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: Option<String>,
    pub value: Value,
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, field: Option<&str>, value: impl Into<Value>) -> Self {
        Self {
            field: field.map(str::to_owned),
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {} (value: {})", self.message, self.value),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type Check<T> = std::result::Result<T, ValidationError>;

/// Reject `None`, `Null` and empty text
pub fn validate_required<'v>(value: Option<&'v Value>, field: Option<&str>) -> Check<&'v Value> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::new("is required", field, Value::Null)),
        Some(Value::Text(s)) if s.is_empty() => {
            Err(ValidationError::new("is required", field, s.as_str()))
        }
        Some(v) => Ok(v),
    }
}

/// Character count within `[min, max]`
pub fn validate_length<'s>(
    value: &'s str,
    min: Option<usize>,
    max: Option<usize>,
    field: Option<&str>,
) -> Check<&'s str> {
    let length = value.chars().count();
    if let Some(min) = min {
        if length < min {
            return Err(ValidationError::new(
                format!("must be at least {min} characters"),
                field,
                value,
            ));
        }
    }
    if let Some(max) = max {
        if length > max {
            return Err(ValidationError::new(
                format!("must be at most {max} characters"),
                field,
                value,
            ));
        }
    }
    Ok(value)
}

/// Number within `[min, max]`
pub fn validate_range(value: f64, min: Option<f64>, max: Option<f64>, field: Option<&str>) -> Check<f64> {
    if let Some(min) = min {
        if value < min {
            return Err(ValidationError::new(format!("must be at least {min}"), field, value));
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(ValidationError::new(format!("must not exceed {max}"), field, value));
        }
    }
    Ok(value)
}

fn non_empty<'s>(value: &'s str, what: &str, field: Option<&str>) -> Check<&'s str> {
    if value.is_empty() {
        Err(ValidationError::new(format!("{what} must not be empty"), field, value))
    } else {
        Ok(value)
    }
}

pub fn validate_email<'s>(value: &'s str, field: Option<&str>) -> Check<&'s str> {
    non_empty(value, "email", field)?;
    if EMAIL_RE.is_match(value) {
        Ok(value)
    } else {
        Err(ValidationError::new("invalid email format", field, value))
    }
}

/// Mainland China mobile number: 11 digits starting with 13-19
pub fn validate_phone<'s>(value: &'s str, field: Option<&str>) -> Check<&'s str> {
    non_empty(value, "phone number", field)?;
    if PHONE_RE.is_match(value) {
        Ok(value)
    } else {
        Err(ValidationError::new("invalid phone number", field, value))
    }
}

/// `scheme://host...`, optionally requiring https
pub fn validate_url<'s>(value: &'s str, require_https: bool, field: Option<&str>) -> Check<&'s str> {
    non_empty(value, "URL", field)?;
    let caps = URL_RE
        .captures(value)
        .ok_or_else(|| ValidationError::new("invalid URL", field, value))?;
    if require_https && !caps[1].eq_ignore_ascii_case("https") {
        return Err(ValidationError::new("URL must use https", field, value));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

/// IPv4 or IPv6 address, optionally restricted to one version
pub fn validate_ip<'s>(value: &'s str, version: Option<IpVersion>, field: Option<&str>) -> Check<&'s str> {
    non_empty(value, "IP address", field)?;
    let is_v4 = value.parse::<Ipv4Addr>().is_ok();
    let is_v6 = value.parse::<Ipv6Addr>().is_ok();

    let ok = match version {
        Some(IpVersion::V4) => is_v4,
        Some(IpVersion::V6) => is_v6,
        None => is_v4 || is_v6,
    };
    if ok {
        Ok(value)
    } else {
        let message = match version {
            Some(IpVersion::V4) => "not a valid IPv4 address",
            Some(IpVersion::V6) => "not a valid IPv6 address",
            None => "invalid IP address",
        };
        Err(ValidationError::new(message, field, value))
    }
}

pub fn validate_pattern<'s>(
    value: &'s str,
    pattern: &Regex,
    message: Option<&str>,
    field: Option<&str>,
) -> Check<&'s str> {
    non_empty(value, "value", field)?;
    if pattern.is_match(value) {
        Ok(value)
    } else {
        Err(ValidationError::new(
            message.unwrap_or("does not match the required pattern"),
            field,
            value,
        ))
    }
}

pub fn validate_in_choices<'v>(value: &'v Value, choices: &[Value], field: Option<&str>) -> Check<&'v Value> {
    if choices.contains(value) {
        Ok(value)
    } else {
        let listed: Vec<String> = choices.iter().map(ToString::to_string).collect();
        Err(ValidationError::new(
            format!("must be one of [{}]", listed.join(", ")),
            field,
            value.clone(),
        ))
    }
}

/// Value variant is one of `expected` (names as returned by [`Value::kind`])
pub fn validate_kind<'v>(value: &'v Value, expected: &[&str], field: Option<&str>) -> Check<&'v Value> {
    if expected.contains(&value.kind()) {
        Ok(value)
    } else {
        Err(ValidationError::new(
            format!("expected {}, got {}", expected.join(" or "), value.kind()),
            field,
            value.clone(),
        ))
    }
}

/// ISO 8601 date or date-time; offsets are normalized to UTC
pub fn validate_datetime(value: &str, field: Option<&str>) -> Check<NaiveDateTime> {
    non_empty(value, "date-time", field)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ValidationError::new("invalid date-time", field, value))
}

/// Parse JSON text
pub fn validate_json(value: &str, field: Option<&str>) -> Check<serde_json::Value> {
    non_empty(value, "JSON", field)?;
    serde_json::from_str(value)
        .map_err(|e| ValidationError::new(format!("invalid JSON: {e}"), field, value))
}

/// Password requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_digit: bool,
    pub require_upper: bool,
    pub require_lower: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_digit: true,
            require_upper: true,
            require_lower: true,
            require_special: false,
        }
    }
}

/// Check a password against `policy`, reporting every unmet requirement at once
pub fn validate_password_strength<'s>(
    value: &'s str,
    policy: &PasswordPolicy,
    field: Option<&str>,
) -> Check<&'s str> {
    non_empty(value, "password", field)?;
    let mut problems = Vec::new();

    if value.chars().count() < policy.min_length {
        problems.push(format!("must be at least {} characters", policy.min_length));
    }
    if policy.require_digit && !value.chars().any(|c| c.is_ascii_digit()) {
        problems.push("must contain a digit".to_owned());
    }
    if policy.require_upper && !value.chars().any(char::is_uppercase) {
        problems.push("must contain an uppercase letter".to_owned());
    }
    if policy.require_lower && !value.chars().any(char::is_lowercase) {
        problems.push("must contain a lowercase letter".to_owned());
    }
    if policy.require_special && !SPECIAL_CHAR_RE.is_match(value) {
        problems.push("must contain a special character".to_owned());
    }

    if problems.is_empty() {
        Ok(value)
    } else {
        // The password itself is not echoed back
        Err(ValidationError::new(problems.join("; "), field, "***"))
    }
}

/// Username requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsernamePolicy {
    pub min_length: usize,
    pub max_length: usize,
    /// Also allow `.`, `_` and `-`
    pub allow_special: bool,
}

impl Default for UsernamePolicy {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 32,
            allow_special: false,
        }
    }
}

pub fn validate_username<'s>(value: &'s str, policy: &UsernamePolicy, field: Option<&str>) -> Check<&'s str> {
    non_empty(value, "username", field)?;
    let length = value.chars().count();
    if length < policy.min_length || length > policy.max_length {
        return Err(ValidationError::new(
            format!(
                "must be between {} and {} characters",
                policy.min_length, policy.max_length
            ),
            field,
            value,
        ));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || (policy.allow_special && matches!(c, '.' | '_' | '-'));
    if value.chars().all(allowed) {
        Ok(value)
    } else if policy.allow_special {
        Err(ValidationError::new(
            "may only contain letters, digits and . _ -",
            field,
            value,
        ))
    } else {
        Err(ValidationError::new("may only contain letters and digits", field, value))
    }
}

/// 18-digit PRC resident identity number with ISO 7064 check digit
pub fn validate_chinese_id_card<'s>(value: &'s str, field: Option<&str>) -> Check<&'s str> {
    non_empty(value, "ID card number", field)?;
    if !ID_CARD_RE.is_match(value) {
        return Err(ValidationError::new(
            "invalid ID card number (expected 18 characters)",
            field,
            value,
        ));
    }

    let bytes = value.as_bytes();
    let sum: u32 = bytes[..17]
        .iter()
        .zip(ID_CARD_FACTORS)
        .map(|(b, factor)| u32::from(b - b'0') * factor)
        .sum();
    let expected = ID_CARD_CHECK_CODES[(sum % 11) as usize];

    if bytes[17].to_ascii_uppercase() == expected {
        Ok(value)
    } else {
        Err(ValidationError::new("invalid ID card check digit", field, value))
    }
}

/// Whether a payload is for a new row or a partial update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Create,
    Update,
}

/// Hook run on every create/update payload before it is persisted
pub trait Validator: Send + Sync {
    fn validate(&self, data: &Record, mode: ValidationMode) -> Check<()>;
}

impl<F> Validator for F
where
    F: Fn(&Record, ValidationMode) -> Check<()> + Send + Sync,
{
    fn validate(&self, data: &Record, mode: ValidationMode) -> Check<()> {
        self(data, mode)
    }
}

/// One check applied to a field
#[derive(Debug, Clone)]
pub enum Rule {
    /// Must be present and non-empty on create; if present on update, non-empty
    Required,
    Length { min: Option<usize>, max: Option<usize> },
    Range { min: Option<f64>, max: Option<f64> },
    Email,
    Phone,
    Url { require_https: bool },
    Ip(Option<IpVersion>),
    Pattern { regex: Regex, message: Option<String> },
    Choices(Vec<Value>),
    Kind(Vec<&'static str>),
    DateTime,
    Json,
    Password(PasswordPolicy),
    Username(UsernamePolicy),
    ChineseIdCard,
}

impl Rule {
    /// Pattern rule from a regex source
    pub fn pattern(source: &str) -> std::result::Result<Rule, regex::Error> {
        Ok(Rule::Pattern {
            regex: Regex::new(source)?,
            message: None,
        })
    }

    fn check(&self, value: &Value, field: &str) -> Check<()> {
        let field = Some(field);
        let text = || {
            value
                .as_str()
                .ok_or_else(|| ValidationError::new(format!("expected text, got {}", value.kind()), field, value.clone()))
        };

        match self {
            Rule::Required => validate_required(Some(value), field).map(drop),
            Rule::Length { min, max } => validate_length(text()?, *min, *max, field).map(drop),
            Rule::Range { min, max } => {
                let n = value.as_f64().ok_or_else(|| {
                    ValidationError::new(format!("expected a number, got {}", value.kind()), field, value.clone())
                })?;
                validate_range(n, *min, *max, field).map(drop)
            }
            Rule::Email => validate_email(text()?, field).map(drop),
            Rule::Phone => validate_phone(text()?, field).map(drop),
            Rule::Url { require_https } => validate_url(text()?, *require_https, field).map(drop),
            Rule::Ip(version) => validate_ip(text()?, *version, field).map(drop),
            Rule::Pattern { regex, message } => {
                validate_pattern(text()?, regex, message.as_deref(), field).map(drop)
            }
            Rule::Choices(choices) => validate_in_choices(value, choices, field).map(drop),
            Rule::Kind(kinds) => validate_kind(value, kinds, field).map(drop),
            Rule::DateTime => validate_datetime(text()?, field).map(drop),
            Rule::Json => validate_json(text()?, field).map(drop),
            Rule::Password(policy) => validate_password_strength(text()?, policy, field).map(drop),
            Rule::Username(policy) => validate_username(text()?, policy, field).map(drop),
            Rule::ChineseIdCard => validate_chinese_id_card(text()?, field).map(drop),
        }
    }
}

/// Field rules checked against a payload.
///
/// Fields absent from an update payload are skipped; `Null` values skip
/// every rule except `Required`.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, Vec<Rule>)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields.push((name.into(), rules.into_iter().collect()));
        self
    }
}

impl Validator for Schema {
    fn validate(&self, data: &Record, mode: ValidationMode) -> Check<()> {
        for (field, rules) in &self.fields {
            let value = data.get(field);
            let required = rules.iter().any(|r| matches!(r, Rule::Required));

            if required && (mode == ValidationMode::Create || value.is_some()) {
                validate_required(value, Some(field))?;
            }

            let Some(value) = value.filter(|v| !v.is_null()) else {
                continue;
            };
            for rule in rules.iter().filter(|r| !matches!(r, Rule::Required)) {
                rule.check(value, field)?;
            }
        }
        Ok(())
    }
}
