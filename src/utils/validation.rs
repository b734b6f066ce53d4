use crate::error::ApiError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::str::FromStr;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

static NO_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+$").expect("static regex"));

static EMAIL_USER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        // dot-atom
        r#"(?i)^([-!#$%&'*+/=?^_`{}|~0-9A-Z]+(\.[-!#$%&'*+/=?^_`{}|~0-9A-Z]+)*$"#,
        // quoted string
        r#"|^"([\x01-\x08\x0b\x0c\x0e-\x1f!#-\[\]-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*"$)"#,
    ))
    .expect("static regex")
});

// Labels of up to 63 characters; the TLD may hold digits and inner hyphens (punycode).
static EMAIL_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([A-Z0-9]([A-Z0-9-]{0,61}[A-Z0-9])?\.)+[A-Z0-9-]{1,62}[A-Z0-9]$")
        .expect("static regex")
});

static EMAIL_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\[([A-F0-9:.]+)\]$").expect("static regex"));

const EMAIL_DOMAIN_ALLOWLIST: &[&str] = &["localhost"];

fn is_valid_email(value: &str) -> bool {
    let Some((user, domain)) = value.rsplit_once('@') else {
        return false;
    };

    if !EMAIL_USER.is_match(user) {
        return false;
    }

    if EMAIL_DOMAIN_ALLOWLIST.contains(&domain) || EMAIL_DOMAIN.is_match(domain) {
        return true;
    }

    EMAIL_LITERAL
        .captures(domain)
        .and_then(|c| c.get(1))
        .is_some_and(|ip| ip.as_str().parse::<IpAddr>().is_ok())
}

/// Field name -> messages, serialized as a plain JSON object.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

/// Collects a present-or-required value. `partial` (PATCH) lets absent fields through.
fn present<T>(errors: &mut FieldErrors, field: &str, value: Option<T>, partial: bool) -> Option<T> {
    if value.is_none() && !partial {
        errors.add(field, REQUIRED);
    }
    value
}

fn max_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) -> bool {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {max} characters."),
        );
        return false;
    }
    true
}

/// Trimmed, non-blank text of at most `max` characters.
pub fn text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max: usize,
    partial: bool,
) -> Option<String> {
    let value = present(errors, field, value, partial)?;
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    max_length(errors, field, value, max).then(|| value.to_string())
}

/// Employee code: up to 12 characters, no whitespace anywhere (including the ends).
pub fn emp_id(errors: &mut FieldErrors, value: Option<String>, partial: bool) -> Option<String> {
    let field = "emp_id";
    let value = present(errors, field, value, partial)?;
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }

    let mut ok = max_length(errors, field, &value, 12);
    if !NO_SPACE.is_match(&value) {
        errors.add(field, "This field cannot contain spaces.");
        ok = false;
    }
    ok.then_some(value)
}

pub fn email(errors: &mut FieldErrors, value: Option<String>, partial: bool) -> Option<String> {
    let field = "email";
    let value = text(errors, field, value, 254, partial)?;
    if !is_valid_email(&value) {
        errors.add(field, "Enter a valid email address.");
        return None;
    }
    Some(value)
}

pub fn reference(errors: &mut FieldErrors, field: &str, value: Option<u64>, partial: bool) -> Option<u64> {
    present(errors, field, value, partial)
}

/// ISO `YYYY-MM-DD` calendar date.
pub fn date(errors: &mut FieldErrors, field: &str, value: Option<String>, partial: bool) -> Option<NaiveDate> {
    let value = present(errors, field, value, partial)?;
    match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            errors.add(
                field,
                "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
            );
            None
        }
    }
}

/// One of a closed set of string choices, parsed through `FromStr`.
pub fn choice<T: FromStr>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    partial: bool,
) -> Option<T> {
    let value = present(errors, field, value, partial)?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.add(field, format!("\"{value}\" is not a valid choice."));
            None
        }
    }
}
