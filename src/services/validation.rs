//! Form validation
//!
//! Field validators for attraction, review and registration forms, and
//! `FormErrors`, which collects every field error of a submission so they
//! can be reported together.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::UploadConfig;
use crate::models::Category;

pub const REQUIRED: &str = "This field is required.";
pub const NOT_A_NUMBER: &str = "Enter a number.";

pub const NAME_MAX_CHARS: usize = 150;
pub const LOCATION_MAX_CHARS: usize = 255;
pub const USERNAME_MAX_CHARS: usize = 150;
pub const COMMENT_MIN_CHARS: usize = 10;
pub const COMMENT_MAX_CHARS: usize = 500;
pub const PASSWORD_MIN_CHARS: usize = 8;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.@+-]+$").expect("valid username regex")
});

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("valid email regex")
});

/// Field name → messages, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("invalid fields: {:?}", .0.keys().collect::<Vec<_>>())]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single error on one field
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Record `result`'s error under `field`, passing the value through.
    pub fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.add(field, message);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Trimmed, non-empty text
pub fn required(value: Option<&str>) -> Result<String, String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(REQUIRED.to_string()),
    }
}

pub fn max_chars(value: &str, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len > max {
        Err(format!(
            "Ensure this value has at most {} characters (it has {}).",
            max, len
        ))
    } else {
        Ok(())
    }
}

pub fn min_chars(value: &str, min: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len < min {
        Err(format!(
            "Ensure this value has at least {} characters (it has {}).",
            min, len
        ))
    } else {
        Ok(())
    }
}

/// Required text limited to `max` characters
pub fn required_max(value: Option<&str>, max: usize) -> Result<String, String> {
    let value = required(value)?;
    max_chars(&value, max)?;
    Ok(value)
}

pub fn parse_category(raw: &str) -> Result<Category, String> {
    Category::parse(raw).ok_or_else(|| {
        format!(
            "Select a valid choice. {} is not one of the available choices.",
            raw.trim()
        )
    })
}

/// Checkbox-style boolean
pub fn parse_bool_field(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" | "" => Ok(false),
        _ => Err(format!("“{}” value must be either True or False.", raw.trim())),
    }
}

/// A finite decimal number
pub fn parse_coordinate(raw: &str) -> Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(NOT_A_NUMBER.to_string()),
    }
}

/// Coordinates are stored with six fractional digits.
pub fn round_coordinate(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

pub fn validate_latitude(value: f64) -> Result<f64, String> {
    if (-90.0..=90.0).contains(&value) {
        Ok(round_coordinate(value))
    } else {
        Err("Latitude must be between -90 and 90.".to_string())
    }
}

pub fn validate_longitude(value: f64) -> Result<f64, String> {
    if (-180.0..=180.0).contains(&value) {
        Ok(round_coordinate(value))
    } else {
        Err("Longitude must be between -180 and 180.".to_string())
    }
}

/// Size and extension checks for an uploaded image.
///
/// Returns the lowercased extension to store the file under.
pub fn validate_image(
    filename: &str,
    size: u64,
    upload: &UploadConfig,
) -> Result<String, Vec<String>> {
    let mut errors = Vec::new();

    if size > upload.max_image_size {
        errors.push(format!(
            "Image file too large ( > {}MB )",
            upload.max_image_size / (1024 * 1024)
        ));
    }

    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !upload.is_extension_allowed(&extension) {
        errors.push(format!(
            "File extension “{}” is not allowed. Allowed extensions are: {}.",
            extension,
            upload.allowed_extensions.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(extension)
    } else {
        Err(errors)
    }
}

pub fn validate_username(raw: &str) -> Result<String, String> {
    let username = required(Some(raw))?;
    max_chars(&username, USERNAME_MAX_CHARS)?;
    if !USERNAME_RE.is_match(&username) {
        return Err("Enter a valid username. This value may contain only letters, numbers, \
                    and @/./+/-/_ characters."
            .to_string());
    }
    Ok(username)
}

pub fn validate_email(raw: &str) -> Result<String, String> {
    let email = required(Some(raw))?;
    if email.len() > 254 || !EMAIL_RE.is_match(&email) {
        return Err("Enter a valid email address.".to_string());
    }
    Ok(email)
}

/// Password confirmation and strength; all problems are returned.
pub fn validate_new_password(password1: &str, password2: &str) -> Result<(), Vec<String>> {
    if password1 != password2 {
        return Err(vec!["The two password fields didn’t match.".to_string()]);
    }

    let mut errors = Vec::new();
    if password1.chars().count() < PASSWORD_MIN_CHARS {
        errors.push(format!(
            "This password is too short. It must contain at least {} characters.",
            PASSWORD_MIN_CHARS
        ));
    }
    if !password1.is_empty() && password1.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_rating(rating: Option<i64>) -> Result<i32, String> {
    match rating {
        None => Err(REQUIRED.to_string()),
        Some(r) if (1..=5).contains(&r) => Ok(r as i32),
        Some(r) => Err(format!(
            "Select a valid choice. {} is not one of the available choices.",
            r
        )),
    }
}

/// Trimmed comment between the length bounds
pub fn validate_comment(raw: Option<&str>) -> Result<String, String> {
    let comment = raw.map(str::trim).unwrap_or_default();
    if comment.is_empty() {
        return Err(REQUIRED.to_string());
    }
    min_chars(comment, COMMENT_MIN_CHARS)?;
    max_chars(comment, COMMENT_MAX_CHARS)?;
    Ok(comment.to_string())
}
