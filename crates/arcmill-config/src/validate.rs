//! Validation helpers and parsing utilities for configuration values.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

pub(crate) fn require_text(field: &'static str, value: Option<String>) -> ConfigResult<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(_) => Err(ConfigError::InvalidField {
            field,
            reason: "empty",
            value: None,
        }),
        None => Err(ConfigError::MissingField { field }),
    }
}

pub(crate) fn require_path(field: &'static str, value: Option<String>) -> ConfigResult<PathBuf> {
    require_text(field, value).map(PathBuf::from)
}

pub(crate) fn text_or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub(crate) fn parse_timeout_secs(field: &'static str, raw: &str) -> ConfigResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidField {
            field,
            reason: "not_an_integer",
            value: Some(raw.to_string()),
        })
}

pub(crate) fn timeout_from_secs(field: &'static str, secs: u64) -> ConfigResult<Duration> {
    if secs == 0 {
        return Err(ConfigError::InvalidField {
            field,
            reason: "zero",
            value: Some(secs.to_string()),
        });
    }
    Ok(Duration::from_secs(secs))
}

pub(crate) fn parse_port(field: &'static str, raw: &str) -> ConfigResult<u16> {
    let port = raw
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidField {
            field,
            reason: "out_of_range",
            value: Some(raw.to_string()),
        })?;
    if port == 0 {
        return Err(ConfigError::InvalidField {
            field,
            reason: "zero",
            value: Some(raw.to_string()),
        });
    }
    Ok(port)
}

pub(crate) fn parse_flag(field: &'static str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidField {
            field,
            reason: "not_a_flag",
            value: Some(raw.to_string()),
        }),
    }
}
