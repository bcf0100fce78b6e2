// Domain entities and the pure rules that govern them

pub mod access_log;
pub mod delivery;
pub mod guest_code;
pub mod notification;
pub mod resident;
pub mod user;
pub mod visit;

use crate::errors::{AppError, Result};

/// Trim a required text field, rejecting missing or blank values.
pub fn required(field: &str, value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::ValidationError(format!("{} is required", field))),
    }
}

/// Trim an optional text field, folding blank values to `None`.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn ensure_max_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(AppError::ValidationError(format!(
            "{} cannot be more than {} characters",
            field, max
        )));
    }
    Ok(())
}

pub fn ensure_optional_max_len(field: &str, value: Option<&str>, max: usize) -> Result<()> {
    match value {
        Some(v) => ensure_max_len(field, v, max),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_blank() {
        assert!(required("Guest name", None).is_err());
        assert!(required("Guest name", Some("   ".into())).is_err());
        assert_eq!(required("Guest name", Some(" Ana ".into())).unwrap(), "Ana");
    }

    #[test]
    fn test_max_len_counts_chars() {
        assert!(ensure_max_len("Title", "ééé", 3).is_ok());
        assert!(ensure_max_len("Title", "éééé", 3).is_err());
        assert!(ensure_optional_max_len("Notes", None, 1).is_ok());
    }
}
