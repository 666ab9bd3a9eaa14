//! Validated field types shared by storage and import.

mod partial_date;
mod phone;

pub use partial_date::PartialDate;
pub use phone::normalize_phone;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("invalid integer {0:?}")]
    InvalidInteger(String),
    #[error("invalid integer length; expected {expected}")]
    InvalidIntegerLength { expected: usize },
    #[error("invalid date format")]
    InvalidDateFormat,
    #[error("day requires month")]
    DayRequiresMonth,
    #[error("invalid year")]
    InvalidYear,
    #[error("invalid month")]
    InvalidMonth,
    #[error("invalid day")]
    InvalidDay,
    #[error("invalid date")]
    InvalidDate,
    #[error("invalid phone number {0:?}")]
    InvalidPhone(String),
}

/// Reduce a display name to a URL-safe slug: lowercase alphanumeric runs
/// joined by single hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Seattle"), "seattle");
        assert_eq!(slugify("Lake Washington"), "lake-washington");
        assert_eq!(slugify("  Tacoma / Pierce County  "), "tacoma-pierce-county");
        assert_eq!(slugify(""), "");
    }
}
