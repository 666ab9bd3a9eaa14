use phonenumber::{country, Mode};

use super::FieldError;

/// Validate a phone number and normalize it to E.164.
///
/// Numbers without a country prefix are interpreted as US numbers, matching
/// the region the data covers. Blank input stays blank: phone is an optional
/// contact field everywhere it appears.
pub fn normalize_phone(raw: &str) -> Result<String, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(String::new());
    }
    let parsed = phonenumber::parse(Some(country::US), raw)
        .map_err(|_| FieldError::InvalidPhone(raw.to_string()))?;
    if !phonenumber::is_valid(&parsed) {
        return Err(FieldError::InvalidPhone(raw.to_string()));
    }
    Ok(parsed.format().mode(Mode::E164).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_stays_blank() {
        assert_eq!(normalize_phone("").unwrap(), "");
        assert_eq!(normalize_phone("   ").unwrap(), "");
    }

    #[test]
    fn normalizes_us_formats_to_e164() {
        assert_eq!(normalize_phone("(206) 252-0000").unwrap(), "+12062520000");
        assert_eq!(normalize_phone("206-252-0000").unwrap(), "+12062520000");
        assert_eq!(normalize_phone("+1 206 252 0000").unwrap(), "+12062520000");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            normalize_phone("not a phone"),
            Err(FieldError::InvalidPhone(_))
        ));
        assert!(matches!(
            normalize_phone("123"),
            Err(FieldError::InvalidPhone(_))
        ));
    }
}
