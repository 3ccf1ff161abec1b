//! Input rules checked at the operation boundary.

use crate::constants::*;
use crate::error::ValidationError;

pub fn search_query(query: &str) -> Result<&str, ValidationError> {
    let query = query.trim();
    if query.chars().count() < MIN_SEARCH_QUERY_LEN {
        return Err(ValidationError::QueryTooShort {
            min: MIN_SEARCH_QUERY_LEN,
        });
    }
    Ok(query)
}

pub fn username(name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ValidationError::UsernameLength {
            min: MIN_USERNAME_LEN,
            max: MAX_USERNAME_LEN,
        });
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if !name.chars().all(allowed) {
        return Err(ValidationError::UsernameCharacters);
    }
    Ok(())
}

pub fn password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Trim and check a topic or card name.
pub fn name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Blank { field });
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_LEN,
        });
    }
    Ok(trimmed.to_string())
}

pub fn progress(value: i64) -> Result<i64, ValidationError> {
    if !(PROGRESS_MIN..=PROGRESS_MAX).contains(&value) {
        return Err(ValidationError::ProgressOutOfRange {
            value,
            min: PROGRESS_MIN,
            max: PROGRESS_MAX,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_query_rejected() {
        assert_eq!(
            search_query("a"),
            Err(ValidationError::QueryTooShort { min: 2 })
        );
        assert_eq!(search_query("  a "), Err(ValidationError::QueryTooShort { min: 2 }));
        assert_eq!(search_query(" al "), Ok("al"));
    }

    #[test]
    fn username_rules() {
        assert!(username("alice_01").is_ok());
        assert!(username("a.b+c@d-e").is_ok());
        assert!(username("al").is_err());
        assert_eq!(username("bad name"), Err(ValidationError::UsernameCharacters));
        assert!(username(&"x".repeat(151)).is_err());
    }

    #[test]
    fn names_are_trimmed() {
        assert_eq!(name("name", "  Rust  ").unwrap(), "Rust");
        assert_eq!(name("name", "   "), Err(ValidationError::Blank { field: "name" }));
        assert!(name("name", &"n".repeat(256)).is_err());
    }

    #[test]
    fn progress_bounds() {
        assert_eq!(progress(0), Ok(0));
        assert_eq!(progress(100), Ok(100));
        assert!(progress(-1).is_err());
        assert!(progress(101).is_err());
    }

    #[test]
    fn password_min_length() {
        assert!(password("hunter2").is_err());
        assert!(password("correct horse").is_ok());
    }
}
