//! Input checks shared by the authentication gate and the services.
//!
//! Every check fails with [`AppError::Validation`] naming the field.

use crate::error::AppError;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum username length, in characters.
pub const MAX_USERNAME_LEN: usize = 64;

/// Fails unless `value` has between `min` and `max` characters.
///
/// # Errors
///
/// Returns [`AppError::Validation`] when the length is out of range.
pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

/// Trims `value` and fails if nothing is left.
///
/// # Errors
///
/// Returns [`AppError::Validation`] for blank input.
pub fn required(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Like [`required`] for optional fields: `None` passes through.
///
/// # Errors
///
/// Returns [`AppError::Validation`] if a value is present but blank.
pub fn optional(field: &str, value: Option<&str>) -> Result<Option<String>, AppError> {
    value.map(|v| required(field, v)).transpose()
}

/// Normalizes and checks a username.
///
/// # Errors
///
/// Returns [`AppError::Validation`] for blank or overlong names.
pub fn check_username(value: &str) -> Result<String, AppError> {
    let username = required("username", value)?;
    check_length("username", &username, 1, MAX_USERNAME_LEN)?;
    Ok(username)
}

/// Checks the `local@domain.tld` shape: no whitespace, exactly one `@`,
/// and a dot inside the domain with non-empty labels on both sides.
///
/// # Errors
///
/// Returns [`AppError::Validation`] for anything else.
pub fn check_email(value: &str) -> Result<String, AppError> {
    let email = value.trim();
    let invalid = || AppError::Validation("invalid email format".into());

    check_length("email", email, 3, 254)?;
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid());
    };
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return Err(invalid());
    };
    if host.is_empty() || tld.is_empty() {
        return Err(invalid());
    }
    Ok(email.to_string())
}

/// Checks the password policy. The value is never echoed back.
///
/// # Errors
///
/// Returns [`AppError::Validation`] for short passwords.
pub fn check_password(value: &str) -> Result<(), AppError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        for ok in ["a@b.co", "ops.team@status.example.com", "x+tag@d.io"] {
            assert!(check_email(ok).is_ok(), "{ok}");
        }
        for bad in [
            "plain",
            "@example.com",
            "user@",
            "user@example",
            "user@.com",
            "user@example.",
            "us er@example.com",
            "a@b@c.com",
        ] {
            assert!(check_email(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn password_minimum() {
        assert!(check_password("1234567").is_err());
        assert!(check_password("12345678").is_ok());
    }

    #[test]
    fn username_is_trimmed_and_bounded() {
        assert_eq!(check_username("  alice ").ok().as_deref(), Some("alice"));
        assert!(check_username("   ").is_err());
        assert!(check_username(&"u".repeat(MAX_USERNAME_LEN + 1)).is_err());
    }

    #[test]
    fn optional_rejects_blank_but_passes_none() {
        assert!(matches!(optional("title", None), Ok(None)));
        assert!(optional("title", Some("  ")).is_err());
        assert_eq!(
            optional("title", Some(" new ")).ok().flatten().as_deref(),
            Some("new")
        );
    }
}
