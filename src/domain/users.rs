//! Username and password rules applied before an account is persisted.

use super::error::DomainError;

pub const USERNAME_MAX_LEN: usize = 150;
pub const PASSWORD_MIN_LEN: usize = 8;

/// Usernames are 1..=150 characters of letters, digits and `@ . + - _`.
///
/// Paths such as `/new/` and `/follow/` share the URL namespace with
/// profiles, so those words are reserved.
pub fn validate_username(username: &str) -> Result<(), DomainError> {
    if username.is_empty() {
        return Err(DomainError::validation("username", "This field is required."));
    }

    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(DomainError::validation(
            "username",
            format!("Ensure this value has at most {USERNAME_MAX_LEN} characters."),
        ));
    }

    let allowed = username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'));
    if !allowed {
        return Err(DomainError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }

    if RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(username))
    {
        return Err(DomainError::validation(
            "username",
            "This username is reserved.",
        ));
    }

    Ok(())
}

const RESERVED_USERNAMES: &[&str] = &["new", "follow", "group", "auth", "media", "static", "_health"];

pub fn validate_password(password: &str, confirmation: &str) -> Result<(), DomainError> {
    if password != confirmation {
        return Err(DomainError::validation(
            "password2",
            "The two password fields didn't match.",
        ));
    }

    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(DomainError::validation(
            "password2",
            format!(
                "This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."
            ),
        ));
    }

    if password.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(DomainError::validation(
            "password2",
            "This password is entirely numeric.",
        ));
    }

    Ok(())
}
