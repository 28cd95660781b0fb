use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::errors::BackendError;

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("compile email pattern");
}

/// Restores the `+` characters of an email address that arrived
/// form-decoded as spaces.
///
/// ```
/// use recipes::normalization::normalize_email;
/// assert_eq!(normalize_email("rick test@example.com"), "rick+test@example.com");
/// ```
pub fn normalize_email(email: impl AsRef<str>) -> String {
    email.as_ref().replace(' ', "+")
}

/// Checks that an (already normalized) email address is usable as a
/// partition identity.
pub fn validate_email(email: &str) -> Result<(), BackendError> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(BackendError::InvalidEmail(email.to_owned()))
    }
}

/// Deserializes a `String` after running it through `normalize_email`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(normalize_email(s))
}
