//! Account credentials and run settings.
//!
//! Everything is read from the environment so that real credentials never
//! live in the repository.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://petfriends.skillfactory.ru/";

/// Email/password pair used to request an API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Settings for a scenario run
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub valid: Credentials,
    pub invalid: Credentials,
    /// Photo attached by the "with photo" scenarios
    pub photo: PathBuf,
    /// Second photo, used where the suite wants a different picture
    pub alt_photo: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Self {
            base_url: get("PETFRIENDS_BASE_URL", DEFAULT_BASE_URL),
            valid: Credentials::new(get("PETFRIENDS_EMAIL", ""), get("PETFRIENDS_PASSWORD", "")),
            invalid: Credentials::new(
                get("PETFRIENDS_INVALID_EMAIL", "no-such-user@example.com"),
                get("PETFRIENDS_INVALID_PASSWORD", "not-the-password"),
            ),
            photo: get("PETFRIENDS_PHOTO", "images/cat1.jpg").into(),
            alt_photo: get("PETFRIENDS_ALT_PHOTO", "images/dog01.jpg").into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.photo, PathBuf::from("images/cat1.jpg"));
        assert_eq!(settings.alt_photo, PathBuf::from("images/dog01.jpg"));
        assert_ne!(settings.valid, settings.invalid);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PETFRIENDS_BASE_URL", "http://127.0.0.1:3000/"),
            ("PETFRIENDS_EMAIL", "me@example.com"),
            ("PETFRIENDS_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        let settings = Settings::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(settings.base_url, "http://127.0.0.1:3000/");
        assert_eq!(settings.valid, Credentials::new("me@example.com", "secret"));
        assert_eq!(settings.invalid.password, "not-the-password");
    }
}
