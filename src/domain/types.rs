//! Validated value types shared across layers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

pub const USERNAME_MAX_LEN: usize = 150;
pub const GROUP_SLUG_MAX_LEN: usize = 25;
pub const GROUP_TITLE_MAX_LEN: usize = 200;

/// Identity of an author or reader.
///
/// Any syntactically valid username is accepted; the user directory lives
/// outside this crate, so "unknown" users simply have no posts or follows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("username", "must not be empty"));
        }
        if trimmed.chars().count() > USERNAME_MAX_LEN {
            return Err(DomainError::validation(
                "username",
                format!("must be at most {USERNAME_MAX_LEN} characters"),
            ));
        }
        if let Some(bad) = trimmed.chars().find(|ch| !is_username_char(*ch)) {
            return Err(DomainError::validation(
                "username",
                format!("character `{bad}` is not allowed"),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_username_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_')
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

/// URL identifier of a group. Immutable once the group exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupSlug(String);

impl GroupSlug {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::validation("slug", "must not be empty"));
        }
        if value.len() > GROUP_SLUG_MAX_LEN {
            return Err(DomainError::validation(
                "slug",
                format!("must be at most {GROUP_SLUG_MAX_LEN} characters"),
            ));
        }
        let well_formed = value
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');
        if !well_formed || value.starts_with('-') || value.ends_with('-') {
            return Err(DomainError::validation(
                "slug",
                "only lowercase letters, digits and inner hyphens are allowed",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GroupSlug {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<GroupSlug> for String {
    fn from(value: GroupSlug) -> Self {
        value.0
    }
}

/// Normalise a post or comment body, rejecting blank input.
pub fn normalize_text(field: &'static str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be blank"));
    }
    Ok(trimmed.to_string())
}
