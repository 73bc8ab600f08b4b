//! Account identifier type.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// A validated account identifier in `user@domain` form.
///
/// All of the tool's on-disk artifacts are derived from this pair, using the
/// established file naming conventions:
///
/// - archive: `<domain>.user.<username>.json`
/// - split continuations: `<domain>.user.<username>.<N>.json`
/// - media directory: `<domain>.user.<username>`
/// - app secret: `<domain>.client.secret`
/// - user secret: `<domain>.user.<username>.secret`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccountId {
    username: String,
    domain: String,
}

impl AccountId {
    /// Parse an account identifier like `alice@example.org`.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref().trim().trim_start_matches('@');

        let (username, domain) = s.split_once('@').ok_or_else(|| InvalidInputError::Account {
            value: s.to_string(),
            reason: "expected user@domain".to_string(),
        })?;

        if username.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(InvalidInputError::Account {
                value: s.to_string(),
                reason: "expected exactly one '@' separating user and domain".to_string(),
            }
            .into());
        }

        Ok(Self {
            username: username.to_string(),
            domain: domain.to_string(),
        })
    }

    /// Build an account identifier from already-validated parts.
    pub fn from_parts(username: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            domain: domain.into(),
        }
    }

    /// The local username, without the domain.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The instance domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Base URL of the account's instance.
    pub fn base_url(&self) -> String {
        format!("https://{}", self.domain)
    }

    /// Primary archive file name.
    pub fn archive_file(&self) -> String {
        format!("{}.user.{}.json", self.domain, self.username)
    }

    /// Name of the n-th split continuation file.
    pub fn split_file(&self, n: u32) -> String {
        format!("{}.user.{}.{}.json", self.domain, self.username, n)
    }

    /// Directory for downloaded media.
    pub fn media_dir(&self) -> String {
        format!("{}.user.{}", self.domain, self.username)
    }

    /// File holding the registered app's client credentials.
    pub fn client_secret_file(&self) -> String {
        format!("{}.client.secret", self.domain)
    }

    /// File holding the user's access token.
    pub fn user_secret_file(&self) -> String {
        format!("{}.user.{}.secret", self.domain, self.username)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.domain)
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_at_domain() {
        let account = AccountId::new("alice@example.org").unwrap();
        assert_eq!(account.username(), "alice");
        assert_eq!(account.domain(), "example.org");
        assert_eq!(account.to_string(), "alice@example.org");
    }

    #[test]
    fn accepts_leading_at_sign() {
        let account = AccountId::new("@alice@example.org").unwrap();
        assert_eq!(account.username(), "alice");
    }

    #[test]
    fn rejects_bare_username() {
        assert!(AccountId::new("alice").is_err());
    }

    #[test]
    fn rejects_double_at() {
        assert!(AccountId::new("a@b@c").is_err());
    }

    #[test]
    fn file_naming_conventions() {
        let account = AccountId::new("alice@example.org").unwrap();
        assert_eq!(account.archive_file(), "example.org.user.alice.json");
        assert_eq!(account.split_file(0), "example.org.user.alice.0.json");
        assert_eq!(account.media_dir(), "example.org.user.alice");
        assert_eq!(account.client_secret_file(), "example.org.client.secret");
        assert_eq!(account.user_secret_file(), "example.org.user.alice.secret");
        assert_eq!(account.base_url(), "https://example.org");
    }
}
