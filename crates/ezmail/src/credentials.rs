//! Account credentials and the SASL payloads built from them.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Secret used to authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    /// Account password (SMTP AUTH PLAIN/LOGIN, IMAP LOGIN).
    Password(String),
    /// `OAuth2` access token (XOAUTH2 on both protocols).
    OAuth2(String),
}

impl Secret {
    /// Returns the raw secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        match self {
            Self::Password(value) | Self::OAuth2(value) => value,
        }
    }

    /// Returns `"password"` or `"oauth2"`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::OAuth2(_) => "oauth2",
        }
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(<redacted>)", self.kind())
    }
}

/// Identity plus secret for one mailbox account.
///
/// Deserializes from `{"email", "auth_value", "auth_type"}` where
/// `auth_type` is `"password"` (the default) or `"oauth2"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AccountRepr", into = "AccountRepr")]
pub struct Credentials {
    email: String,
    secret: Secret,
}

impl Credentials {
    /// Password credentials.
    #[must_use]
    pub fn password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: Secret::Password(password.into()),
        }
    }

    /// `OAuth2` bearer token credentials.
    #[must_use]
    pub fn oauth2(email: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: Secret::OAuth2(access_token.into()),
        }
    }

    /// Account email address, also the login name.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// The secret.
    #[must_use]
    pub const fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Rejects an empty email or secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`].
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(Error::InvalidInput("account email is required".to_string()));
        }
        if self.secret.expose().is_empty() {
            return Err(Error::InvalidInput(format!("{} must not be empty", self.secret.kind())));
        }
        Ok(())
    }

    /// SASL PLAIN initial response: base64 of `\0user\0password`.
    #[must_use]
    pub fn plain_response(&self) -> String {
        STANDARD.encode(format!("\0{}\0{}", self.email, self.secret.expose()))
    }

    /// XOAUTH2 initial response: base64 of
    /// `user=<email>\x01auth=Bearer <token>\x01\x01`.
    #[must_use]
    pub fn xoauth2_response(&self) -> String {
        STANDARD.encode(format!(
            "user={}\x01auth=Bearer {}\x01\x01",
            self.email,
            self.secret.expose()
        ))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AuthType {
    #[default]
    Password,
    OAuth2,
}

#[derive(Serialize, Deserialize)]
struct AccountRepr {
    email: String,
    #[serde(alias = "password")]
    auth_value: String,
    #[serde(default)]
    auth_type: AuthType,
}

impl TryFrom<AccountRepr> for Credentials {
    type Error = Error;

    fn try_from(repr: AccountRepr) -> Result<Self> {
        let credentials = match repr.auth_type {
            AuthType::Password => Self::password(repr.email, repr.auth_value),
            AuthType::OAuth2 => Self::oauth2(repr.email, repr.auth_value),
        };
        credentials.validate()?;
        Ok(credentials)
    }
}

impl From<Credentials> for AccountRepr {
    fn from(credentials: Credentials) -> Self {
        let (auth_type, auth_value) = match credentials.secret {
            Secret::Password(value) => (AuthType::Password, value),
            Secret::OAuth2(value) => (AuthType::OAuth2, value),
        };
        Self {
            email: credentials.email,
            auth_value,
            auth_type,
        }
    }
}
