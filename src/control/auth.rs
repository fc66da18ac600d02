//! Login payload construction.

use std::fmt;

use super::handshake::AuthMethod;
use crate::error::{Result, RserveError};

/// Transforms a plaintext password with the server's salt.
///
/// The transform itself is supplied by the caller; any
/// `Fn(&str, &str) -> String` closure works.
pub trait PasswordObfuscator: Send + Sync {
    /// Obfuscate `password` using `salt`.
    fn obfuscate(&self, password: &str, salt: &str) -> String;
}

impl<F> PasswordObfuscator for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn obfuscate(&self, password: &str, salt: &str) -> String {
        self(password, salt)
    }
}

/// User name and password. `Debug` never shows the password.
#[derive(Clone, Default)]
pub struct Credentials {
    /// User name.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
}

impl Credentials {
    /// Credentials with both parts set.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            password: Some(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The string parameter sent with the login command, or `None` when the
/// server needs no login.
pub fn login_payload(
    auth: &AuthMethod,
    credentials: &Credentials,
    obfuscator: Option<&dyn PasswordObfuscator>,
) -> Result<Option<String>> {
    if *auth == AuthMethod::None {
        return Ok(None);
    }
    let user = credentials
        .user
        .as_deref()
        .ok_or(RserveError::MissingCredentials("user"))?;
    let password = credentials
        .password
        .as_deref()
        .ok_or(RserveError::MissingCredentials("password"))?;

    let password = match auth {
        AuthMethod::Crypt { salt } => {
            let obfuscator = obfuscator.ok_or_else(|| {
                RserveError::UnsupportedAuth(
                    "server requires obfuscated login but no password obfuscator is configured"
                        .into(),
                )
            })?;
            obfuscator.obfuscate(password, salt)
        }
        _ => password.to_owned(),
    };
    Ok(Some(format!("{user}\n{password}")))
}
