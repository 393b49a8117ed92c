//! Instance credentials read from the process environment
//!
//! `main` loads `.env` into the environment before these are read.

use std::fmt;

use super::{Error, Result};

/// Environment variable holding the instance base URL
pub const INSTANCE_URL_VAR: &str = "SERVICENOW_INSTANCE_URL";
/// Environment variable holding the API username
pub const USERNAME_VAR: &str = "SERVICENOW_USERNAME";
/// Environment variable holding the API password
pub const PASSWORD_VAR: &str = "SERVICENOW_PASSWORD";

/// Base URL and basic-auth credentials for one instance
#[derive(Clone)]
pub struct Credentials {
    /// Instance base URL without a trailing slash
    pub instance_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("instance_url", &self.instance_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read all three values from the environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read all three values through `lookup`
    ///
    /// Every missing or blank variable is reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let instance_url = read(INSTANCE_URL_VAR);
        let username = read(USERNAME_VAR);
        let password = read(PASSWORD_VAR);

        match (instance_url, username, password) {
            (Some(instance_url), Some(username), Some(password)) => Ok(Self {
                instance_url: normalize_instance_url(&instance_url)?,
                username,
                password,
            }),
            (instance_url, username, password) => {
                let mut missing = Vec::new();
                if instance_url.is_none() {
                    missing.push(INSTANCE_URL_VAR);
                }
                if username.is_none() {
                    missing.push(USERNAME_VAR);
                }
                if password.is_none() {
                    missing.push(PASSWORD_VAR);
                }
                Err(Error::MissingCredentials(missing))
            }
        }
    }
}

/// Validate the instance URL and strip any trailing slash
fn normalize_instance_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let parsed =
        reqwest::Url::parse(trimmed).map_err(|e| Error::invalid_instance_url(trimmed, e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::invalid_instance_url(
            trimmed,
            "scheme must be http or https",
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
