//! Runtime secret resolution.
//!
//! Config files hold environment variable NAMES only. Credentials are read
//! from the environment once at startup and passed to the client; errors name
//! the variable, never its value.

use anyhow::{bail, Result};

use crate::ExporterConfig;

/// Basic-auth credentials resolved from the environment.
///
/// Values are redacted in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedSecrets {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ResolvedSecrets {
    /// `(username, password)` when basic auth is configured.
    pub fn basic_auth(&self) -> Option<(&str, Option<&str>)> {
        self.username
            .as_deref()
            .map(|user| (user, self.password.as_deref()))
    }
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("username", &self.username.as_ref().map(|_| "<REDACTED>"))
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Resolve credentials from the process environment.
pub fn resolve_secrets(config: &ExporterConfig) -> Result<ResolvedSecrets> {
    resolve_secrets_with(config, |name| std::env::var(name).ok())
}

/// Resolve credentials through `lookup` (name -> value).
///
/// - No `username_env`: no auth; a lone `password_env` is an error.
/// - A named variable that is unset or blank is an error.
pub fn resolve_secrets_with<F>(config: &ExporterConfig, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let auth = &config.elasticsearch.auth;
    let required = |var: &str| -> Result<String> {
        match lookup(var) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => bail!("SECRETS_MISSING: env var '{var}' is not set or empty"),
        }
    };

    let Some(user_var) = non_blank(auth.username_env.as_deref()) else {
        if let Some(pass_var) = non_blank(auth.password_env.as_deref()) {
            bail!(
                "SECRETS_INVALID: password_env '{pass_var}' is set without username_env"
            );
        }
        return Ok(ResolvedSecrets::default());
    };

    let username = required(user_var)?;
    let password = match non_blank(auth.password_env.as_deref()) {
        Some(pass_var) => Some(required(pass_var)?),
        None => None,
    };

    Ok(ResolvedSecrets {
        username: Some(username),
        password,
    })
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
