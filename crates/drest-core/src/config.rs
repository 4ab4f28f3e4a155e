use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::error::{DrestError, Result};
use crate::net;

pub const DEFAULT_SCHEME: &str = "https";
pub const DEFAULT_TOKEN_TYPE: &str = "JWT";
pub const DEFAULT_COOKIE_NAME: &str = "sessionid";
pub const DEFAULT_LOGIN_ENDPOINT: &str = "/accounts/login/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    /// Non-empty value of `key`, trimmed.
    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn raw(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub(crate) fn flag(&self, key: &str) -> Option<bool> {
        self.raw(key).map(|raw| {
            let value = raw.trim().to_ascii_lowercase();
            !matches!(value.as_str(), "" | "0" | "false" | "no" | "off")
        })
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Credentials for a DREST API. Token, cookie, or username/password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    pub token: Option<String>,
    pub token_type: String,
    pub cookie: Option<String>,
    pub cookie_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub login_endpoint: String,
}

impl Default for Authentication {
    fn default() -> Self {
        Self {
            token: None,
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            cookie: None,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            username: None,
            password: None,
            login_endpoint: DEFAULT_LOGIN_ENDPOINT.to_string(),
        }
    }
}

impl Authentication {
    #[must_use]
    pub fn token(value: impl Into<String>) -> Self {
        Self {
            token: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn cookie(value: impl Into<String>) -> Self {
        Self {
            cookie: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    #[must_use]
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    #[must_use]
    pub fn with_login_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.login_endpoint = endpoint.into();
        self
    }

    fn from_snapshot(snapshot: &EnvSnapshot) -> Option<Self> {
        let mut auth = Self {
            token: snapshot.var("DREST_TOKEN").map(ToOwned::to_owned),
            cookie: snapshot.var("DREST_COOKIE").map(ToOwned::to_owned),
            username: snapshot.var("DREST_USERNAME").map(ToOwned::to_owned),
            password: snapshot.raw("DREST_PASSWORD").map(ToOwned::to_owned),
            ..Self::default()
        };
        if auth.token.is_none()
            && auth.cookie.is_none()
            && auth.username.is_none()
            && auth.password.is_none()
        {
            return None;
        }
        if let Some(value) = snapshot.var("DREST_TOKEN_TYPE") {
            auth.token_type = value.to_string();
        }
        if let Some(value) = snapshot.var("DREST_COOKIE_NAME") {
            auth.cookie_name = value.to_string();
        }
        if let Some(value) = snapshot.var("DREST_LOGIN_ENDPOINT") {
            auth.login_endpoint = value.to_string();
        }
        Some(auth)
    }
}

/// Everything needed to talk to one DREST deployment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub version: Option<String>,
    pub scheme: String,
    pub timeout: Duration,
    pub trailing_slash: bool,
    pub keep_proxies: bool,
    pub authentication: Option<Authentication>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            version: None,
            scheme: DEFAULT_SCHEME.to_string(),
            timeout: DEFAULT_TIMEOUT,
            trailing_slash: false,
            keep_proxies: false,
            authentication: None,
        }
    }

    /// Builds a configuration from `DREST_*` variables of the current process.
    ///
    /// # Errors
    /// Returns an error when `DREST_HOST` is missing or a value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture(), None)
    }

    /// Like [`ClientConfig::from_env`], with `host` taking precedence over `DREST_HOST`.
    ///
    /// # Errors
    /// Returns an error when no host is known or a value cannot be parsed.
    pub fn from_env_with_host(host: Option<&str>) -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture(), host)
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot, host: Option<&str>) -> Result<Self> {
        let host = host
            .or_else(|| snapshot.var("DREST_HOST"))
            .ok_or_else(|| DrestError::InvalidConfig("DREST_HOST is not set".into()))?;
        let timeout = match snapshot.var("DREST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|err| {
                DrestError::InvalidConfig(format!("DREST_TIMEOUT_SECS `{raw}`: {err}"))
            })?),
            None => DEFAULT_TIMEOUT,
        };
        let config = Self {
            host: host.to_string(),
            version: snapshot.var("DREST_API_VERSION").map(ToOwned::to_owned),
            scheme: snapshot
                .var("DREST_SCHEME")
                .unwrap_or(DEFAULT_SCHEME)
                .to_string(),
            timeout,
            trailing_slash: snapshot.flag("DREST_TRAILING_SLASH").unwrap_or(false),
            keep_proxies: net::keep_proxies(snapshot),
            authentication: Authentication::from_snapshot(snapshot),
        };
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DrestError::InvalidConfig("host is empty".into()));
        }
        if self.host.contains("://") {
            return Err(DrestError::InvalidConfig(format!(
                "host `{}` must not include a scheme; set the scheme separately",
                self.host
            )));
        }
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(DrestError::InvalidConfig(format!(
                "unsupported scheme `{}`",
                self.scheme
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn snapshot_requires_host() {
        let err = ClientConfig::from_snapshot(&EnvSnapshot::testing(&[]), None).unwrap_err();
        assert_eq!(err.code(), "DR100");
    }

    #[test]
    fn snapshot_applies_defaults() {
        let config =
            ClientConfig::from_snapshot(&EnvSnapshot::testing(&[("DREST_HOST", "api.test")]), None)
                .unwrap();
        assert_eq!(config.host, "api.test");
        assert_eq!(config.scheme, "https");
        assert_eq!(config.version, None);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(!config.trailing_slash);
        assert!(config.authentication.is_none());
    }

    #[test]
    fn snapshot_reads_authentication() {
        let config = ClientConfig::from_snapshot(&EnvSnapshot::testing(&[
            ("DREST_HOST", "api.test"),
            ("DREST_API_VERSION", "v0"),
            ("DREST_SCHEME", "http"),
            ("DREST_TIMEOUT_SECS", "5"),
            ("DREST_TRAILING_SLASH", "1"),
            ("DREST_TOKEN", "secret"),
            ("DREST_TOKEN_TYPE", "Token"),
        ]), None)
        .unwrap();
        assert_eq!(config.version.as_deref(), Some("v0"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.trailing_slash);
        let auth = config.authentication.unwrap();
        assert_eq!(auth.token.as_deref(), Some("secret"));
        assert_eq!(auth.token_type, "Token");
        assert_eq!(auth.cookie_name, DEFAULT_COOKIE_NAME);
        assert_eq!(auth.login_endpoint, DEFAULT_LOGIN_ENDPOINT);
    }

    #[test]
    fn snapshot_rejects_bad_values() {
        let bad_timeout = ClientConfig::from_snapshot(&EnvSnapshot::testing(&[
            ("DREST_HOST", "api.test"),
            ("DREST_TIMEOUT_SECS", "soon"),
        ]), None);
        assert!(bad_timeout.is_err());
        let bad_scheme = ClientConfig::from_snapshot(&EnvSnapshot::testing(&[
            ("DREST_HOST", "api.test"),
            ("DREST_SCHEME", "ftp"),
        ]), None);
        assert!(bad_scheme.is_err());
        let scheme_in_host = ClientConfig::from_snapshot(&EnvSnapshot::testing(&[(
            "DREST_HOST",
            "https://api.test",
        )]), None);
        assert!(scheme_in_host.is_err());
    }

    #[test]
    fn explicit_host_beats_environment() {
        let config = ClientConfig::from_snapshot(
            &EnvSnapshot::testing(&[("DREST_HOST", "env.test"), ("DREST_COOKIE", "c")]),
            Some("flag.test"),
        )
        .unwrap();
        assert_eq!(config.host, "flag.test");
        assert_eq!(config.authentication.unwrap().cookie.as_deref(), Some("c"));
    }

    #[test]
    #[serial]
    fn from_env_reads_process_environment() {
        env::set_var("DREST_HOST", "env.api.test");
        env::set_var("DREST_USERNAME", "joe");
        env::set_var("DREST_PASSWORD", "pw");
        let config = ClientConfig::from_env();
        env::remove_var("DREST_HOST");
        env::remove_var("DREST_USERNAME");
        env::remove_var("DREST_PASSWORD");
        let config = config.unwrap();
        assert_eq!(config.host, "env.api.test");
        let auth = config.authentication.unwrap();
        assert_eq!(auth.username.as_deref(), Some("joe"));
        assert_eq!(auth.password.as_deref(), Some("pw"));
    }
}
