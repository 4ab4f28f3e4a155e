use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::auth::AuthState;
use crate::config::{Authentication, ClientConfig, DEFAULT_LOGIN_ENDPOINT};
use crate::error::{DrestError, Result};
use crate::resource::Resource;
use crate::transport::{HttpRequest, Method, RequestBody, ReqwestTransport, Transport};

/// Canned objects per resource name, served instead of hitting the API.
pub type Mocks = HashMap<String, Vec<Value>>;

/// Client for one DREST API.
///
/// Resources are reached by name through [`DrestClient::resource`]. Clones share
/// the same session, so credentials obtained by a login are reused everywhere.
///
/// ```no_run
/// use drest_core::{Authentication, DrestClient};
///
/// let client = DrestClient::builder("my.api.io")
///     .version("v0")
///     .authentication(Authentication::token("secret"))
///     .build()?;
/// let users = client.resource("users");
/// let johns = users.filter("name__icontains", "john").list()?;
/// let mut user = users.get("123")?;
/// user.set("name", "john");
/// user.save()?;
/// # Ok::<(), drest_core::DrestError>(())
/// ```
#[derive(Clone)]
pub struct DrestClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    auth: Mutex<AuthState>,
    mocks: Mocks,
}

impl DrestClient {
    pub fn builder(host: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(ClientConfig::new(host))
    }

    /// # Errors
    /// Returns an error when the configuration is invalid or the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new(config).build()
    }

    /// The resource called `name` (case-insensitive).
    pub fn resource(&self, name: &str) -> Resource {
        Resource::new(self.clone(), name)
    }

    pub fn mocks(&self) -> &Mocks {
        &self.inner.mocks
    }

    pub(crate) fn mock_records(&self, resource: &str) -> Option<&[Value]> {
        self.inner.mocks.get(resource).map(Vec::as_slice)
    }

    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    pub fn version(&self) -> Option<&str> {
        self.inner.config.version.as_deref()
    }

    pub(crate) fn trailing_slash(&self) -> bool {
        self.inner.config.trailing_slash
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth().is_authenticated()
    }

    fn auth(&self) -> MutexGuard<'_, AuthState> {
        self.inner
            .auth
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Absolute URL for `path`, optionally below `prefix` (the API version).
    ///
    /// # Errors
    /// Returns an error when host and path do not form a valid URL.
    pub fn build_url(&self, path: &str, prefix: Option<&str>) -> Result<Url> {
        let mut full = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        if let Some(prefix) = prefix.map(|p| p.trim_end_matches('/')).filter(|p| !p.is_empty()) {
            let prefix = if prefix.starts_with('/') {
                prefix.to_string()
            } else {
                format!("/{prefix}")
            };
            full = format!("{prefix}{full}");
        }
        let config = &self.inner.config;
        let raw = format!("{}://{}{full}", config.scheme, config.host);
        Url::parse(&raw).map_err(|err| DrestError::InvalidConfig(format!("invalid URL `{raw}`: {err}")))
    }

    /// Logs in when the session has no credentials yet.
    fn authenticate(&self) -> Result<()> {
        let mut auth = self.auth();
        if auth.is_authenticated() {
            return Ok(());
        }
        let endpoint = auth
            .login_endpoint()
            .unwrap_or(DEFAULT_LOGIN_ENDPOINT)
            .to_string();
        let request = auth.login_request(self.build_url(&endpoint, None)?)?;
        debug!(url = %request.url, "logging in");
        let response = self.inner.transport.send(&request)?;
        auth.complete_login(&response)
    }

    /// Sends a request below the API version and decodes the JSON answer.
    ///
    /// An empty body (for example after a DELETE) decodes to `Value::Null`.
    ///
    /// # Errors
    /// Returns [`DrestError::AuthenticationFailed`] for 401 answers or failed logins,
    /// [`DrestError::DoesNotExist`] for 404, [`DrestError::BadRequest`] for other
    /// error statuses, and transport or decoding errors otherwise.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        data: Option<Value>,
    ) -> Result<Value> {
        self.authenticate()?;
        let mut url = self.build_url(path, self.version())?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        headers.extend(self.auth().headers());
        let request = HttpRequest {
            method,
            url,
            headers,
            body: data.map_or(RequestBody::Empty, RequestBody::Json),
            follow_redirects: true,
        };
        debug!(%method, url = %request.url, "drest request");
        let response = self.inner.transport.send(&request)?;
        let url = request.url.as_str();
        if let Some(err) = DrestError::from_status(response.status, url, &response.body) {
            warn!(%method, url, status = response.status, "drest request failed");
            return Err(err);
        }
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&response.body).map_err(|err| DrestError::InvalidResponse {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

impl fmt::Display for DrestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version() {
            Some(version) => write!(f, "{}/{version}/", self.host()),
            None => f.write_str(self.host()),
        }
    }
}

impl fmt::Debug for DrestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrestClient")
            .field("config", &self.inner.config)
            .field("mocks", &self.inner.mocks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for [`DrestClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    mocks: Mocks,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            mocks: Mocks::new(),
            transport: None,
        }
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.scheme = scheme.into();
        self
    }

    #[must_use]
    pub fn authentication(mut self, authentication: Authentication) -> Self {
        self.config.authentication = Some(authentication);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    #[must_use]
    pub fn trailing_slash(mut self, enabled: bool) -> Self {
        self.config.trailing_slash = enabled;
        self
    }

    #[must_use]
    pub fn keep_proxies(mut self, enabled: bool) -> Self {
        self.config.keep_proxies = enabled;
        self
    }

    /// Serves `records` whenever `resource` is read.
    #[must_use]
    pub fn mock(mut self, resource: &str, records: Vec<Value>) -> Self {
        self.mocks.insert(resource.to_ascii_lowercase(), records);
        self
    }

    #[must_use]
    pub fn mocks(mut self, mocks: Mocks) -> Self {
        for (resource, records) in mocks {
            self.mocks.insert(resource.to_ascii_lowercase(), records);
        }
        self
    }

    /// Replaces the default reqwest session.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// # Errors
    /// Returns an error when the configuration is invalid or the HTTP client cannot be built.
    pub fn build(self) -> Result<DrestClient> {
        self.config.validate()?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let auth = AuthState::new(self.config.authentication.clone());
        Ok(DrestClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                transport,
                auth: Mutex::new(auth),
                mocks: self.mocks,
            }),
        })
    }
}
