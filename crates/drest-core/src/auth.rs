use tracing::{info, warn};
use url::Url;

use crate::config::Authentication;
use crate::error::{DrestError, Result};
use crate::transport::{HttpRequest, HttpResponse, Method, RequestBody};

/// Session credentials shared by every request of a client.
#[derive(Debug)]
pub(crate) struct AuthState {
    authentication: Option<Authentication>,
    token: Option<String>,
    cookie: Option<String>,
    authenticated: bool,
}

impl AuthState {
    pub(crate) fn new(authentication: Option<Authentication>) -> Self {
        let mut state = Self {
            authenticated: authentication.is_none(),
            authentication,
            token: None,
            cookie: None,
        };
        let (token, cookie) = match &state.authentication {
            Some(auth) => (auth.token.clone(), auth.cookie.clone()),
            None => (None, None),
        };
        if let Some(token) = token.filter(|value| !value.is_empty()) {
            state.use_token(token);
        }
        if let Some(cookie) = cookie.filter(|value| !value.is_empty()) {
            state.use_cookie(cookie);
        }
        state
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Callers only pass non-empty values.
    fn use_token(&mut self, value: String) {
        self.authenticated = true;
        self.token = Some(value);
    }

    fn use_cookie(&mut self, value: String) {
        self.authenticated = true;
        self.cookie = Some(value);
    }

    /// Credential headers to attach to API requests.
    pub(crate) fn headers(&self) -> Vec<(String, String)> {
        let Some(auth) = &self.authentication else {
            return Vec::new();
        };
        let mut headers = Vec::new();
        if let Some(token) = &self.token {
            headers.push((
                "Authorization".to_string(),
                format!("{} {}", auth.token_type, token),
            ));
        }
        if let Some(cookie) = &self.cookie {
            headers.push(("Cookie".to_string(), format!("{}={cookie}", auth.cookie_name)));
        }
        headers
    }

    pub(crate) fn login_endpoint(&self) -> Option<&str> {
        self.authentication
            .as_ref()
            .map(|auth| auth.login_endpoint.as_str())
    }

    /// Form login against `url`. Redirects are not followed so the session cookie stays visible.
    pub(crate) fn login_request(&self, url: Url) -> Result<HttpRequest> {
        let credentials = self.authentication.as_ref().and_then(|auth| {
            let username = auth.username.as_deref().filter(|value| !value.is_empty())?;
            let password = auth.password.as_deref().filter(|value| !value.is_empty())?;
            Some((username, password))
        });
        let Some((username, password)) = credentials else {
            return Err(DrestError::AuthenticationFailed(
                "No username or password provided".into(),
            ));
        };
        Ok(HttpRequest {
            method: Method::Post,
            url,
            headers: Vec::new(),
            body: RequestBody::Form(vec![
                ("login".to_string(), username.to_string()),
                ("password".to_string(), password.to_string()),
            ]),
            follow_redirects: false,
        })
    }

    pub(crate) fn complete_login(&mut self, response: &HttpResponse) -> Result<()> {
        if response.status >= 400 {
            let body = String::from_utf8_lossy(&response.body).trim().to_string();
            warn!(status = response.status, "login rejected");
            return Err(DrestError::AuthenticationFailed(if body.is_empty() {
                format!("login returned status {}", response.status)
            } else {
                body
            }));
        }
        let name = self
            .authentication
            .as_ref()
            .map(|auth| auth.cookie_name.clone())
            .unwrap_or_default();
        match session_cookie(response, &name) {
            Some(cookie) => {
                info!(cookie = %name, "logged in");
                self.use_cookie(cookie);
                Ok(())
            }
            None => {
                warn!(cookie = %name, "login response carried no session cookie");
                self.authenticated = false;
                Err(DrestError::AuthenticationFailed("Unknown error".into()))
            }
        }
    }
}

/// Value of cookie `name` from the `Set-Cookie` headers of a response.
fn session_cookie(response: &HttpResponse, name: &str) -> Option<String> {
    response.header_values("Set-Cookie").find_map(|header| {
        let pair = header.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        let value = value.trim().trim_matches('"');
        (key.trim() == name && !value.is_empty()).then(|| value.to_string())
    })
}
