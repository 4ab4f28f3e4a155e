use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::client::DrestClient;
use crate::error::{DrestError, Result};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Replays queued responses in order and records every request it sees.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn push_json(&self, status: u16, body: Value) {
        self.push(HttpResponse {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.to_string().into_bytes(),
        });
    }

    pub(crate) fn push_raw(&self, status: u16, body: &str) {
        self.push(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        });
    }

    pub(crate) fn push_with_cookie(&self, status: u16, cookie: &str) {
        self.push(HttpResponse {
            status,
            headers: vec![("Set-Cookie".into(), cookie.into())],
            body: Vec::new(),
        });
    }

    fn push(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DrestError::Transport {
                url: request.url.to_string(),
                message: "no scripted response left".into(),
            })
    }
}

/// Unauthenticated client without version prefix, backed by `transport`.
pub(crate) fn scripted_client(transport: &Arc<ScriptedTransport>) -> DrestClient {
    DrestClient::builder("api.test")
        .transport(transport.clone())
        .build()
        .unwrap()
}
