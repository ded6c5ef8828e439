// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use datadog_tracing::{
    configuration::{AgentTransport, AgentUrl},
    Error, ErrorCode, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// The HTTP client used by the uploader. The default is a thin wrapper
/// around a blocking `reqwest` client; only the uploader's worker thread
/// ever blocks on it.
pub trait HttpClient: Send + Sync {
    /// Issues a `PUT` against the agent and returns the response. `timeout`
    /// bounds the whole request.
    fn put(
        &self,
        url: &AgentUrl,
        path: &str,
        headers: &[(&'static str, String)],
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<HttpResponse>;
}

pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        ReqwestClient {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        ReqwestClient::new()
    }
}

impl HttpClient for ReqwestClient {
    fn put(
        &self,
        url: &AgentUrl,
        path: &str,
        headers: &[(&'static str, String)],
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<HttpResponse> {
        let base = match url.transport() {
            AgentTransport::Http { base } => base,
            AgentTransport::UnixSocket { .. } => {
                return Err(Error::new(
                    ErrorCode::AgentRequestFailure,
                    format!(
                        "the default HTTP client does not support Unix domain sockets; configure a custom client for {}",
                        url.original()
                    ),
                ));
            }
        };

        let mut request = self
            .client
            .put(format!("{base}{path}"))
            .timeout(timeout)
            .body(body);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().map_err(|e| {
            Error::new(
                ErrorCode::AgentRequestFailure,
                format!("request to the agent failed: {e}"),
            )
        })?;
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        Ok(HttpResponse { status, body })
    }
}
