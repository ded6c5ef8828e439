// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use crate::{Error, ErrorCode};

/// How the uploader reaches the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentTransport {
    /// Plain TCP, `base` is `http(s)://host[:port]` without a trailing slash.
    Http { base: String },
    /// A Unix domain socket at an absolute `path`.
    UnixSocket { path: PathBuf },
}

/// A validated agent URL. Accepted schemes are `http`, `https`, `unix`,
/// `http+unix`, and `https+unix`; Unix socket paths must be absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentUrl {
    original: String,
    transport: AgentTransport,
}

impl AgentUrl {
    pub fn parse(input: &str) -> Result<AgentUrl, Error> {
        let Some((scheme, rest)) = input.split_once("://") else {
            return Err(Error::new(
                ErrorCode::UrlMissingSeparator,
                format!("agent URL is missing the \"://\" separator: {input:?}"),
            ));
        };

        let transport = match scheme {
            "http" | "https" => AgentTransport::Http {
                base: input.trim_end_matches('/').to_string(),
            },
            "unix" | "http+unix" | "https+unix" => {
                if !rest.starts_with('/') {
                    return Err(Error::new(
                        ErrorCode::UrlUnixDomainSocketPathNotAbsolute,
                        format!("Unix domain socket paths must be absolute: {input:?}"),
                    ));
                }
                AgentTransport::UnixSocket {
                    path: PathBuf::from(rest),
                }
            }
            other => {
                return Err(Error::new(
                    ErrorCode::UrlUnsupportedScheme,
                    format!(
                        "unsupported URI scheme {other:?} in agent URL {input:?}; expected one of http, https, unix, http+unix, https+unix"
                    ),
                ));
            }
        };

        Ok(AgentUrl {
            original: input.to_string(),
            transport,
        })
    }

    /// Builds the default URL from an agent host and port.
    pub fn from_host_port(host: &str, port: u16) -> AgentUrl {
        AgentUrl {
            original: format!("http://{host}:{port}"),
            transport: AgentTransport::Http {
                base: format!("http://{host}:{port}"),
            },
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn transport(&self) -> &AgentTransport {
        &self.transport
    }

    /// The full URL of the trace intake endpoint.
    pub fn traces_endpoint(&self) -> String {
        match &self.transport {
            AgentTransport::Http { base } => format!("{base}/v0.4/traces"),
            // The request URI is nominal for UDS transports; the socket path
            // selects the peer.
            AgentTransport::UnixSocket { .. } => "http://localhost/v0.4/traces".to_string(),
        }
    }
}

impl Default for AgentUrl {
    fn default() -> Self {
        AgentUrl::from_host_port("localhost", 8126)
    }
}
