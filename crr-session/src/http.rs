//! HTTP exchange seam.
//!
//! The session only needs "POST this body, give me status, Set-Cookie
//! headers and body back". Keeping that behind a trait lets the session be
//! driven by a scripted exchange in tests.

use crate::error::TransportError;
use std::time::Duration;

/// Default whole-request timeout for the blocking agent.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const CONTENT_TYPE: &str = "application/json";

/// One outgoing POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub body: String,
    /// Rendered `Cookie` header, if the jar has anything to send.
    pub cookie: Option<String>,
}

/// What came back, regardless of status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpReply {
    pub status: u16,
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A blocking request/response exchange.
pub trait HttpExchange: Send {
    /// Send one request. Non-2xx statuses are returned as replies, not
    /// errors; only connection-level failures are `Err`.
    fn post(&mut self, request: &HttpRequest) -> Result<HttpReply, TransportError>;

    /// A fresh, independent exchange with the same settings and no shared
    /// connection state.
    fn fork(&self) -> Box<dyn HttpExchange>;
}

/// `ureq` backed exchange.
pub struct UreqExchange {
    agent: ureq::Agent,
    https_only: bool,
    timeout: Duration,
}

impl UreqExchange {
    pub fn new(https_only: bool, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .https_only(https_only)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
            https_only,
            timeout,
        }
    }
}

impl HttpExchange for UreqExchange {
    fn post(&mut self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        let connection_error = |err: ureq::Error| TransportError::Connection {
            url: request.url.clone(),
            message: err.to_string(),
        };

        let mut builder = self
            .agent
            .post(&request.url)
            .header("Content-Type", CONTENT_TYPE)
            .header("Accept", CONTENT_TYPE);
        if let Some(cookie) = &request.cookie {
            builder = builder.header("Cookie", cookie);
        }

        let mut response = builder
            .send(request.body.as_str())
            .map_err(connection_error)?;

        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(connection_error)?;

        Ok(HttpReply {
            status,
            set_cookies,
            body,
        })
    }

    fn fork(&self) -> Box<dyn HttpExchange> {
        Box::new(Self::new(self.https_only, self.timeout))
    }
}
