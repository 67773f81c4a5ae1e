//! Authenticated RPC session.
//!
//! A [`Session`] owns its cookie jar, its HTTP exchange and the identity
//! returned by login. Nothing here is process-global, so several sessions
//! against the same endpoint can coexist.

use crate::api::{Login, RpcChannelExt};
use crate::codec::{self, RpcOutcome};
use crate::cookies::{CookieJar, CookieStoreError};
use crate::error::{SessionError, TransportError};
use crate::http::{DEFAULT_TIMEOUT, HttpExchange, HttpRequest, UreqExchange};
use chrono::Utc;
use crr_common::UserId;
use crr_common::util::{redact_params, render_params};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How much of an error body is kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 512;

/// The one call primitive everything above the transport is written against.
pub trait RpcChannel {
    /// Submit `verb` with positional `params` and return the decoded result.
    fn invoke(&mut self, verb: &str, params: Vec<Value>) -> Result<Value, SessionError>;
}

impl<C: RpcChannel + ?Sized> RpcChannel for Box<C> {
    fn invoke(&mut self, verb: &str, params: Vec<Value>) -> Result<Value, SessionError> {
        (**self).invoke(verb, params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// A validated service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    scheme: Scheme,
}

impl Endpoint {
    /// Accept `http://` and `https://` URLs; anything else is
    /// [`SessionError::UnsupportedScheme`].
    pub fn parse(url: &str) -> Result<Self, SessionError> {
        let trimmed = url.trim();
        let lower = trimmed.to_ascii_lowercase();
        let scheme = if lower.starts_with("https://") {
            Scheme::Https
        } else if lower.starts_with("http://") {
            Scheme::Http
        } else {
            return Err(SessionError::UnsupportedScheme {
                url: trimmed.to_string(),
            });
        };
        Ok(Self {
            url: trimmed.to_string(),
            scheme,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Https
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Persist the cookie jar here after every exchange.
    pub cookie_file: Option<PathBuf>,
    /// Whole-request timeout; `None` uses [`DEFAULT_TIMEOUT`].
    pub timeout: Option<Duration>,
}

/// One authenticated channel to one endpoint.
pub struct Session {
    endpoint: Endpoint,
    credentials: Credentials,
    options: SessionOptions,
    http: Box<dyn HttpExchange>,
    jar: CookieJar,
    user_id: UserId,
    next_id: u64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("username", &self.credentials.username)
            .field("user_id", &self.user_id)
            .field("cookies", &self.jar.len())
            .finish()
    }
}

impl Session {
    /// Open a session over the real network and log in.
    pub fn open(
        url: &str,
        credentials: Credentials,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let endpoint = Endpoint::parse(url)?;
        let timeout = options.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let http = Box::new(UreqExchange::new(endpoint.is_secure(), timeout));
        Self::open_with(endpoint, credentials, options, http)
    }

    /// Open a session over the supplied exchange and log in.
    pub fn open_with(
        endpoint: Endpoint,
        credentials: Credentials,
        options: SessionOptions,
        http: Box<dyn HttpExchange>,
    ) -> Result<Self, SessionError> {
        let jar = options
            .cookie_file
            .as_deref()
            .map(|path| match CookieJar::load(path) {
                Ok(jar) => {
                    debug!(path = %path.display(), cookies = jar.len(), "Loaded cookie jar");
                    jar
                }
                Err(CookieStoreError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    CookieJar::new()
                }
                Err(err) => {
                    warn!(error = %err, code = %err.code(), "Ignoring unusable cookie file");
                    CookieJar::new()
                }
            })
            .unwrap_or_default();

        let mut session = Self {
            endpoint,
            credentials,
            options,
            http,
            jar,
            user_id: UserId::new(0),
            next_id: 1,
        };
        session.login()?;
        Ok(session)
    }

    fn login(&mut self) -> Result<(), SessionError> {
        let request = Login {
            login: self.credentials.username.clone(),
            password: self.credentials.password.clone(),
        };
        let result = self.call(&request).map_err(|err| match err {
            SessionError::RemoteCall { fault, .. } => SessionError::Authentication {
                username: self.credentials.username.clone(),
                fault,
            },
            other => other,
        })?;
        self.user_id = result.id;
        info!(
            endpoint = %self.endpoint,
            username = %self.credentials.username,
            user_id = %self.user_id,
            "Logged in"
        );
        Ok(())
    }

    /// Open a second, independently authenticated session to the same
    /// endpoint. The duplicate has its own empty cookie jar and never
    /// persists it.
    pub fn duplicate(&self) -> Result<Self, SessionError> {
        let options = SessionOptions {
            cookie_file: None,
            ..self.options.clone()
        };
        Self::open_with(
            self.endpoint.clone(),
            self.credentials.clone(),
            options,
            self.http.fork(),
        )
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.jar
    }

    fn absorb_cookies(&mut self, headers: &[String]) {
        let now = Utc::now();
        for header in headers {
            self.jar.merge_set_cookie(header, now);
        }
        if let Some(path) = &self.options.cookie_file
            && let Err(err) = self.jar.save(path)
        {
            warn!(error = %err, code = %err.code(), "Failed to persist cookie jar");
        }
    }
}

impl RpcChannel for Session {
    fn invoke(&mut self, verb: &str, params: Vec<Value>) -> Result<Value, SessionError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = HttpRequest {
            url: self.endpoint.url.clone(),
            body: codec::encode_request(id, verb, &params),
            cookie: self.jar.header_value(self.endpoint.is_secure(), Utc::now()),
        };
        debug!(
            verb,
            id,
            params = %render_params(&redact_params(&params)),
            "RPC request"
        );

        let reply = self.http.post(&request)?;
        self.absorb_cookies(&reply.set_cookies);

        if !reply.is_success() {
            return Err(TransportError::HttpStatus {
                url: self.endpoint.url.clone(),
                status: reply.status,
                body: reply.body.chars().take(ERROR_BODY_LIMIT).collect(),
            }
            .into());
        }

        let outcome = codec::decode_response(id, &reply.body).map_err(|reason| {
            TransportError::MalformedResponse {
                url: self.endpoint.url.clone(),
                reason,
            }
        })?;

        match outcome {
            RpcOutcome::Success(value) => {
                debug!(verb, id, "RPC response");
                Ok(value)
            }
            RpcOutcome::Fault(fault) => {
                debug!(verb, id, code = fault.code, message = %fault.message, "RPC fault");
                Err(SessionError::RemoteCall {
                    verb: verb.to_string(),
                    params: redact_params(&params),
                    fault,
                })
            }
        }
    }
}
