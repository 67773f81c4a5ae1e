//! Session transport for the case run reporter.
//!
//! Opens one authenticated, cookie-carrying RPC channel to a test-management
//! service and exposes a single blocking call primitive plus a typed verb
//! catalog on top of it.

#![forbid(unsafe_code)]

pub mod api;
pub mod codec;
pub mod cookies;
pub mod error;
pub mod http;
pub mod session;

pub use api::{RpcChannelExt, RpcRequest};
pub use cookies::{CookieJar, CookieStoreError};
pub use error::{RpcFault, SessionError, TransportError};
pub use http::{HttpExchange, HttpReply, HttpRequest, UreqExchange};
pub use session::{Credentials, Endpoint, RpcChannel, Scheme, Session, SessionOptions};
