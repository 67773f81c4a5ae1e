//! Stateful reporter facade.
//!
//! A [`Driver`] owns one channel and the current [`Context`]. It enforces
//! the state order (unbound, then product-bound, then case-run-bound) and
//! resets the context on every rebind.

use crate::context::{CaseRunContext, Context, ContextState, ProductContext};
use crate::error::{ReconcileError, ResourceKind};
use crate::reconcile::{self, CaseSelector, ExecutionIdentity, ExecutionReport};
use crate::status::CaseRunStatus;
use crr_common::{ReporterConfig, UserId};
use crr_session::api::LookupUserId;
use crr_session::{Credentials, RpcChannel, RpcChannelExt, Session, SessionOptions};
use tracing::{info, warn};

pub struct Driver<C: RpcChannel = Session> {
    channel: C,
    identity: ExecutionIdentity,
    context: Context,
}

impl Driver<Session> {
    /// Open and authenticate a session from configuration, then resolve
    /// the automation user.
    pub fn open(config: &ReporterConfig) -> Result<Self, ReconcileError> {
        let session = Session::open(
            &config.server.url,
            Credentials::new(&config.server.username, &config.server.password),
            SessionOptions {
                cookie_file: config.server.cookie_file.clone(),
                timeout: None,
            },
        )?;
        Self::from_channel(session, config)
    }

    /// A second driver with its own authenticated session and private
    /// cookie jar. It starts unbound.
    pub fn duplicate(&self) -> Result<Self, ReconcileError> {
        let session = self.channel.duplicate()?;
        Ok(Self::new(session, self.identity.clone()))
    }
}

impl<C: RpcChannel> Driver<C> {
    pub fn new(channel: C, identity: ExecutionIdentity) -> Self {
        Self {
            channel,
            identity,
            context: Context::Unbound,
        }
    }

    /// Build the identity from configuration over an existing channel,
    /// looking up `automation_login` when one is configured.
    pub fn from_channel(mut channel: C, config: &ReporterConfig) -> Result<Self, ReconcileError> {
        let automation_user = match config.run.automation_login.as_deref() {
            Some(login) if !login.trim().is_empty() => {
                let id = channel.call(&LookupUserId {
                    login: login.to_string(),
                })?;
                if id.get() == 0 {
                    return Err(ReconcileError::NotFound {
                        kind: ResourceKind::User,
                        key: login.to_string(),
                    });
                }
                info!(login, user_id = %id, "Resolved automation user");
                id
            }
            _ => UserId::new(config.run.automation_user_id),
        };
        let identity = ExecutionIdentity::from_config(config, automation_user);
        Ok(Self::new(channel, identity))
    }

    pub fn identity(&self) -> &ExecutionIdentity {
        &self.identity
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn state(&self) -> ContextState {
        self.context.state()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Bind to `product_name`. Any previous binding is discarded first, so
    /// on failure the driver is unbound.
    pub fn bind_product(&mut self, product_name: &str) -> Result<&ProductContext, ReconcileError> {
        self.context = Context::Unbound;
        let bound = reconcile::bind_product(&mut self.channel, &self.identity, product_name)
            .inspect_err(|err| warn!(product = product_name, error = %err, "Product binding failed"))?;
        self.context = Context::ProductBound(bound);
        self.require_product("bind product")
    }

    /// Bind the test case to report on. Requires a bound product; any
    /// previous case run is discarded first.
    pub fn bind_case_run(
        &mut self,
        selector: &CaseSelector,
    ) -> Result<&CaseRunContext, ReconcileError> {
        self.context = std::mem::take(&mut self.context).without_case_run();
        let product = self.require_product("bind case run")?.clone();
        let bound = reconcile::bind_case_run(&mut self.channel, &product, selector)?;
        self.context = Context::CaseRunBound(bound);
        self.require_case_run("bind case run")
    }

    /// Report `status` for the bound case run.
    pub fn execute_case_run(
        &mut self,
        status: CaseRunStatus,
    ) -> Result<ExecutionReport, ReconcileError> {
        let case_run = self.require_case_run("execute case run")?.clone();
        reconcile::execute_case_run(&mut self.channel, &self.identity, &case_run, status)
    }

    fn require_product(&self, operation: &'static str) -> Result<&ProductContext, ReconcileError> {
        self.context
            .product()
            .ok_or(ReconcileError::InvalidState {
                operation,
                required: ContextState::ProductBound,
                actual: self.context.state(),
            })
    }

    fn require_case_run(
        &self,
        operation: &'static str,
    ) -> Result<&CaseRunContext, ReconcileError> {
        self.context
            .case_run()
            .ok_or(ReconcileError::InvalidState {
                operation,
                required: ContextState::CaseRunBound,
                actual: self.context.state(),
            })
    }
}
