//! Lookup-or-create reconciliation.
//!
//! The functions here are stateless: they take a channel, the execution
//! identity and the context bound so far, and return the next context.
//! [`crate::driver::Driver`] owns the current value.

use crate::context::{CaseRunContext, Created, ProductContext};
use crate::error::{ReconcileError, ResourceKind};
use crate::resolve::{Matcher, OnZero, Resolution, resolve_singleton, resolve_with_tiebreak};
use crate::status::CaseRunStatus;
use crr_common::config::DEFAULT_PRODUCT_VERSION;
use crr_common::{Build, CaseId, Environment, ReporterConfig, TestCase, TestPlan, TestRun, UserId};
use crr_session::RpcChannel;
use crr_session::RpcChannelExt;
use crr_session::api::{
    CheckProduct, CreateBuild, CreateCaseRun, CreateEnvironment, CreateRun, GetBuilds, GetCase,
    GetEnvironments, GetPlanCases, GetPlanRuns, GetRunCases, ListPlans, UpdateCaseRun,
};
use tracing::{debug, info, warn};

/// Marker that tags runs created by automation.
pub const AUTOMATED_MARKER: &str = "automated";

/// Prefix of environments created when none matches.
pub const PLACEHOLDER_PREFIX: &str = "placeholder - ";

/// Everything that identifies one CI execution, fixed for the lifetime of a
/// driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionIdentity {
    pub branch: String,
    pub commit: String,
    pub milestone: String,
    pub environment: String,
    pub product_version: String,
    pub build_date: String,
    /// Manager of created runs and assignee of created case runs.
    pub automation_user: UserId,
}

impl ExecutionIdentity {
    /// Take the identity from configuration. An unset build date becomes
    /// today's UTC date.
    pub fn from_config(config: &ReporterConfig, automation_user: UserId) -> Self {
        let build_date = config
            .build
            .date
            .clone()
            .filter(|date| !date.trim().is_empty())
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string());
        let product_version = if config.run.product_version.trim().is_empty() {
            DEFAULT_PRODUCT_VERSION.to_string()
        } else {
            config.run.product_version.clone()
        };
        Self {
            branch: config.build.branch.clone(),
            commit: config.build.commit.clone(),
            milestone: config.build.milestone.clone(),
            environment: config.run.environment.clone(),
            product_version,
            build_date,
            automation_user,
        }
    }

    pub fn placeholder_environment_name(&self) -> String {
        format!("{PLACEHOLDER_PREFIX}{}", self.environment)
    }

    pub fn build_name(&self) -> String {
        format!("{}:{}", self.branch, self.commit)
    }

    pub fn run_summary(&self) -> String {
        format!("{} - {AUTOMATED_MARKER}", self.build_date)
    }
}

/// How the test case of a case run is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseSelector {
    /// Case-insensitive exact alias among the plan's automated cases.
    Alias(String),
    /// Fetched directly. Membership in the bound plan is not checked.
    Id(CaseId),
}

/// Result of reporting one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    pub case_run_created: bool,
    pub status: CaseRunStatus,
}

/// Resolve product, plan, environment, build and automated run, creating
/// the last three when absent.
pub fn bind_product<C>(
    channel: &mut C,
    identity: &ExecutionIdentity,
    product_name: &str,
) -> Result<ProductContext, ReconcileError>
where
    C: RpcChannel + ?Sized,
{
    let mut created = Created::default();

    let products = channel.call(&CheckProduct {
        name: product_name.to_string(),
    })?;
    let product = found(
        resolve_singleton(
            ResourceKind::Product,
            product_name,
            products.0,
            OnZero::NotFound,
            |p| p.name == product_name,
        )?,
        ResourceKind::Product,
        product_name,
    )?;
    debug!(product = %product.name, id = %product.id, "Resolved product");

    let plan = resolve_plan(channel, identity, &product.name, product.id)?;

    let environment = match resolve_environment(channel, identity, product.id)? {
        Some(environment) => environment,
        None => {
            created.environment = true;
            create_environment(channel, identity, product.id)?
        }
    };

    let build = match resolve_build(channel, identity, product.id)? {
        Some(build) => build,
        None => {
            created.build = true;
            create_build(channel, identity, product.id)?
        }
    };

    let partial = (&plan, &environment, &build);
    let run = match resolve_run(channel, partial)? {
        Some(run) => run,
        None => {
            created.run = true;
            create_run(channel, identity, partial)?
        }
    };

    info!(
        product = %product.name,
        plan = %plan.plan_id,
        environment = %environment.environment_id,
        build = %build.build_id,
        run = %run.run_id,
        "Product context bound"
    );

    Ok(ProductContext {
        product,
        plan,
        environment,
        build,
        run,
        created,
    })
}

fn found<T>(
    resolution: Resolution<T>,
    kind: ResourceKind,
    key: &str,
) -> Result<T, ReconcileError> {
    match resolution {
        Resolution::Found(value) => Ok(value),
        Resolution::Missing => Err(ReconcileError::NotFound {
            kind,
            key: key.to_string(),
        }),
    }
}

fn optional<T>(resolution: Resolution<T>) -> Option<T> {
    match resolution {
        Resolution::Found(value) => Some(value),
        Resolution::Missing => None,
    }
}

fn resolve_plan<C: RpcChannel + ?Sized>(
    channel: &mut C,
    identity: &ExecutionIdentity,
    product_name: &str,
    product_id: crr_common::ProductId,
) -> Result<TestPlan, ReconcileError> {
    let matcher = Matcher::plan(product_name, &identity.branch)?;
    let plans = channel.call(&ListPlans { product_id })?;
    let key = matcher.as_str().to_string();
    let plan = found(
        resolve_singleton(ResourceKind::TestPlan, &key, plans, OnZero::NotFound, |p| {
            matcher.is_match(&p.name)
        })?,
        ResourceKind::TestPlan,
        &key,
    )?;
    debug!(plan = %plan.name, id = %plan.plan_id, "Resolved test plan");
    Ok(plan)
}

fn resolve_environment<C: RpcChannel + ?Sized>(
    channel: &mut C,
    identity: &ExecutionIdentity,
    product_id: crr_common::ProductId,
) -> Result<Option<Environment>, ReconcileError> {
    let matcher = Matcher::suffix(&identity.environment)?;
    let environments = channel.call(&GetEnvironments { product_id })?;
    let environment = optional(resolve_singleton(
        ResourceKind::Environment,
        &identity.environment,
        environments,
        OnZero::Create,
        |e| matcher.is_match(&e.name),
    )?);
    if let Some(env) = &environment {
        if !env.isactive {
            warn!(environment = %env.name, id = %env.environment_id, "Using inactive environment");
        }
        debug!(environment = %env.name, id = %env.environment_id, "Resolved environment");
    }
    Ok(environment)
}

fn create_environment<C: RpcChannel + ?Sized>(
    channel: &mut C,
    identity: &ExecutionIdentity,
    product_id: crr_common::ProductId,
) -> Result<Environment, ReconcileError> {
    let name = identity.placeholder_environment_name();
    let mut environment = channel.call(&CreateEnvironment {
        product_id,
        isactive: true,
        name: Some(name.clone()),
    })?;
    if environment.name.is_empty() {
        environment.name = name;
    }
    info!(environment = %environment.name, id = %environment.environment_id, "Created placeholder environment");
    Ok(environment)
}

fn resolve_build<C: RpcChannel + ?Sized>(
    channel: &mut C,
    identity: &ExecutionIdentity,
    product_id: crr_common::ProductId,
) -> Result<Option<Build>, ReconcileError> {
    let by_commit = Matcher::contains(&identity.commit)?;
    let by_branch = Matcher::contains(&identity.branch)?;
    let builds = channel.call(&GetBuilds { product_id })?;
    let build = optional(resolve_with_tiebreak(
        ResourceKind::Build,
        &identity.commit,
        builds,
        OnZero::Create,
        |b| by_commit.is_match(&b.name),
        |b| by_branch.is_match(&b.name),
    )?);
    if let Some(build) = &build {
        if !build.isactive {
            warn!(build = %build.name, id = %build.build_id, "Using inactive build");
        }
        debug!(build = %build.name, id = %build.build_id, "Resolved build");
    }
    Ok(build)
}

fn create_build<C: RpcChannel + ?Sized>(
    channel: &mut C,
    identity: &ExecutionIdentity,
    product_id: crr_common::ProductId,
) -> Result<Build, ReconcileError> {
    let name = identity.build_name();
    let mut build = channel.call(&CreateBuild {
        name: name.clone(),
        product_id,
        description: Some(identity.build_date.clone()),
        milestone: Some(identity.milestone.clone()),
        isactive: Some(true),
    })?;
    if build.name.is_empty() {
        build.name = name;
    }
    info!(build = %build.name, id = %build.build_id, milestone = %identity.milestone, "Created build");
    Ok(build)
}

fn resolve_run<C: RpcChannel + ?Sized>(
    channel: &mut C,
    (plan, environment, build): (&TestPlan, &Environment, &Build),
) -> Result<Option<TestRun>, ReconcileError> {
    let automated = Matcher::contains(AUTOMATED_MARKER)?;
    let runs = channel.call(&GetPlanRuns {
        plan_id: plan.plan_id,
    })?;
    let key = format!(
        "plan {} build {} environment {}",
        plan.plan_id, build.build_id, environment.environment_id
    );
    let run = optional(resolve_singleton(
        ResourceKind::TestRun,
        &key,
        runs,
        OnZero::Create,
        |r| {
            r.build_id == build.build_id
                && r.environment_id == environment.environment_id
                && automated.is_match(&r.summary)
        },
    )?);
    if let Some(run) = &run {
        debug!(run = %run.run_id, summary = %run.summary, "Resolved automated test run");
    }
    Ok(run)
}

fn create_run<C: RpcChannel + ?Sized>(
    channel: &mut C,
    identity: &ExecutionIdentity,
    (plan, environment, build): (&TestPlan, &Environment, &Build),
) -> Result<TestRun, ReconcileError> {
    let summary = identity.run_summary();
    let mut run = channel.call(&CreateRun {
        build_id: build.build_id,
        environment_id: environment.environment_id,
        manager_id: identity.automation_user,
        plan_id: plan.plan_id,
        plan_text_version: 0,
        summary: summary.clone(),
        notes: None,
        product_version: identity.product_version.clone(),
    })?;
    if run.summary.is_empty() {
        run.summary = summary;
    }
    info!(run = %run.run_id, summary = %run.summary, "Created automated test run");
    Ok(run)
}

/// Resolve the test case to report on under a bound product.
pub fn bind_case_run<C>(
    channel: &mut C,
    product: &ProductContext,
    selector: &CaseSelector,
) -> Result<CaseRunContext, ReconcileError>
where
    C: RpcChannel + ?Sized,
{
    let case = match selector {
        CaseSelector::Alias(alias) => resolve_case_by_alias(channel, product, alias)?,
        CaseSelector::Id(case_id) => {
            let case = channel.call(&GetCase { case_id: *case_id })?;
            debug!(case = %case.case_id, plan = %product.plan_id(), "Bound test case by id without plan membership check");
            case
        }
    };
    Ok(CaseRunContext {
        product: product.clone(),
        case,
    })
}

fn resolve_case_by_alias<C: RpcChannel + ?Sized>(
    channel: &mut C,
    product: &ProductContext,
    alias: &str,
) -> Result<TestCase, ReconcileError> {
    let matcher = Matcher::exact(alias)?;
    let cases = channel.call(&GetPlanCases {
        plan_id: product.plan_id(),
    })?;
    let case = found(
        resolve_singleton(
            ResourceKind::TestCase,
            alias,
            cases.into_iter().filter(|c| c.isautomated),
            OnZero::NotFound,
            |c| {
                c.alias
                    .as_deref()
                    .is_some_and(|a| !a.is_empty() && matcher.is_match(a))
            },
        )?,
        ResourceKind::TestCase,
        alias,
    )?;
    debug!(case = %case.case_id, alias, "Resolved test case by alias");
    Ok(case)
}

/// Record `status` for the bound case run, creating the case run first if
/// the case is not yet part of the run.
pub fn execute_case_run<C>(
    channel: &mut C,
    identity: &ExecutionIdentity,
    case_run: &CaseRunContext,
    status: CaseRunStatus,
) -> Result<ExecutionReport, ReconcileError>
where
    C: RpcChannel + ?Sized,
{
    let product = &case_run.product;
    let case_id = case_run.case_id();

    let members = channel.call(&GetRunCases {
        run_id: product.run_id(),
    })?;
    let present = members.iter().any(|m| m.case_id == case_id);

    if !present {
        channel.call(&CreateCaseRun {
            assignee: identity.automation_user,
            build_id: product.build_id(),
            case_id,
            environment_id: product.environment_id(),
            run_id: product.run_id(),
            case_text_version: None,
            notes: None,
        })?;
        info!(run = %product.run_id(), case = %case_id, "Created case run");
    }

    channel.call(&UpdateCaseRun {
        run_id: product.run_id(),
        case_id,
        build_id: product.build_id(),
        environment_id: product.environment_id(),
        case_run_status_id: status.get(),
        notes: None,
    })?;
    info!(run = %product.run_id(), case = %case_id, status = %status, "Reported case run status");

    Ok(ExecutionReport {
        case_run_created: !present,
        status,
    })
}
