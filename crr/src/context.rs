//! Bound reconciliation contexts.
//!
//! Each bind step produces a new immutable value; the driver only swaps
//! which value is current. A [`CaseRunContext`] embeds the
//! [`ProductContext`] it was bound under, so a case run can never outlive
//! or mix with a different product binding.

use crr_common::{
    Build, BuildId, CaseId, Environment, EnvironmentId, PlanId, Product, ProductId, RunId,
    TestCase, TestPlan, TestRun,
};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextState {
    Unbound,
    ProductBound,
    CaseRunBound,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unbound => "unbound",
            Self::ProductBound => "product-bound",
            Self::CaseRunBound => "case-run-bound",
        })
    }
}

/// Which resources `bind_product` had to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Created {
    pub environment: bool,
    pub build: bool,
    pub run: bool,
}

/// Product, plan, environment, build and automated run, all resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductContext {
    pub product: Product,
    pub plan: TestPlan,
    pub environment: Environment,
    pub build: Build,
    pub run: TestRun,
    pub created: Created,
}

impl ProductContext {
    pub fn product_id(&self) -> ProductId {
        self.product.id
    }

    pub fn plan_id(&self) -> PlanId {
        self.plan.plan_id
    }

    pub fn environment_id(&self) -> EnvironmentId {
        self.environment.environment_id
    }

    pub fn build_id(&self) -> BuildId {
        self.build.build_id
    }

    pub fn run_id(&self) -> RunId {
        self.run.run_id
    }
}

/// A product binding plus the one test case to report on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseRunContext {
    #[serde(flatten)]
    pub product: ProductContext,
    pub case: TestCase,
}

impl CaseRunContext {
    pub fn case_id(&self) -> CaseId {
        self.case.case_id
    }
}

/// The driver's current binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Context {
    #[default]
    Unbound,
    ProductBound(ProductContext),
    CaseRunBound(CaseRunContext),
}

impl Context {
    pub fn state(&self) -> ContextState {
        match self {
            Self::Unbound => ContextState::Unbound,
            Self::ProductBound(_) => ContextState::ProductBound,
            Self::CaseRunBound(_) => ContextState::CaseRunBound,
        }
    }

    /// The product binding, whether or not a case run is bound on top.
    pub fn product(&self) -> Option<&ProductContext> {
        match self {
            Self::Unbound => None,
            Self::ProductBound(product) => Some(product),
            Self::CaseRunBound(case_run) => Some(&case_run.product),
        }
    }

    pub fn case_run(&self) -> Option<&CaseRunContext> {
        match self {
            Self::CaseRunBound(case_run) => Some(case_run),
            _ => None,
        }
    }

    /// Drop any case run, keeping the product binding.
    pub fn without_case_run(self) -> Self {
        match self {
            Self::CaseRunBound(case_run) => Self::ProductBound(case_run.product),
            other => other,
        }
    }
}
