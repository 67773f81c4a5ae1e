//! Typed verb catalog.
//!
//! Each remote verb is a request struct with a fixed parameter layout and
//! a fixed response type. Requests are validated before anything is put
//! on the wire, so malformed ids never reach the service.

use crate::error::{SessionError, TransportError};
use crate::session::RpcChannel;
use crr_common::{
    Build, BuildId, CaseId, Environment, EnvironmentId, LoginResult, PlanId, Product, ProductId,
    RunId, RunMember, TestCase, TestPlan, TestRun, UserId,
};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A typed remote call.
pub trait RpcRequest {
    const VERB: &'static str;
    type Response: DeserializeOwned;

    /// Reject requests the service would refuse anyway.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Positional parameters in wire order.
    fn params(&self) -> Result<Vec<Value>, serde_json::Error>;
}

/// Typed calls on top of any [`RpcChannel`].
pub trait RpcChannelExt: RpcChannel {
    fn call<R: RpcRequest>(&mut self, request: &R) -> Result<R::Response, SessionError> {
        request
            .validate()
            .map_err(|reason| SessionError::InvalidRequest {
                verb: R::VERB,
                reason,
            })?;
        let params = request
            .params()
            .map_err(|e| SessionError::InvalidRequest {
                verb: R::VERB,
                reason: e.to_string(),
            })?;
        let value = self.invoke(R::VERB, params)?;
        serde_json::from_value(value).map_err(|e| {
            TransportError::UnexpectedShape {
                verb: R::VERB.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl<C: RpcChannel + ?Sized> RpcChannelExt for C {}

fn positive(field: &str, id: u64) -> Result<(), String> {
    if id == 0 {
        Err(format!("{field} must be greater than 0"))
    } else {
        Ok(())
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

/// Single options-map parameter.
fn options_param<T: Serialize>(options: &T) -> Result<Vec<Value>, serde_json::Error> {
    Ok(vec![serde_json::to_value(options)?])
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Login {
    pub login: String,
    pub password: String,
}

impl RpcRequest for Login {
    const VERB: &'static str = "User.login";
    type Response = LoginResult;

    fn validate(&self) -> Result<(), String> {
        non_empty("login", &self.login)
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        options_param(self)
    }
}

/// Resolves to `0` when the login is unknown.
#[derive(Debug, Clone)]
pub struct LookupUserId {
    pub login: String,
}

impl RpcRequest for LookupUserId {
    const VERB: &'static str = "User.lookup_id_by_login";
    type Response = UserId;

    fn validate(&self) -> Result<(), String> {
        non_empty("login", &self.login)
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![json!(self.login)])
    }
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// Products matching a name check.
///
/// The service answers with a single product, a list, or nothing at all
/// depending on version; all shapes collapse into a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductMatches(pub Vec<Product>);

impl<'de> Deserialize<'de> for ProductMatches {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let products = match value {
            Value::Null | Value::Bool(false) => Vec::new(),
            Value::Object(ref map) if !map.contains_key("id") => Vec::new(),
            Value::Object(_) => {
                vec![serde_json::from_value(value).map_err(serde::de::Error::custom)?]
            }
            Value::Array(_) => serde_json::from_value(value).map_err(serde::de::Error::custom)?,
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected product, list or null, got {other}"
                )));
            }
        };
        Ok(Self(products))
    }
}

#[derive(Debug, Clone)]
pub struct CheckProduct {
    pub name: String,
}

impl RpcRequest for CheckProduct {
    const VERB: &'static str = "TestopiaProduct.check_product";
    type Response = ProductMatches;

    fn validate(&self) -> Result<(), String> {
        non_empty("name", &self.name)
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![json!(self.name)])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetEnvironments {
    pub product_id: ProductId,
}

impl RpcRequest for GetEnvironments {
    const VERB: &'static str = "TestopiaProduct.get_environments";
    type Response = Vec<Environment>;

    fn validate(&self) -> Result<(), String> {
        positive("product_id", self.product_id.get())
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![json!(self.product_id)])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetBuilds {
    pub product_id: ProductId,
}

impl RpcRequest for GetBuilds {
    const VERB: &'static str = "TestopiaProduct.get_builds";
    type Response = Vec<Build>;

    fn validate(&self) -> Result<(), String> {
        positive("product_id", self.product_id.get())
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![json!(self.product_id)])
    }
}

// ---------------------------------------------------------------------------
// Test plan
// ---------------------------------------------------------------------------

/// Lists every plan of a product. `viewall` is always sent; without it the
/// service truncates the list to 25 entries.
#[derive(Debug, Clone, Copy)]
pub struct ListPlans {
    pub product_id: ProductId,
}

impl RpcRequest for ListPlans {
    const VERB: &'static str = "TestPlan.list";
    type Response = Vec<TestPlan>;

    fn validate(&self) -> Result<(), String> {
        positive("product_id", self.product_id.get())
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![json!({
            "product_id": self.product_id,
            "viewall": true,
        })])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetPlanCases {
    pub plan_id: PlanId,
}

impl RpcRequest for GetPlanCases {
    const VERB: &'static str = "TestPlan.get_test_cases";
    type Response = Vec<TestCase>;

    fn validate(&self) -> Result<(), String> {
        positive("plan_id", self.plan_id.get())
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![json!(self.plan_id)])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetPlanRuns {
    pub plan_id: PlanId,
}

impl RpcRequest for GetPlanRuns {
    const VERB: &'static str = "TestPlan.get_test_runs";
    type Response = Vec<TestRun>;

    fn validate(&self) -> Result<(), String> {
        positive("plan_id", self.plan_id.get())
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![json!(self.plan_id)])
    }
}

// ---------------------------------------------------------------------------
// Test case
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct GetCase {
    pub case_id: CaseId,
}

impl RpcRequest for GetCase {
    const VERB: &'static str = "TestCase.get";
    type Response = TestCase;

    fn validate(&self) -> Result<(), String> {
        positive("case_id", self.case_id.get())
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![json!(self.case_id)])
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CreateBuild {
    pub name: String,
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isactive: Option<bool>,
}

impl RpcRequest for CreateBuild {
    const VERB: &'static str = "Build.create";
    type Response = Build;

    fn validate(&self) -> Result<(), String> {
        non_empty("name", &self.name)?;
        positive("product_id", self.product_id.get())
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        options_param(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateEnvironment {
    pub product_id: ProductId,
    pub isactive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RpcRequest for CreateEnvironment {
    const VERB: &'static str = "Environment.create";
    type Response = Environment;

    fn validate(&self) -> Result<(), String> {
        positive("product_id", self.product_id.get())?;
        match &self.name {
            Some(name) => non_empty("name", name),
            None => Ok(()),
        }
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        options_param(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRun {
    pub build_id: BuildId,
    pub environment_id: EnvironmentId,
    pub manager_id: UserId,
    pub plan_id: PlanId,
    pub plan_text_version: u32,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub product_version: String,
}

impl RpcRequest for CreateRun {
    const VERB: &'static str = "TestRun.create";
    type Response = TestRun;

    fn validate(&self) -> Result<(), String> {
        positive("build_id", self.build_id.get())?;
        positive("environment_id", self.environment_id.get())?;
        positive("manager_id", self.manager_id.get())?;
        positive("plan_id", self.plan_id.get())?;
        non_empty("summary", &self.summary)?;
        non_empty("product_version", &self.product_version)
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        options_param(self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetRunCases {
    pub run_id: RunId,
}

impl RpcRequest for GetRunCases {
    const VERB: &'static str = "TestRun.get_test_cases";
    type Response = Vec<RunMember>;

    fn validate(&self) -> Result<(), String> {
        positive("run_id", self.run_id.get())
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![json!(self.run_id)])
    }
}

// ---------------------------------------------------------------------------
// Case runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CreateCaseRun {
    pub assignee: UserId,
    pub build_id: BuildId,
    pub case_id: CaseId,
    pub environment_id: EnvironmentId,
    pub run_id: RunId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_text_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RpcRequest for CreateCaseRun {
    const VERB: &'static str = "TestCaseRun.create";
    type Response = Value;

    fn validate(&self) -> Result<(), String> {
        positive("assignee", self.assignee.get())?;
        positive("build_id", self.build_id.get())?;
        positive("case_id", self.case_id.get())?;
        positive("environment_id", self.environment_id.get())?;
        positive("run_id", self.run_id.get())
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        options_param(self)
    }
}

/// Updates the case run keyed by (run, case, build, environment).
///
/// The status code is forwarded as-is; the service is the authority on
/// which codes exist.
#[derive(Debug, Clone)]
pub struct UpdateCaseRun {
    pub run_id: RunId,
    pub case_id: CaseId,
    pub build_id: BuildId,
    pub environment_id: EnvironmentId,
    pub case_run_status_id: u32,
    pub notes: Option<String>,
}

#[derive(Serialize)]
struct UpdateCaseRunOptions<'a> {
    case_run_status_id: u32,
    update_bugs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

impl RpcRequest for UpdateCaseRun {
    const VERB: &'static str = "TestCaseRun.update";
    type Response = Value;

    fn validate(&self) -> Result<(), String> {
        positive("run_id", self.run_id.get())?;
        positive("case_id", self.case_id.get())?;
        positive("build_id", self.build_id.get())?;
        positive("environment_id", self.environment_id.get())
    }

    fn params(&self) -> Result<Vec<Value>, serde_json::Error> {
        let options = UpdateCaseRunOptions {
            case_run_status_id: self.case_run_status_id,
            update_bugs: false,
            notes: self.notes.as_deref(),
        };
        Ok(vec![
            json!(self.run_id),
            json!(self.case_id),
            json!(self.build_id),
            json!(self.environment_id),
            serde_json::to_value(options)?,
        ])
    }
}
