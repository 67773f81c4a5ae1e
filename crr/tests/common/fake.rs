//! In-memory stand-in for the test-management service.

use crr_session::{RpcChannel, RpcFault, SessionError};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct FakePlan {
    pub id: u64,
    pub product_id: u64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct FakeEnvironment {
    pub id: u64,
    pub product_id: u64,
    pub name: String,
    pub isactive: bool,
}

#[derive(Debug, Clone)]
pub struct FakeBuild {
    pub id: u64,
    pub product_id: u64,
    pub name: String,
    pub milestone: String,
}

#[derive(Debug, Clone)]
pub struct FakeRun {
    pub id: u64,
    pub plan_id: u64,
    pub build_id: u64,
    pub environment_id: u64,
    pub summary: String,
    pub manager_id: u64,
    pub product_version: String,
}

#[derive(Debug, Clone)]
pub struct FakeCase {
    pub id: u64,
    pub plan_id: u64,
    pub alias: Option<String>,
    pub isautomated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCaseRun {
    pub run_id: u64,
    pub case_id: u64,
    pub build_id: u64,
    pub environment_id: u64,
    pub assignee: u64,
    pub statuses: Vec<u64>,
}

/// Service state plus a log of every verb invoked.
#[derive(Debug, Clone)]
pub struct FakeTestopia {
    pub products: Vec<(u64, String)>,
    pub plans: Vec<FakePlan>,
    pub environments: Vec<FakeEnvironment>,
    pub builds: Vec<FakeBuild>,
    pub runs: Vec<FakeRun>,
    pub cases: Vec<FakeCase>,
    pub case_runs: Vec<FakeCaseRun>,
    pub users: Vec<(String, u64)>,
    pub calls: Vec<String>,
    /// Fault every call to this verb.
    pub failing_verb: Option<&'static str>,
    next_id: u64,
}

impl Default for FakeTestopia {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            plans: Vec::new(),
            environments: Vec::new(),
            builds: Vec::new(),
            runs: Vec::new(),
            cases: Vec::new(),
            case_runs: Vec::new(),
            users: Vec::new(),
            calls: Vec::new(),
            failing_verb: None,
            next_id: 1000,
        }
    }
}

fn fault(code: i64, message: impl Into<String>) -> RpcFault {
    RpcFault {
        code,
        message: message.into(),
    }
}

fn id_at(params: &[Value], index: usize) -> Result<u64, RpcFault> {
    params
        .get(index)
        .and_then(Value::as_u64)
        .ok_or_else(|| fault(32000, format!("expected integer at position {index}")))
}

fn options(params: &[Value]) -> Result<&serde_json::Map<String, Value>, RpcFault> {
    params
        .first()
        .and_then(Value::as_object)
        .ok_or_else(|| fault(32000, "expected options map"))
}

fn field_u64(map: &serde_json::Map<String, Value>, key: &str) -> Result<u64, RpcFault> {
    map.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| fault(32000, format!("missing {key}")))
}

fn field_str(map: &serde_json::Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl FakeTestopia {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn count(&self, verb: &str) -> usize {
        self.calls.iter().filter(|v| v.as_str() == verb).count()
    }

    pub fn with_product(mut self, id: u64, name: &str) -> Self {
        self.products.push((id, name.to_string()));
        self
    }

    pub fn with_plan(mut self, id: u64, product_id: u64, name: &str) -> Self {
        self.plans.push(FakePlan {
            id,
            product_id,
            name: name.to_string(),
        });
        self
    }

    pub fn with_environment(mut self, id: u64, product_id: u64, name: &str) -> Self {
        self.environments.push(FakeEnvironment {
            id,
            product_id,
            name: name.to_string(),
            isactive: true,
        });
        self
    }

    pub fn with_build(mut self, id: u64, product_id: u64, name: &str) -> Self {
        self.builds.push(FakeBuild {
            id,
            product_id,
            name: name.to_string(),
            milestone: String::new(),
        });
        self
    }

    pub fn with_run(
        mut self,
        id: u64,
        plan_id: u64,
        build_id: u64,
        environment_id: u64,
        summary: &str,
    ) -> Self {
        self.runs.push(FakeRun {
            id,
            plan_id,
            build_id,
            environment_id,
            summary: summary.to_string(),
            manager_id: 1,
            product_version: "unspecified".to_string(),
        });
        self
    }

    pub fn with_case(mut self, id: u64, plan_id: u64, alias: Option<&str>, automated: bool) -> Self {
        self.cases.push(FakeCase {
            id,
            plan_id,
            alias: alias.map(str::to_string),
            isautomated: automated,
        });
        self
    }

    pub fn with_user(mut self, login: &str, id: u64) -> Self {
        self.users.push((login.to_string(), id));
        self
    }

    fn dispatch(&mut self, verb: &str, params: &[Value]) -> Result<Value, RpcFault> {
        match verb {
            "User.lookup_id_by_login" => {
                let login = params.first().and_then(Value::as_str).unwrap_or_default();
                let id = self
                    .users
                    .iter()
                    .find(|(l, _)| l == login)
                    .map(|(_, id)| *id)
                    .unwrap_or(0);
                Ok(json!(id))
            }
            "TestopiaProduct.check_product" => {
                let name = params.first().and_then(Value::as_str).unwrap_or_default();
                let hits: Vec<Value> = self
                    .products
                    .iter()
                    .filter(|(_, n)| n == name)
                    .map(|(id, n)| json!({"id": id, "name": n}))
                    .collect();
                Ok(match hits.len() {
                    0 => Value::Null,
                    1 => hits[0].clone(),
                    _ => Value::Array(hits),
                })
            }
            "TestopiaProduct.get_environments" => {
                let product_id = id_at(params, 0)?;
                Ok(Value::Array(
                    self.environments
                        .iter()
                        .filter(|e| e.product_id == product_id)
                        .map(|e| {
                            json!({
                                "environment_id": e.id,
                                "product_id": e.product_id,
                                "name": e.name,
                                "isactive": if e.isactive { 1 } else { 0 },
                            })
                        })
                        .collect(),
                ))
            }
            "TestopiaProduct.get_builds" => {
                let product_id = id_at(params, 0)?;
                Ok(Value::Array(
                    self.builds
                        .iter()
                        .filter(|b| b.product_id == product_id)
                        .map(|b| {
                            json!({
                                "build_id": b.id,
                                "product_id": b.product_id,
                                "name": b.name,
                                "milestone": b.milestone,
                                "isactive": 1,
                            })
                        })
                        .collect(),
                ))
            }
            "TestPlan.list" => {
                let opts = options(params)?;
                if opts.get("viewall") != Some(&json!(true)) {
                    return Err(fault(32000, "list truncated without viewall"));
                }
                let product_id = field_u64(opts, "product_id")?;
                Ok(Value::Array(
                    self.plans
                        .iter()
                        .filter(|p| p.product_id == product_id)
                        .map(|p| json!({"plan_id": p.id, "name": p.name}))
                        .collect(),
                ))
            }
            "TestPlan.get_test_cases" => {
                let plan_id = id_at(params, 0)?;
                Ok(Value::Array(
                    self.cases
                        .iter()
                        .filter(|c| c.plan_id == plan_id)
                        .map(|c| {
                            json!({
                                "case_id": c.id,
                                "alias": c.alias,
                                "isautomated": if c.isautomated { 1 } else { 0 },
                            })
                        })
                        .collect(),
                ))
            }
            "TestPlan.get_test_runs" => {
                let plan_id = id_at(params, 0)?;
                Ok(Value::Array(
                    self.runs
                        .iter()
                        .filter(|r| r.plan_id == plan_id)
                        .map(|r| {
                            json!({
                                "run_id": r.id,
                                "build_id": r.build_id,
                                "environment_id": r.environment_id,
                                "summary": r.summary,
                            })
                        })
                        .collect(),
                ))
            }
            "TestCase.get" => {
                let case_id = id_at(params, 0)?;
                self.cases
                    .iter()
                    .find(|c| c.id == case_id)
                    .map(|c| {
                        json!({
                            "case_id": c.id,
                            "alias": c.alias,
                            "isautomated": c.isautomated,
                        })
                    })
                    .ok_or_else(|| fault(3404, format!("Test case {case_id} does not exist")))
            }
            "Build.create" => {
                let opts = options(params)?;
                let build = FakeBuild {
                    id: self.next_id(),
                    product_id: field_u64(opts, "product_id")?,
                    name: field_str(opts, "name"),
                    milestone: field_str(opts, "milestone"),
                };
                let reply = json!({
                    "build_id": build.id,
                    "name": build.name,
                    "milestone": build.milestone,
                    "isactive": 1,
                });
                self.builds.push(build);
                Ok(reply)
            }
            "Environment.create" => {
                let opts = options(params)?;
                let environment = FakeEnvironment {
                    id: self.next_id(),
                    product_id: field_u64(opts, "product_id")?,
                    name: field_str(opts, "name"),
                    isactive: opts.get("isactive") == Some(&json!(true)),
                };
                let reply = json!({
                    "environment_id": environment.id,
                    "name": environment.name,
                    "isactive": environment.isactive,
                });
                self.environments.push(environment);
                Ok(reply)
            }
            "TestRun.create" => {
                let opts = options(params)?;
                let run = FakeRun {
                    id: self.next_id(),
                    plan_id: field_u64(opts, "plan_id")?,
                    build_id: field_u64(opts, "build_id")?,
                    environment_id: field_u64(opts, "environment_id")?,
                    summary: field_str(opts, "summary"),
                    manager_id: field_u64(opts, "manager_id")?,
                    product_version: field_str(opts, "product_version"),
                };
                let reply = json!({
                    "run_id": run.id,
                    "build_id": run.build_id,
                    "environment_id": run.environment_id,
                    "summary": run.summary,
                });
                self.runs.push(run);
                Ok(reply)
            }
            "TestRun.get_test_cases" => {
                let run_id = id_at(params, 0)?;
                Ok(Value::Array(
                    self.case_runs
                        .iter()
                        .filter(|cr| cr.run_id == run_id)
                        .map(|cr| json!({"case_id": cr.case_id, "run_id": cr.run_id}))
                        .collect(),
                ))
            }
            "TestCaseRun.create" => {
                let opts = options(params)?;
                let case_run = FakeCaseRun {
                    run_id: field_u64(opts, "run_id")?,
                    case_id: field_u64(opts, "case_id")?,
                    build_id: field_u64(opts, "build_id")?,
                    environment_id: field_u64(opts, "environment_id")?,
                    assignee: field_u64(opts, "assignee")?,
                    statuses: Vec::new(),
                };
                if self
                    .case_runs
                    .iter()
                    .any(|cr| cr.run_id == case_run.run_id && cr.case_id == case_run.case_id)
                {
                    return Err(fault(3500, "Case run already exists"));
                }
                self.case_runs.push(case_run);
                Ok(json!({"case_run_id": self.next_id()}))
            }
            "TestCaseRun.update" => {
                let run_id = id_at(params, 0)?;
                let case_id = id_at(params, 1)?;
                let build_id = id_at(params, 2)?;
                let environment_id = id_at(params, 3)?;
                let status = params
                    .get(4)
                    .and_then(|o| o.get("case_run_status_id"))
                    .and_then(Value::as_u64)
                    .ok_or_else(|| fault(32000, "missing case_run_status_id"))?;
                let case_run = self
                    .case_runs
                    .iter_mut()
                    .find(|cr| {
                        cr.run_id == run_id
                            && cr.case_id == case_id
                            && cr.build_id == build_id
                            && cr.environment_id == environment_id
                    })
                    .ok_or_else(|| fault(3404, "No case run matches"))?;
                case_run.statuses.push(status);
                Ok(json!({"case_run_status_id": status}))
            }
            other => Err(fault(32601, format!("Unknown method {other}"))),
        }
    }
}

impl RpcChannel for FakeTestopia {
    fn invoke(&mut self, verb: &str, params: Vec<Value>) -> Result<Value, SessionError> {
        self.calls.push(verb.to_string());
        let result = if self.failing_verb == Some(verb) {
            Err(fault(500, "injected failure"))
        } else {
            self.dispatch(verb, &params)
        };
        result.map_err(|fault| SessionError::RemoteCall {
            verb: verb.to_string(),
            params,
            fault,
        })
    }
}
