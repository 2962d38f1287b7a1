// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes, invalid_argument};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Kind of script a job stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    Keyword,
    TestCase,
}

impl ScriptType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptType::Keyword => "keyword",
            ScriptType::TestCase => "test_case",
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stored server profile carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileCategory {
    /// Parameter references rendered into the variables file.
    GlobalVariables,
    /// Target reachable from here: scripts are staged, executed and results fetched.
    LocalConnection,
    /// Target driven by an external trigger: scripts are only staged.
    ExternalRunner,
}

impl ProfileCategory {
    pub fn is_connection(self) -> bool {
        !matches!(self, ProfileCategory::GlobalVariables)
    }
}

impl TryFrom<i64> for ProfileCategory {
    type Error = AppError;

    fn try_from(value: i64) -> AppResult<Self> {
        match value {
            1 => Ok(ProfileCategory::GlobalVariables),
            2 => Ok(ProfileCategory::LocalConnection),
            3 => Ok(ProfileCategory::ExternalRunner),
            other => Err(invalid_argument(format!(
                "unknown profile category {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub id: i64,
    pub name: String,
    pub category: ProfileCategory,
    /// Serialized JSON config, see [`ProfileConfig`].
    pub config: String,
}

/// `{id, value}` pair pointing at a stored parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRef {
    pub id: i64,
    pub value: String,
}

/// Decoded profile config blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileConfig {
    References(Vec<ParameterRef>),
    Direct(IndexMap<String, String>),
}

impl ProfileConfig {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| invalid_argument(format!("profile config is not valid JSON: {err}")))?;
        match value {
            Value::Array(items) => items
                .iter()
                .map(parameter_ref_from_value)
                .collect::<AppResult<Vec<_>>>()
                .map(ProfileConfig::References),
            Value::Object(map) => {
                let mut out = IndexMap::new();
                for (key, value) in &map {
                    let text = scalar_text(value).ok_or_else(|| {
                        invalid_argument(format!("profile config key '{key}' is not a scalar"))
                    })?;
                    out.insert(key.clone(), text);
                }
                Ok(ProfileConfig::Direct(out))
            }
            _ => Err(invalid_argument(
                "profile config must be a list of parameter references or an object",
            )),
        }
    }
}

fn parameter_ref_from_value(value: &Value) -> AppResult<ParameterRef> {
    let Value::Object(map) = value else {
        return Err(invalid_argument("parameter reference must be an object"));
    };
    let id = match map.get("id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid_argument("parameter reference has no numeric id"))?;
    let value = match map.get("value") {
        Some(v) => scalar_text(v)
            .ok_or_else(|| invalid_argument(format!("parameter {id} has a non-scalar value")))?,
        None => String::new(),
    };
    Ok(ParameterRef { id, value })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Non-fatal parameter lookup failure, kept next to the resolved values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamResolutionIssue {
    pub parameter_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedParams {
    pub values: IndexMap<String, String>,
    pub issues: Vec<ParamResolutionIssue>,
}

/// Flattened connection settings of the active profile.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    pub remote_path: String,
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("remote_path", &self.remote_path)
            .finish()
    }
}

impl ResolvedConfig {
    pub fn from_mapping(values: &IndexMap<String, String>) -> AppResult<Self> {
        let host = required(values, &["host"])?;
        let user = required(values, &["user"])?;
        let password = required(values, &["passwd", "password", "credential"])?;
        let remote_path = required(values, &["path", "remote_path"])?;
        let port = parse_port(lookup(values, &["port"]))?;
        let remote_path = remote_path.trim_end_matches('/').to_string();
        if remote_path.is_empty() {
            return Err(config_error(
                "connection profile path must not be the filesystem root",
            ));
        }
        Ok(Self {
            host,
            user,
            password,
            port,
            remote_path,
        })
    }
}

fn lookup<'a>(values: &'a IndexMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| values.get(*key))
        .map(|value| value.trim())
}

fn required(values: &IndexMap<String, String>, keys: &[&str]) -> AppResult<String> {
    match lookup(values, keys) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(config_error(format!(
            "connection profile is missing '{}'",
            keys[0]
        ))),
    }
}

fn config_error(message: impl Into<String>) -> AppError {
    AppError::with_message(
        AppErrorKind::Connection,
        codes::INVALID_ARGUMENT,
        message,
    )
}

/// Unset, empty and zero ports all fall back to 22.
pub fn parse_port(raw: Option<&str>) -> AppResult<u16> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(DEFAULT_SSH_PORT);
    };
    match raw.parse::<u16>() {
        Ok(0) => Ok(DEFAULT_SSH_PORT),
        Ok(port) => Ok(port),
        Err(_) => Err(config_error(format!("invalid ssh port '{raw}'"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRecord {
    pub id: i64,
    pub name: String,
    pub body: Option<String>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseRecord {
    pub id: i64,
    pub name: String,
    pub body: Option<String>,
    pub phase: Option<String>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptObject {
    Keyword(KeywordRecord),
    TestCase(TestCaseRecord),
}

impl ScriptObject {
    pub fn script_type(&self) -> ScriptType {
        match self {
            ScriptObject::Keyword(_) => ScriptType::Keyword,
            ScriptObject::TestCase(_) => ScriptType::TestCase,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ScriptObject::Keyword(record) => &record.name,
            ScriptObject::TestCase(record) => &record.name,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            ScriptObject::Keyword(record) => record.body.as_deref(),
            ScriptObject::TestCase(record) => record.body.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDependency {
    pub name: String,
}

/// Logical kind of a generated file; decides where it lands remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedFileKind {
    Keyword,
    TestCase,
    GlobalVariablesProfile,
}

impl StagedFileKind {
    pub fn remote_subdir(self) -> &'static str {
        match self {
            StagedFileKind::Keyword => "Keywords",
            StagedFileKind::TestCase => "TestSuites",
            StagedFileKind::GlobalVariablesProfile => "Profiles",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub kind: StagedFileKind,
    pub local_path: PathBuf,
}

impl StagedFile {
    pub fn file_name(&self) -> AppResult<String> {
        self.local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AppError::with_message(
                    AppErrorKind::Transfer,
                    codes::LOCAL_ERROR,
                    format!("staged file {} has no file name", self.local_path.display()),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub script_type: ScriptType,
    pub script_id: i64,
    pub profile_ids: Vec<i64>,
    pub filename_seed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    ResolveParams,
    Connect,
    Generate,
    Transfer,
    Execute,
    FetchResults,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::ResolveParams => "resolve_params",
            JobState::Connect => "connect",
            JobState::Generate => "generate",
            JobState::Transfer => "transfer",
            JobState::Execute => "execute",
            JobState::FetchResults => "fetch_results",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result payload handed back to the submitter. Exactly one arm is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobResult {
    Link(String),
    Text(String),
    Error(String),
}

pub const SUCCESS_TEXT: &str = "Success";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCompletion {
    /// Executed and fetched; points at the fetched report.
    ResultLink(String),
    /// Staged for an external runner.
    Delivered,
}

#[derive(Debug, Clone)]
pub struct JobFailure {
    /// State the job was in when it failed.
    pub state: JobState,
    pub error: AppError,
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub filename_seed: String,
    pub states: Vec<JobState>,
    pub outcome: Result<JobCompletion, JobFailure>,
    pub issues: Vec<ParamResolutionIssue>,
    pub transcript: Option<String>,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
}

impl JobReport {
    pub fn final_state(&self) -> JobState {
        match self.outcome {
            Ok(_) => JobState::Done,
            Err(_) => JobState::Failed,
        }
    }

    pub fn visited(&self, state: JobState) -> bool {
        self.states.contains(&state)
    }

    pub fn result(&self) -> JobResult {
        match &self.outcome {
            Ok(JobCompletion::ResultLink(link)) => JobResult::Link(link.clone()),
            Ok(JobCompletion::Delivered) => JobResult::Text(SUCCESS_TEXT.to_string()),
            Err(failure) => JobResult::Error(failure.error.to_string()),
        }
    }
}
