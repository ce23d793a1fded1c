//! Domain requests and responses for the analysis API.
//!
//! # Design
//! Each operation is a request type implementing [`ApiRequest`] paired with
//! a response type implementing [`ApiResponse`]. The pairing is by
//! convention; the caller names the response type when executing. Wire
//! names follow the API's camelCase JSON.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::request::{ApiRequest, Headers, Params};
use crate::response::{from_json, ApiResponse};

fn to_payload<T: Serialize>(value: &T) -> Result<Option<Value>, ApiError> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(ApiError::Serialization)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// `POST /v1/auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthLoginRequest {
    pub username: String,
    pub password: String,
}

impl ApiRequest for AuthLoginRequest {
    fn endpoint(&self) -> Cow<'_, str> {
        Cow::Borrowed("/v1/auth/login")
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn payload(&self) -> Result<Option<Value>, ApiError> {
        to_payload(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtTokens {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthLoginResponse {
    pub jwt_tokens: JwtTokens,
}

impl AuthLoginResponse {
    /// `Authorization: Bearer <access>` for authenticated calls.
    pub fn auth_header(&self) -> Headers {
        [("Authorization", format!("Bearer {}", self.jwt_tokens.access))]
            .into_iter()
            .collect()
    }
}

impl ApiResponse for AuthLoginResponse {
    fn from_json(raw: &str) -> Result<Self, ApiError> {
        from_json(raw)
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// `GET /v1/version`
#[derive(Debug, Clone, Default)]
pub struct VersionRequest;

impl ApiRequest for VersionRequest {
    fn endpoint(&self) -> Cow<'_, str> {
        Cow::Borrowed("/v1/version")
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    pub api: String,
    pub maru: String,
    pub mythril: String,
    pub harvey: String,
    pub hash: String,
}

impl ApiResponse for VersionResponse {
    fn from_json(raw: &str) -> Result<Self, ApiError> {
        from_json(raw)
    }
}

// ---------------------------------------------------------------------------
// Analyses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    Queued,
    #[serde(rename = "In progress")]
    InProgress,
    Finished,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub uuid: Uuid,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub client_tool_name: Option<String>,
    pub api_version: String,
}

impl ApiResponse for Analysis {
    fn from_json(raw: &str) -> Result<Self, ApiError> {
        from_json(raw)
    }
}

/// Contract material submitted for analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<BTreeMap<String, Value>>,
}

/// `POST /v1/analyses`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSubmissionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_tool_name: Option<String>,
    pub data: AnalysisData,
}

impl ApiRequest for AnalysisSubmissionRequest {
    fn endpoint(&self) -> Cow<'_, str> {
        Cow::Borrowed("/v1/analyses")
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn payload(&self) -> Result<Option<Value>, ApiError> {
        to_payload(self)
    }
}

/// `GET /v1/analyses/{uuid}`
#[derive(Debug, Clone)]
pub struct AnalysisStatusRequest {
    pub uuid: String,
}

impl ApiRequest for AnalysisStatusRequest {
    fn endpoint(&self) -> Cow<'_, str> {
        Cow::Owned(format!("/v1/analyses/{}", self.uuid))
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }
}

/// `GET /v1/analyses`, optionally paged and date-filtered.
#[derive(Debug, Clone, Default)]
pub struct AnalysisListRequest {
    pub offset: Option<usize>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl ApiRequest for AnalysisListRequest {
    fn endpoint(&self) -> Cow<'_, str> {
        Cow::Borrowed("/v1/analyses")
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn parameters(&self) -> Params {
        let mut params = Params::new();
        if let Some(offset) = self.offset {
            params.insert("offset", offset.to_string());
        }
        if let Some(date_from) = &self.date_from {
            params.insert("dateFrom", date_from.as_str());
        }
        if let Some(date_to) = &self.date_to {
            params.insert("dateTo", date_to.as_str());
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisList {
    pub analyses: Vec<Analysis>,
    pub total: usize,
}

impl ApiResponse for AnalysisList {
    /// A page can never hold more analyses than the reported total.
    fn from_json(raw: &str) -> Result<Self, ApiError> {
        let list: AnalysisList = from_json(raw)?;
        if list.analyses.len() > list.total {
            return Err(ApiError::InvalidResponse(format!(
                "page holds {} analyses but total is {}",
                list.analyses.len(),
                list.total
            )));
        }
        Ok(list)
    }
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "swcID")]
    pub swc_id: String,
    pub swc_title: String,
    pub severity: Severity,
    pub description: String,
}

/// `GET /v1/analyses/{uuid}/issues`
#[derive(Debug, Clone)]
pub struct DetectedIssuesRequest {
    pub uuid: String,
}

impl ApiRequest for DetectedIssuesRequest {
    fn endpoint(&self) -> Cow<'_, str> {
        Cow::Owned(format!("/v1/analyses/{}/issues", self.uuid))
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedIssuesResponse {
    pub issues: Vec<Issue>,
}

impl DetectedIssuesResponse {
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn contains_swc(&self, swc_id: &str) -> bool {
        self.issues.iter().any(|issue| issue.swc_id == swc_id)
    }

    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |issue| issue.severity >= severity)
    }
}

impl ApiResponse for DetectedIssuesResponse {
    fn from_json(raw: &str) -> Result<Self, ApiError> {
        from_json(raw)
    }
}
