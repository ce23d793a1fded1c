//! Pipeline configuration: target environment, base endpoints and middlewares.
//!
//! # Design
//! Everything here is fixed when the handler is built and never mutated
//! afterwards. The endpoint table is an explicit value handed to the
//! pipeline; nothing is looked up from process-wide state.

use std::collections::BTreeMap;
use std::env::VarError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ApiError;
use crate::middleware::Middleware;

/// Environment variable consulted by [`Environment::from_env`].
pub const ENVIRONMENT_VAR: &str = "MYTHX_ENVIRONMENT";

pub const PRODUCTION_URL: &str = "https://api.mythx.io";
pub const STAGING_URL: &str = "https://staging.api.mythx.io";

/// Deployment the pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
        }
    }

    /// Reads [`ENVIRONMENT_VAR`], falling back to production when unset.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_var(std::env::var(ENVIRONMENT_VAR))
    }

    fn from_var(value: Result<String, VarError>) -> Result<Self, ApiError> {
        match value {
            Ok(value) => value.parse(),
            Err(VarError::NotPresent) => Ok(Environment::default()),
            Err(VarError::NotUnicode(raw)) => Err(ApiError::Config(format!(
                "{ENVIRONMENT_VAR} is not valid unicode: {raw:?}"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            other => Err(ApiError::Config(format!("unknown environment: {other}"))),
        }
    }
}

/// Mapping from environment to API base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoints(BTreeMap<Environment, Url>);

impl Endpoints {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Parses a JSON object such as `{"production": "https://api.example.io"}`.
    pub fn from_json(raw: &str) -> Result<Self, ApiError> {
        serde_json::from_str(raw).map_err(|e| ApiError::Config(e.to_string()))
    }

    pub fn with(mut self, environment: Environment, base_url: &str) -> Result<Self, ApiError> {
        self.0.insert(environment, Url::parse(base_url)?);
        Ok(self)
    }

    /// Base URL for `environment`, or `UnknownEnvironment` if none is configured.
    pub fn base_url(&self, environment: Environment) -> Result<&Url, ApiError> {
        self.0
            .get(&environment)
            .ok_or(ApiError::UnknownEnvironment(environment))
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        if let Ok(url) = Url::parse(PRODUCTION_URL) {
            map.insert(Environment::Production, url);
        }
        if let Ok(url) = Url::parse(STAGING_URL) {
            map.insert(Environment::Staging, url);
        }
        Self(map)
    }
}

/// Immutable settings shared by every call made through one handler.
#[derive(Clone, Default)]
pub struct PipelineConfig {
    pub middlewares: Vec<Arc<dyn Middleware>>,
    pub environment: Environment,
    pub endpoints: Endpoints,
}

impl PipelineConfig {
    /// Default endpoints, production unless `staging` is set.
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>, staging: bool) -> Self {
        Self {
            middlewares,
            environment: if staging {
                Environment::Staging
            } else {
                Environment::Production
            },
            endpoints: Endpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn base_url(&self) -> Result<&Url, ApiError> {
        self.endpoints.base_url(self.environment)
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.middlewares.iter().map(|m| m.name()).collect();
        f.debug_struct("PipelineConfig")
            .field("middlewares", &names)
            .field("environment", &self.environment)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}
