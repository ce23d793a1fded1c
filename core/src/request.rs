//! Request descriptor and the assembler that builds it from a domain request.
//!
//! # Design
//! `RequestDescriptor` is the typed, transport-agnostic form of one outgoing
//! call. It is created by [`assemble`], threaded by value through the
//! request middlewares, and consumed once by the transport executor.
//! Method and URL are typed (`HttpMethod`, `Url`), so a descriptor always
//! carries a verb and an absolute URL. Headers and params are small ordered
//! maps: keys are unique, iteration follows insertion order, and middlewares
//! can add or remove entries freely.

use std::borrow::Cow;

use serde_json::Value;
use url::Url;

use crate::error::ApiError;
use crate::http::HttpMethod;

/// Ordered header map with unique, ASCII case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced entry keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.0.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Merge `other` into `self`; entries from `other` win on collision.
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Ordered query parameter map with unique, case-sensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.0.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|(k, _)| k == name)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// Transport-ready description of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Headers,
    /// JSON body; `None` sends no body.
    pub payload: Option<Value>,
    pub params: Params,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            payload: None,
            params: Params::new(),
        }
    }
}

/// One API operation's input.
///
/// Only `endpoint` and `method` are mandatory; the rest default to empty.
pub trait ApiRequest {
    /// Path relative to the API base, e.g. `/v1/analyses/{uuid}/issues`.
    fn endpoint(&self) -> Cow<'_, str>;

    fn method(&self) -> HttpMethod;

    fn payload(&self) -> Result<Option<Value>, ApiError> {
        Ok(None)
    }

    fn parameters(&self) -> Params {
        Params::new()
    }

    fn headers(&self) -> Headers {
        Headers::new()
    }
}

/// Build a descriptor for `request` against `base_url`.
///
/// The endpoint is resolved with standard URL-join rules: an absolute path
/// replaces the base path, a relative one is resolved against it.
pub fn assemble<R: ApiRequest + ?Sized>(
    request: &R,
    base_url: &Url,
) -> Result<RequestDescriptor, ApiError> {
    let url = base_url.join(&request.endpoint())?;
    Ok(RequestDescriptor {
        method: request.method(),
        url,
        headers: request.headers(),
        payload: request.payload()?,
        params: request.parameters(),
    })
}
