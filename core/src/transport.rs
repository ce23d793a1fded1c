//! The single point of network I/O: flatten a descriptor, send it, gate on 200.
//!
//! # Design
//! [`send`] owns the pipeline's success contract and its debug trace; the
//! actual round trip goes through the [`Transport`] trait. [`UreqTransport`]
//! is the real implementation; tests plug in transports that record the
//! outgoing request and answer with canned responses.

use std::fmt;

use tracing::debug;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder};

use crate::error::ApiError;
use crate::http::{format_request, format_response, HttpMethod, HttpRequest, HttpResponse};
use crate::request::{Headers, RequestDescriptor};

/// Executes one HTTP round trip.
///
/// Implementations must return non-2xx responses as data, not as `Err`;
/// `Err` is reserved for failures where no response was received.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Blocking transport backed by a `ureq` agent.
///
/// Every status comes back as data: redirects are not followed, so a 3xx
/// reaches the status gate like any other non-200. Response bodies are read
/// in full with no size cap.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let url = request.url.as_str();
        let headers = &request.headers;
        let body = request.body.as_deref();

        let mut response = match request.method {
            HttpMethod::Get => without_body(self.agent.get(url), headers, body),
            HttpMethod::Delete => without_body(self.agent.delete(url), headers, body),
            HttpMethod::Head => without_body(self.agent.head(url), headers, body),
            HttpMethod::Options => without_body(self.agent.options(url), headers, body),
            HttpMethod::Post => with_body(self.agent.post(url), headers, body),
            HttpMethod::Put => with_body(self.agent.put(url), headers, body),
            HttpMethod::Patch => with_body(self.agent.patch(url), headers, body),
        }?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let bytes = response.body_mut().with_config().limit(u64::MAX).read_to_vec()?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn apply_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn without_body(
    builder: RequestBuilder<WithoutBody>,
    headers: &[(String, String)],
    body: Option<&str>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let builder = apply_headers(builder, headers);
    match body {
        Some(body) => builder.force_send_body().send(body),
        None => builder.call(),
    }
}

fn with_body(
    builder: RequestBuilder<WithBody>,
    headers: &[(String, String)],
    body: Option<&str>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let builder = apply_headers(builder, headers);
    match body {
        Some(body) => builder.send(body),
        None => builder.send_empty(),
    }
}

/// Flatten `descriptor` into wire form, merging `auth_header` over its headers.
///
/// Params are appended to the URL's query string and the payload is
/// serialized to a JSON body.
pub fn to_http_request(
    descriptor: RequestDescriptor,
    auth_header: Option<&Headers>,
) -> Result<HttpRequest, ApiError> {
    let RequestDescriptor {
        method,
        mut url,
        mut headers,
        payload,
        params,
    } = descriptor;

    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter());
    }

    let body = payload
        .map(|payload| serde_json::to_string(&payload))
        .transpose()
        .map_err(ApiError::Serialization)?;
    if body.is_some() && !headers.contains("content-type") {
        headers.insert("content-type", "application/json");
    }

    if let Some(auth_header) = auth_header {
        headers.merge(auth_header);
    }

    Ok(HttpRequest {
        method,
        url: url.into(),
        headers: headers.into_vec(),
        body,
    })
}

/// Send `descriptor` and return the raw body of a 200 response.
///
/// Any other status becomes [`ApiError::Api`] carrying the status and body.
/// Exactly one attempt is made.
///
/// The outgoing request is dumped at `debug` level with its headers as sent,
/// so debug logs contain the `Authorization` credentials.
pub fn send<T: Transport + ?Sized>(
    transport: &T,
    descriptor: RequestDescriptor,
    auth_header: Option<&Headers>,
) -> Result<String, ApiError> {
    let request = to_http_request(descriptor, auth_header)?;
    debug!("{}", format_request(&request));

    let response = transport.execute(&request)?;
    debug!("{}", format_response(&response));

    if response.status != 200 {
        return Err(ApiError::Api {
            status: response.status,
            body: response.body,
        });
    }
    Ok(response.body)
}
