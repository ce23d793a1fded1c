//! Request/response middlewares and the chain that runs them.
//!
//! # Ordering
//! Both legs run in registration order: the first middleware registered is
//! the first to see the outgoing request *and* the first to see the decoded
//! response. This is not the "onion" layering many frameworks use (where the
//! response leg runs in reverse). Compose chains with that in mind.
//!
//! # Failure
//! The first middleware to return `Err` stops the stage. Changes made by
//! earlier middlewares are kept, and the error reaches the caller untouched.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::request::RequestDescriptor;
use crate::response::ResponseModel;

/// A transform applied to every request and every response.
///
/// Both hooks default to the identity, so a middleware only overrides the
/// leg it cares about. Implementations are shared across threads; any
/// internal state needs its own synchronization.
pub trait Middleware: Send + Sync {
    fn process_request(&self, request: RequestDescriptor) -> Result<RequestDescriptor, ApiError> {
        Ok(request)
    }

    fn process_response(&self, _response: &mut dyn ResponseModel) -> Result<(), ApiError> {
        Ok(())
    }

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Ordered, immutable list of middlewares.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middlewares }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Fold `request` through every middleware, first registered first.
    pub fn run_request_stage(&self, request: RequestDescriptor) -> Result<RequestDescriptor, ApiError> {
        self.middlewares.iter().try_fold(request, |request, middleware| {
            debug!(middleware = middleware.name(), "executing request middleware");
            middleware.process_request(request)
        })
    }

    /// Pass `response` through every middleware, in the same order as the request stage.
    pub fn run_response_stage(&self, response: &mut dyn ResponseModel) -> Result<(), ApiError> {
        for middleware in &self.middlewares {
            debug!(
                middleware = middleware.name(),
                model = response.model_name(),
                "executing response middleware"
            );
            middleware.process_response(response)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.middlewares.iter().map(|m| m.name()))
            .finish()
    }
}

/// Stamps `clientToolName` into the JSON object payload of POST requests
/// that do not already carry one.
#[derive(Debug, Clone)]
pub struct ClientToolNameMiddleware {
    name: String,
}

impl ClientToolNameMiddleware {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Middleware for ClientToolNameMiddleware {
    fn process_request(&self, mut request: RequestDescriptor) -> Result<RequestDescriptor, ApiError> {
        if request.method != HttpMethod::Post {
            return Ok(request);
        }
        if let Some(Value::Object(body)) = request.payload.as_mut() {
            body.entry("clientToolName")
                .or_insert_with(|| Value::String(self.name.clone()));
        }
        Ok(request)
    }

    fn name(&self) -> &str {
        "ClientToolNameMiddleware"
    }
}
