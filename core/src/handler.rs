//! The request pipeline: assemble, send, decode.
//!
//! # Design
//! `ApiHandler` holds only immutable state (config, middleware chain,
//! transport), so one instance can be shared across threads behind an `Arc`.
//! Each call owns its own descriptor and response model; nothing is cached
//! and nothing is retried.

use tracing::debug;
use url::Url;

use crate::config::{Environment, PipelineConfig};
use crate::error::ApiError;
use crate::middleware::MiddlewareChain;
use crate::request::{assemble, ApiRequest, Headers, RequestDescriptor};
use crate::response::ApiResponse;
use crate::transport::{self, Transport, UreqTransport};

#[derive(Debug)]
pub struct ApiHandler<T: Transport = UreqTransport> {
    config: PipelineConfig,
    chain: MiddlewareChain,
    transport: T,
}

impl ApiHandler<UreqTransport> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> ApiHandler<T> {
    pub fn with_transport(config: PipelineConfig, transport: T) -> Self {
        let chain = MiddlewareChain::new(config.middlewares.clone());
        Self {
            config,
            chain,
            transport,
        }
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    pub fn base_url(&self) -> Result<&Url, ApiError> {
        self.config.base_url()
    }

    pub fn middlewares(&self) -> &MiddlewareChain {
        &self.chain
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the descriptor for `request` and run the request middlewares over it.
    pub fn assemble_request<R: ApiRequest + ?Sized>(&self, request: &R) -> Result<RequestDescriptor, ApiError> {
        let base_url = self.config.base_url()?;
        let descriptor = assemble(request, base_url)?;
        debug!(method = %descriptor.method, url = %descriptor.url, "assembled request");
        self.chain.run_request_stage(descriptor)
    }

    /// Send an assembled descriptor; returns the raw body of a 200 response.
    pub fn send_request(&self, descriptor: RequestDescriptor, auth_header: Option<&Headers>) -> Result<String, ApiError> {
        transport::send(&self.transport, descriptor, auth_header)
    }

    /// Decode `raw` into `M` and run the response middlewares over it.
    pub fn parse_response<M: ApiResponse>(&self, raw: &str) -> Result<M, ApiError> {
        let mut model = M::from_json(raw)?;
        self.chain.run_response_stage(&mut model)?;
        Ok(model)
    }

    /// Assemble, send and decode in one call.
    pub fn execute<R, M>(&self, request: &R, auth_header: Option<&Headers>) -> Result<M, ApiError>
    where
        R: ApiRequest + ?Sized,
        M: ApiResponse,
    {
        let descriptor = self.assemble_request(request)?;
        let raw = self.send_request(descriptor, auth_header)?;
        self.parse_response(&raw)
    }
}
