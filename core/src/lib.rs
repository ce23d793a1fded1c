//! Request/response pipeline for the MythX analysis API.
//!
//! # Overview
//! A domain request is assembled into a [`RequestDescriptor`], run through
//! the registered [`Middleware`]s, sent over a [`Transport`], checked for a
//! 200 status, decoded into its [`ApiResponse`] model, and finally run
//! through the same middlewares on the way back.
//!
//! ```text
//! ApiRequest ──assemble──▶ RequestDescriptor ──request stage──▶ send ──▶ raw text
//!                                                                        │
//! ApiResponse ◀──response stage── from_json ◀─────────────────────────────┘
//! ```
//!
//! # Design
//! - One blocking round trip per call; no retries, no caching.
//! - [`ApiHandler`] is immutable after construction and `Send + Sync`.
//! - Every failure surfaces as an [`ApiError`] exactly as it was produced.
//! - Middlewares run in registration order on *both* legs.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod models;
pub mod request;
pub mod response;
pub mod transport;

pub use config::{Endpoints, Environment, PipelineConfig};
pub use error::ApiError;
pub use handler::ApiHandler;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use middleware::{ClientToolNameMiddleware, Middleware, MiddlewareChain};
pub use request::{ApiRequest, Headers, Params, RequestDescriptor};
pub use response::{ApiResponse, ResponseModel};
pub use transport::{Transport, UreqTransport};
