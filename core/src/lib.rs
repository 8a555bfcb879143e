//! Client for the MongoDB Ops Manager public API.
//!
//! # Overview
//! [`Client`] resolves request paths against a base URL, attaches the
//! standard headers, sends the request through a pluggable [`Transport`] and
//! decodes the JSON (or streams the gzip) reply. Resource services such as
//! [`AgentsService`] sit on top of the [`RequestDoer`] trait.
//!
//! # Design
//! - One request per call, on the calling thread. No retries, no caching.
//! - Cancellation and deadlines travel in a caller-supplied [`Context`].
//! - Errors separate configuration, encoding, transport, context, API and
//!   decode failures so callers can react to each.
//! - Query options are declared per type through [`QueryOptions`] instead of
//!   being discovered at runtime.

pub mod agents;
pub mod client;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod http;
pub mod measurements;
pub mod options;
pub mod query;
pub mod transport;
pub mod types;

pub use agents::{Agent, Agents, AgentsService};
pub use client::{
    Client, DecodeTarget, Destination, RequestCompletionCallback, RequestDoer, DEFAULT_BASE_URL,
    GZIP_MEDIA_TYPE, JSON_MEDIA_TYPE, NO_BODY,
};
pub use context::{Context, ContextError};
pub use diagnostics::{DiagnosticsListOpts, DiagnosticsService};
pub use error::{ApiError, ConfigError, EncodeError, Error};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Response};
pub use measurements::{MeasurementsService, ProcessMeasurementListOptions, ProcessMeasurements};
pub use options::ClientOpt;
pub use query::{set_query_params, ListOptions, QueryOptions, QueryParam, QueryValue};
pub use transport::{TlsTrust, Transport, UreqTransport};
pub use types::{Link, Paginated};
