//! Request construction and execution against the ops manager API.
//!
//! # Design
//! `Client` holds the base URL, user agent, transport and an optional
//! completion callback, all fixed once construction finishes. Every API call
//! is two steps: `new_request`/`new_gzip_request` produce an `HttpRequest`
//! without touching the network, then `execute` performs the round trip,
//! classifies the status and decodes the body into a [`Destination`].
//!
//! Resource services are written against [`RequestDoer`] rather than
//! `Client`, so they can run over any executor with the same contract.

use std::fmt;
use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::agents::AgentsService;
use crate::context::{Context, ContextReader};
use crate::diagnostics::DiagnosticsService;
use crate::error::{check_response, BoxError, ConfigError, EncodeError, Error};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Response};
use crate::measurements::MeasurementsService;
use crate::options::ClientOpt;
use crate::transport::{Transport, UreqTransport};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CLOUD_URL: &str = "https://cloud.mongodb.com/";
/// Path of the public v1.0 API, relative to the server root.
pub const API_PUBLIC_V1_PATH: &str = "api/public/v1.0/";
pub const DEFAULT_BASE_URL: &str = "https://cloud.mongodb.com/api/public/v1.0/";
pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const GZIP_MEDIA_TYPE: &str = "application/gzip";

/// Placeholder for `new_request` calls that send no body.
pub const NO_BODY: Option<&()> = None;

pub type RequestCompletionCallback = Box<dyn Fn(&HttpRequest, &Response) + Send + Sync>;

/// `<product>/<version> (<os>; <arch>)`
pub fn default_user_agent() -> String {
    format!(
        "{}/{} ({}; {})",
        env!("CARGO_PKG_NAME"),
        VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Where `execute` puts a successful response body.
pub enum Destination<'a> {
    /// Leave the body unread.
    None,
    /// Copy the raw bytes, for gzip requests.
    Sink(&'a mut dyn Write),
    /// Decode the body as JSON.
    Value(&'a mut dyn DecodeTarget),
}

/// A value that can be overwritten from a JSON document.
pub trait DecodeTarget {
    fn decode_json(&mut self, bytes: &[u8]) -> serde_json::Result<()>;
}

impl<T: DeserializeOwned> DecodeTarget for T {
    fn decode_json(&mut self, bytes: &[u8]) -> serde_json::Result<()> {
        *self = serde_json::from_slice(bytes)?;
        Ok(())
    }
}

/// The request pipeline resource services are built on.
pub trait RequestDoer {
    fn new_request<B>(&self, method: HttpMethod, url: &str, body: Option<&B>) -> Result<HttpRequest, Error>
    where
        B: Serialize + ?Sized;

    fn new_gzip_request(&self, method: HttpMethod, url: &str) -> Result<HttpRequest, Error>;

    fn execute(
        &self,
        ctx: &Context,
        request: &HttpRequest,
        destination: Destination<'_>,
    ) -> Result<Response, Error>;

    /// Execute and decode into a fresh `T`; an empty body yields `T::default()`.
    fn execute_json<T>(&self, ctx: &Context, request: &HttpRequest) -> Result<(T, Response), Error>
    where
        T: DeserializeOwned + Default,
    {
        let mut value = T::default();
        let response = self.execute(ctx, request, Destination::Value(&mut value))?;
        Ok((value, response))
    }
}

/// Client for the ops manager public API.
pub struct Client {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) base_url: Url,
    pub(crate) user_agent: String,
    pub(crate) on_request_completed: Option<RequestCompletionCallback>,
}

impl Client {
    /// A client for the cloud API over `transport`, or over a default
    /// [`UreqTransport`] when none is given.
    pub fn new(transport: Option<Box<dyn Transport>>) -> Self {
        let transport = transport.unwrap_or_else(|| Box::new(UreqTransport::new()));
        Self {
            transport,
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            user_agent: default_user_agent(),
            on_request_completed: None,
        }
    }

    /// Like [`Client::new`], then apply `opts` in order. The first failing
    /// option aborts construction.
    pub fn with_options<I>(transport: Option<Box<dyn Transport>>, opts: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = ClientOpt>,
    {
        let mut client = Self::new(transport);
        for opt in opts {
            opt(&mut client)?;
        }
        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Register a callback invoked after every completed round trip.
    pub fn on_request_completed<F>(&mut self, callback: F)
    where
        F: Fn(&HttpRequest, &Response) + Send + Sync + 'static,
    {
        self.on_request_completed = Some(Box::new(callback));
    }

    pub fn agents(&self) -> AgentsService<'_, Self> {
        AgentsService::new(self)
    }

    pub fn diagnostics(&self) -> DiagnosticsService<'_, Self> {
        DiagnosticsService::new(self)
    }

    pub fn measurements(&self) -> MeasurementsService<'_, Self> {
        MeasurementsService::new(self)
    }

    /// Build a JSON request for `url`, relative to the base URL.
    ///
    /// Relative URLs should not start with a slash. A present `body` is sent
    /// as compact JSON with `Content-Type: application/json`.
    pub fn new_request<B>(&self, method: HttpMethod, url: &str, body: Option<&B>) -> Result<HttpRequest, Error>
    where
        B: Serialize + ?Sized,
    {
        let url = self.resolve(url)?;
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(EncodeError::Json)?;

        let mut request = HttpRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            body,
        };
        if request.body.is_some() {
            request.set_header("content-type", JSON_MEDIA_TYPE);
        }
        request.set_header("accept", JSON_MEDIA_TYPE);
        self.set_user_agent(&mut request);
        Ok(request)
    }

    /// Build a bodiless request for an endpoint that answers with a gzip
    /// archive.
    pub fn new_gzip_request(&self, method: HttpMethod, url: &str) -> Result<HttpRequest, Error> {
        let url = self.resolve(url)?;
        let mut request = HttpRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        };
        request.set_header("accept", GZIP_MEDIA_TYPE);
        self.set_user_agent(&mut request);
        Ok(request)
    }

    /// Send `request` and decode the reply into `destination`.
    ///
    /// Once `ctx` is done the call fails with the context's error, even when
    /// the transport itself succeeded or failed for another reason. Non-2xx replies become `Error::Api` and are never
    /// decoded. An empty body leaves a `Destination::Value` untouched.
    pub fn execute(
        &self,
        ctx: &Context,
        request: &HttpRequest,
        destination: Destination<'_>,
    ) -> Result<Response, Error> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let HttpResponse { status, headers, body } = self
            .transport
            .round_trip(ctx, request)
            .map_err(|source| transport_failure(ctx, source))?;
        // A transport may finish after the caller gave up on it.
        if let Some(err) = ctx.err() {
            return Err(Error::Context(err));
        }

        let response = Response { status, headers };
        debug!(status, "request completed");
        if let Some(callback) = &self.on_request_completed {
            callback(request, &response);
        }

        let mut body = ContextReader::new(ctx.clone(), body);
        check_response(request.method, &request.url, &response, &mut body)?;

        match destination {
            Destination::None => {}
            Destination::Sink(sink) => {
                io::copy(&mut body, sink).map_err(|err| match ctx.err() {
                    Some(ctx_err) => Error::Context(ctx_err),
                    None => Error::Copy(err),
                })?;
            }
            Destination::Value(target) => {
                let mut bytes = Vec::new();
                body.read_to_end(&mut bytes)
                    .map_err(|err| transport_failure(ctx, Box::new(err)))?;
                if !bytes.iter().all(u8::is_ascii_whitespace) {
                    target.decode_json(&bytes).map_err(Error::Decode)?;
                }
            }
        }
        Ok(response)
    }

    fn resolve(&self, url: &str) -> Result<Url, Error> {
        if !self.base_url.path().ends_with('/') {
            return Err(ConfigError::MissingTrailingSlash(self.base_url.to_string()).into());
        }
        self.base_url.join(url).map_err(|source| {
            EncodeError::InvalidUrl {
                url: url.to_string(),
                source,
            }
            .into()
        })
    }

    fn set_user_agent(&self, request: &mut HttpRequest) {
        if !self.user_agent.is_empty() {
            request.set_header("user-agent", self.user_agent.as_str());
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("user_agent", &self.user_agent)
            .field("on_request_completed", &self.on_request_completed.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestDoer for Client {
    fn new_request<B>(&self, method: HttpMethod, url: &str, body: Option<&B>) -> Result<HttpRequest, Error>
    where
        B: Serialize + ?Sized,
    {
        Client::new_request(self, method, url, body)
    }

    fn new_gzip_request(&self, method: HttpMethod, url: &str) -> Result<HttpRequest, Error> {
        Client::new_gzip_request(self, method, url)
    }

    fn execute(
        &self,
        ctx: &Context,
        request: &HttpRequest,
        destination: Destination<'_>,
    ) -> Result<Response, Error> {
        Client::execute(self, ctx, request, destination)
    }
}

/// The context's own error when it is done, since that explains the failure
/// better than whatever the transport saw.
fn transport_failure(ctx: &Context, source: BoxError) -> Error {
    match ctx.err() {
        Some(err) => Error::Context(err),
        None => Error::Transport(source),
    }
}
