//! The HTTP round trip underneath `Client`.
//!
//! # Design
//! `Client` only needs one capability from the network layer: send an
//! `HttpRequest` and hand back the status, headers and a body reader. Keeping
//! that behind [`Transport`] lets tests substitute in-memory transports and
//! lets callers bring their own authenticated stack.
//!
//! [`UreqTransport`] is the default. Non-2xx statuses are returned as data,
//! never as transport errors, so the client's error classifier sees them.
//!
//! A ureq call cannot be interrupted from outside, so each round trip runs on
//! its own short-lived thread while the caller waits on a channel and watches
//! the context. When the context is done the caller stops waiting and the
//! abandoned thread exits once ureq returns, at the latest at the context's
//! deadline. No thread is kept between calls.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::debug;
use ureq::tls::{PemItem, RootCerts, TlsConfig};

use crate::context::Context;
use crate::error::{BoxError, ConfigError};
use crate::http::{HttpRequest, HttpResponse};

/// TLS trust settings applied when the client is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsTrust {
    /// Accept any server certificate.
    SkipVerify,
    /// Trust only the certificates in this PEM bundle.
    CaPem(String),
}

/// Sends requests for a `Client`. Must be safe to share across threads.
pub trait Transport: Send + Sync {
    /// Perform one round trip. `ctx` carries the caller's deadline; a
    /// transport should give up once it passes.
    fn round_trip(&self, ctx: &Context, request: &HttpRequest) -> Result<HttpResponse, BoxError>;

    /// Install TLS trust settings. Transports that cannot be reconfigured
    /// keep the default, which refuses.
    fn apply_tls(&mut self, trust: &TlsTrust) -> Result<(), ConfigError> {
        let _ = trust;
        Err(ConfigError::TlsUnsupported)
    }
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: build_agent(None),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn round_trip(&self, ctx: &Context, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = match &request.body {
            Some(body) => self.run_configured(ctx, builder.body(body.clone().into_bytes())?)?,
            None => self.run_configured(ctx, builder.body(())?)?,
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect();
        Ok(HttpResponse::new(status, headers, response.into_body().into_reader()))
    }

    fn apply_tls(&mut self, trust: &TlsTrust) -> Result<(), ConfigError> {
        let (tls, mode) = match trust {
            TlsTrust::SkipVerify => (
                TlsConfig::builder().disable_verification(true).build(),
                "skip-verify",
            ),
            TlsTrust::CaPem(pem) => {
                let certificates = parse_ca_bundle(pem)?;
                let tls = TlsConfig::builder()
                    .root_certs(RootCerts::new_with_certs(&certificates))
                    .build();
                (tls, "custom-ca")
            }
        };
        self.agent = build_agent(Some(tls));
        debug!(mode, "installed TLS trust settings");
        Ok(())
    }
}

/// How often a waiting caller looks at its context.
const CONTEXT_POLL: Duration = Duration::from_millis(10);

impl UreqTransport {
    /// Run `request` on a worker thread and wait until it answers or `ctx`
    /// is done, whichever comes first.
    fn run_configured<S>(
        &self,
        ctx: &Context,
        request: ureq::http::Request<S>,
    ) -> Result<ureq::http::Response<ureq::Body>, BoxError>
    where
        S: ureq::AsSendBody + Send + 'static,
    {
        let mut configured = self.agent.configure_request(request);
        if let Some(remaining) = ctx.remaining() {
            configured = configured.timeout_global(Some(remaining));
        }
        let request = configured.build();

        let agent = self.agent.clone();
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("opsmngr-round-trip".to_string())
            .spawn(move || {
                // The receiver is gone when the caller stopped waiting.
                let _ = reply_tx.send(agent.run(request));
            })?;

        loop {
            if let Some(err) = ctx.err() {
                debug!(%err, "abandoning round trip");
                return Err(Box::new(err));
            }
            match reply_rx.recv_timeout(CONTEXT_POLL) {
                Ok(reply) => return reply.map_err(Into::into),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err("round trip thread exited without a reply".into())
                }
            }
        }
    }
}

fn build_agent(tls: Option<TlsConfig>) -> ureq::Agent {
    let mut config = ureq::Agent::config_builder().http_status_as_error(false);
    if let Some(tls) = tls {
        config = config.tls_config(tls);
    }
    config.build().new_agent()
}

fn parse_ca_bundle(pem: &str) -> Result<Vec<ureq::tls::Certificate<'static>>, ConfigError> {
    let mut certificates = Vec::new();
    for item in ureq::tls::parse_pem(pem.as_bytes()) {
        if let PemItem::Certificate(certificate) =
            item.map_err(|source| ConfigError::InvalidCaBundle(source.to_string()))?
        {
            certificates.push(certificate);
        }
    }
    if certificates.is_empty() {
        return Err(ConfigError::InvalidCaBundle(
            "no certificate blocks found".to_string(),
        ));
    }
    Ok(certificates)
}
