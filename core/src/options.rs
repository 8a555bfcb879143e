//! Construction-time options for `Client::with_options`.
//!
//! Options run in the order given and each may fail; a later option
//! overrides what an earlier one set. `skip_verify` and `ca_validate` both
//! replace the transport's TLS settings, so only the last of them counts.

use tracing::debug;
use url::Url;

use crate::client::Client;
use crate::error::{ConfigError, Error};
use crate::http::{HttpRequest, Response};
use crate::transport::TlsTrust;

pub type ClientOpt = Box<dyn FnOnce(&mut Client) -> Result<(), Error>>;

/// Point the client at another server, e.g.
/// `https://opsmanager.example.com:8080/api/public/v1.0/`.
pub fn base_url(url: &str) -> ClientOpt {
    let url = url.to_string();
    Box::new(move |client| {
        let parsed = Url::parse(&url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: url.clone(),
            source,
        })?;
        debug!(base_url = %parsed, "configured base URL");
        client.base_url = parsed;
        Ok(())
    })
}

/// Prefix the default user agent with `product`.
pub fn user_agent(product: &str) -> ClientOpt {
    let product = product.to_string();
    Box::new(move |client| {
        client.user_agent = format!("{product} {}", client.user_agent);
        Ok(())
    })
}

/// Disable server certificate verification.
pub fn skip_verify() -> ClientOpt {
    Box::new(|client| {
        client.transport.apply_tls(&TlsTrust::SkipVerify)?;
        Ok(())
    })
}

/// Trust only the certificate authorities in the PEM bundle `ca`.
pub fn ca_validate(ca: &str) -> ClientOpt {
    let trust = TlsTrust::CaPem(ca.to_string());
    Box::new(move |client| {
        client.transport.apply_tls(&trust)?;
        Ok(())
    })
}

pub fn request_completed<F>(callback: F) -> ClientOpt
where
    F: Fn(&HttpRequest, &Response) + Send + Sync + 'static,
{
    Box::new(move |client| {
        client.on_request_completed(callback);
        Ok(())
    })
}
