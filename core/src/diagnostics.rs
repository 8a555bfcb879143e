//! Diagnostic archives of a project, delivered as gzip.

use std::io::Write;

use crate::client::{Destination, RequestDoer};
use crate::context::Context;
use crate::error::Error;
use crate::http::{HttpMethod, Response};
use crate::query::{set_query_params, QueryOptions, QueryParam};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticsListOpts {
    /// Maximum number of entries per log.
    pub limit: i64,
    /// How many minutes of history to include.
    pub minutes: i64,
}

impl QueryOptions for DiagnosticsListOpts {
    fn query_params(&self) -> Vec<QueryParam> {
        vec![
            QueryParam::new("limit", self.limit),
            QueryParam::new("minutes", self.minutes),
        ]
    }
}

pub struct DiagnosticsService<'a, D> {
    client: &'a D,
}

impl<'a, D: RequestDoer> DiagnosticsService<'a, D> {
    pub fn new(client: &'a D) -> Self {
        Self { client }
    }

    /// Stream the group's diagnostic archive into `out`, unmodified.
    ///
    /// `GET groups/{group_id}/diagnostics`
    pub fn get(
        &self,
        ctx: &Context,
        group_id: &str,
        opts: Option<&DiagnosticsListOpts>,
        out: &mut dyn Write,
    ) -> Result<Response, Error> {
        if group_id.is_empty() {
            return Err(Error::argument("group_id"));
        }
        let path = set_query_params(&format!("groups/{group_id}/diagnostics"), opts)?;
        let req = self.client.new_gzip_request(HttpMethod::Get, &path)?;
        self.client.execute(ctx, &req, Destination::Sink(out))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::client::{Client, GZIP_MEDIA_TYPE};
    use crate::error::BoxError;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::options;
    use crate::transport::Transport;

    const ARCHIVE: &[u8] = &[0x1f, 0x8b, 0x08, 0x00, 0xff];

    /// Answers every request with `ARCHIVE` and keeps the last request.
    #[derive(Clone, Default)]
    struct Archive {
        seen: Arc<Mutex<Option<HttpRequest>>>,
    }

    impl Transport for Archive {
        fn round_trip(&self, _ctx: &Context, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            let headers = vec![("content-type".to_string(), GZIP_MEDIA_TYPE.to_string())];
            Ok(HttpResponse::new(200, headers, ARCHIVE))
        }
    }

    fn client_with(transport: Archive) -> Client {
        Client::with_options(
            Some(Box::new(transport)),
            [options::base_url("https://opsmanager.example.com/api/public/v1.0/")],
        )
        .unwrap()
    }

    #[test]
    fn archive_is_requested_as_gzip_and_copied_verbatim() {
        let transport = Archive::default();
        let client = client_with(transport.clone());
        let opts = DiagnosticsListOpts { limit: 100, minutes: 0 };

        let mut out = Vec::new();
        let resp = client
            .diagnostics()
            .get(&Context::background(), "5e66185d917b220fbd8bb4d1", Some(&opts), &mut out)
            .unwrap();
        assert_eq!(resp.header("content-type"), Some(GZIP_MEDIA_TYPE));
        assert_eq!(out, ARCHIVE);

        let req = transport.seen.lock().unwrap().take().unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.url,
            "https://opsmanager.example.com/api/public/v1.0/groups/5e66185d917b220fbd8bb4d1/diagnostics?limit=100"
        );
        assert_eq!(req.header("accept"), Some(GZIP_MEDIA_TYPE));
        assert_eq!(req.header("content-type"), None);
        assert!(req.body.is_none());
    }

    #[test]
    fn empty_group_id_is_rejected_before_any_request() {
        let transport = Archive::default();
        let client = client_with(transport.clone());
        let mut out = Vec::new();

        let err = client
            .diagnostics()
            .get(&Context::background(), "", None, &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::Argument { name: "group_id", .. }));
        assert!(transport.seen.lock().unwrap().is_none());
        assert!(out.is_empty());
    }
}
