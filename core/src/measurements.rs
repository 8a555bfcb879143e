//! Host measurements: time series of process metrics.

use serde::{Deserialize, Serialize};

use crate::client::{RequestDoer, NO_BODY};
use crate::context::Context;
use crate::error::Error;
use crate::http::{HttpMethod, Response};
use crate::query::{set_query_params, ListOptions, QueryOptions, QueryParam};
use crate::types::{null_as_empty, Link};

/// Query options for `MeasurementsService::host`.
///
/// Either `period` or `start` and `end` bound the series; `m` limits it to
/// the named metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessMeasurementListOptions {
    pub list: ListOptions,
    /// `PT1M`, `PT5M`, `PT1H` or `P1D`.
    pub granularity: String,
    /// ISO-8601 duration, e.g. `P1DT12H`.
    pub period: String,
    pub start: String,
    pub end: String,
    pub m: Vec<String>,
}

impl QueryOptions for ProcessMeasurementListOptions {
    fn query_params(&self) -> Vec<QueryParam> {
        let mut params = self.list.query_params();
        params.extend([
            QueryParam::new("granularity", &self.granularity),
            QueryParam::new("period", &self.period),
            QueryParam::new("start", &self.start),
            QueryParam::new("end", &self.end),
            QueryParam::new("m", self.m.as_slice()),
        ]);
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessMeasurements {
    pub end: String,
    pub granularity: String,
    pub group_id: String,
    pub host_id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub links: Vec<Link>,
    #[serde(deserialize_with = "null_as_empty")]
    pub measurements: Vec<Measurements>,
    pub process_id: String,
    pub start: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurements {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data_points: Vec<DataPoint>,
    pub name: String,
    #[serde(default)]
    pub units: String,
}

/// A sample; `value` is `None` where the server reports no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: String,
    pub value: Option<f64>,
}

pub struct MeasurementsService<'a, D> {
    client: &'a D,
}

impl<'a, D: RequestDoer> MeasurementsService<'a, D> {
    pub fn new(client: &'a D) -> Self {
        Self { client }
    }

    /// `GET groups/{group_id}/hosts/{host_id}/measurements`
    pub fn host(
        &self,
        ctx: &Context,
        group_id: &str,
        host_id: &str,
        opts: Option<&ProcessMeasurementListOptions>,
    ) -> Result<(ProcessMeasurements, Response), Error> {
        if group_id.is_empty() {
            return Err(Error::argument("group_id"));
        }
        if host_id.is_empty() {
            return Err(Error::argument("host_id"));
        }
        let path = set_query_params(&format!("groups/{group_id}/hosts/{host_id}/measurements"), opts)?;
        let req = self.client.new_request(HttpMethod::Get, &path, NO_BODY)?;
        self.client.execute_json(ctx, &req)
    }
}
