use std::time::Duration;

use axum::{
    extract::{Path, RawQuery},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, info};
use url::form_urlencoded;

pub const API_PREFIX: &str = "/api/public/v1.0";
/// The only project the server knows about.
pub const GROUP_ID: &str = "5e66185d917b220fbd8bb4d1";
pub const SLOW_DELAY: Duration = Duration::from_millis(1500);

/// `{"diagnostics":"ok"}\n`, gzip-compressed.
pub const DIAGNOSTICS_ARCHIVE: &[u8] = &[
    0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x03, 0xab, 0x56, 0x4a, 0xc9, 0x4c,
    0x4c, 0xcf, 0xcb, 0x2f, 0x2e, 0xc9, 0x4c, 0x2e, 0x56, 0xb2, 0x52, 0xca, 0xcf, 0x56, 0xaa,
    0xe5, 0x02, 0x00, 0x69, 0x4f, 0x3d, 0x8c, 0x15, 0x00, 0x00, 0x00,
];

const AGENT_VECTORS: &str = include_str!("../../test-vectors/agents.json");

pub fn app() -> Router {
    let api = Router::new()
        .route("/groups/{group_id}/agents", get(list_agent_links))
        .route("/groups/{group_id}/agents/{agent_type}", get(list_agents_by_type))
        .route("/groups/{group_id}/diagnostics", get(diagnostics))
        .route(
            "/groups/{group_id}/hosts/{host_id}/measurements",
            get(host_measurements),
        )
        .route("/echo", post(echo))
        .route("/slow", get(slow))
        .route("/empty", get(empty))
        .route("/broken", get(broken));
    Router::new().nest(API_PREFIX, api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock ops manager listening");
    }
    axum::serve(listener, app()).await
}

/// A case from `test-vectors/agents.json` by name.
pub fn fixture_case(name: &str) -> Option<Value> {
    let vectors: Value = serde_json::from_str(AGENT_VECTORS).ok()?;
    vectors["cases"]
        .as_array()?
        .iter()
        .find(|case| case["name"] == name)
        .cloned()
}

fn fixture_response(name: &str) -> Response {
    let Some(case) = fixture_case(name) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let reply = &case["simulated_response"];
    let status = reply["status"]
        .as_u64()
        .and_then(|status| u16::try_from(status).ok())
        .and_then(|status| StatusCode::from_u16(status).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply["body"].clone())).into_response()
}

/// Error document in the shape ops manager uses for every non-2xx reply.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub detail: String,
    pub error: u16,
    pub error_code: String,
    pub parameters: Vec<String>,
    pub reason: String,
}

fn api_error(status: StatusCode, error_code: &str, detail: String, parameters: Vec<&str>) -> Response {
    let body = ErrorBody {
        detail,
        error: status.as_u16(),
        error_code: error_code.to_string(),
        parameters: parameters.into_iter().map(str::to_string).collect(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
    };
    (status, Json(body)).into_response()
}

fn group_not_found(group_id: &str) -> Response {
    api_error(
        StatusCode::NOT_FOUND,
        "GROUP_NOT_FOUND",
        format!("No group with ID {group_id} exists."),
        vec![group_id],
    )
}

/// Decode a raw query into pairs, keeping repeated keys in order.
pub fn query_pairs(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

async fn list_agent_links(Path(group_id): Path<String>) -> Response {
    if group_id != GROUP_ID {
        return group_not_found(&group_id);
    }
    fixture_response("list agent links")
}

async fn list_agents_by_type(Path((group_id, agent_type)): Path<(String, String)>) -> Response {
    if group_id != GROUP_ID {
        return group_not_found(&group_id);
    }
    match agent_type.as_str() {
        "MONITORING" => fixture_response("list monitoring agents"),
        "BACKUP" | "AUTOMATION" => Json(json!({"links": [], "results": [], "totalCount": 0})).into_response(),
        _ => fixture_response("unknown agent type"),
    }
}

async fn diagnostics(
    Path(group_id): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    if group_id != GROUP_ID {
        return group_not_found(&group_id);
    }
    let accept = headers.get(header::ACCEPT).and_then(|value| value.to_str().ok());
    if accept != Some("application/gzip") {
        return api_error(
            StatusCode::NOT_ACCEPTABLE,
            "NOT_ACCEPTABLE",
            "Diagnostics are only available as application/gzip.".to_string(),
            Vec::new(),
        );
    }
    debug!(?query, "serving diagnostics archive");
    (
        [
            (header::CONTENT_TYPE.as_str(), "application/gzip".to_string()),
            ("x-query", query.unwrap_or_default()),
        ],
        DIAGNOSTICS_ARCHIVE,
    )
        .into_response()
}

async fn host_measurements(
    Path((group_id, host_id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Response {
    if group_id != GROUP_ID {
        return group_not_found(&group_id);
    }
    let pairs = query_pairs(query.as_deref().unwrap_or_default());
    let granularity = pairs
        .iter()
        .find(|(key, _)| key == "granularity")
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| "PT1M".to_string());
    let mut metrics: Vec<&str> = pairs
        .iter()
        .filter(|(key, _)| key == "m")
        .map(|(_, value)| value.as_str())
        .collect();
    if metrics.is_empty() {
        metrics.push("CONNECTIONS");
    }

    let measurements: Vec<Value> = metrics
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "units": "SCALAR",
                "dataPoints": [
                    {"timestamp": "2020-03-10T00:00:00Z", "value": 1.0},
                    {"timestamp": "2020-03-10T00:01:00Z", "value": null}
                ]
            })
        })
        .collect();

    Json(json!({
        "end": "2020-03-10T00:01:00Z",
        "granularity": granularity,
        "groupId": group_id,
        "hostId": host_id,
        "links": [],
        "measurements": measurements,
        "processId": format!("{host_id}:27017"),
        "start": "2020-03-10T00:00:00Z"
    }))
    .into_response()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoReply {
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub user_agent: Option<String>,
    /// The request body exactly as received.
    pub body: String,
}

async fn echo(headers: HeaderMap, body: String) -> Json<EchoReply> {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    Json(EchoReply {
        content_type: header_value(header::CONTENT_TYPE),
        accept: header_value(header::ACCEPT),
        user_agent: header_value(header::USER_AGENT),
        body,
    })
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(SLOW_DELAY).await;
    Json(json!({"id": "slow", "name": "slow"}))
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "<html>upstream failure</html>")
}
