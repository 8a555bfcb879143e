//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port and talks to it through
//! the default ureq transport, so URL resolution, headers, status
//! classification and body handling are all exercised over real HTTP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use opsmngr_core::options;
use opsmngr_core::{
    Client, Context, ContextError, Destination, DiagnosticsListOpts, Error, HttpMethod,
    ProcessMeasurementListOptions, RequestDoer, NO_BODY,
};
use serde::Deserialize;

const GROUP_ID: &str = mock_server::GROUP_ID;

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> Client {
    Client::with_options(
        None,
        [options::base_url(&format!("http://{addr}/api/public/v1.0/"))],
    )
    .unwrap()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Echo {
    content_type: Option<String>,
    accept: Option<String>,
    user_agent: Option<String>,
    body: String,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
struct Named {
    id: String,
    name: String,
}

#[test]
fn agent_links_and_monitoring_agents() {
    let client = client_for(start_server());
    let ctx = Context::background();

    let (links, resp) = client.agents().list_agent_links(&ctx, GROUP_ID).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(links.links.len(), 5);
    assert_eq!(links.links[0].rel, "self");
    assert!(links.results.is_empty());
    assert_eq!(links.total_count, 0);
    assert!(links.next_href().is_none());

    let (agents, _) = client
        .agents()
        .list_agents_by_type(&ctx, GROUP_ID, "MONITORING")
        .unwrap();
    assert_eq!(agents.total_count, 1);
    let agent = &agents.results[0];
    assert_eq!(agent.type_name, "MONITORING");
    assert_eq!(agent.hostname, "example");
    assert_eq!(agent.conf_count, 59);
    assert_eq!(agent.ping_count, 6);
    assert!(agent.is_managed);
    assert_eq!(agent.state_name, "ACTIVE");
    assert_eq!(agent.last_conf, "2015-06-18T14:21:42Z");
}

#[test]
fn rejected_requests_surface_as_api_errors() {
    let client = client_for(start_server());
    let ctx = Context::background();

    let err = client
        .agents()
        .list_agents_by_type(&ctx, GROUP_ID, "BOGUS")
        .unwrap_err();
    let api = err.api().expect("api error");
    assert_eq!(api.status, 400);
    assert_eq!(api.error_code, "INVALID_AGENT_TYPE_NAME");
    assert_eq!(api.reason, "Bad Request");
    assert_eq!(api.detail, "Invalid agent type name BOGUS.");
    assert_eq!(api.parameters, vec![serde_json::json!("BOGUS")]);
    assert_eq!(api.method, HttpMethod::Get);
    assert!(api.url.ends_with(&format!("groups/{GROUP_ID}/agents/BOGUS")));

    let err = client.agents().list_agent_links(&ctx, "unknown").unwrap_err();
    let api = err.api().expect("api error");
    assert_eq!(api.status, 404);
    assert_eq!(api.error_code, "GROUP_NOT_FOUND");
    assert_eq!(api.response.status, 404);
}

#[test]
fn html_error_body_falls_back_to_status_text() {
    let client = client_for(start_server());
    let req = client.new_request(HttpMethod::Get, "broken", NO_BODY).unwrap();
    let err = client
        .execute(&Context::background(), &req, Destination::None)
        .unwrap_err();
    let api = err.api().expect("api error");
    assert_eq!(api.status, 500);
    assert_eq!(api.reason, "Internal Server Error");
    assert!(api.error_code.is_empty());
}

#[test]
fn empty_body_keeps_destination() {
    let client = client_for(start_server());
    let req = client.new_request(HttpMethod::Get, "empty", NO_BODY).unwrap();
    let mut named = Named {
        id: "kept".into(),
        name: "as is".into(),
    };
    let resp = client
        .execute(&Context::background(), &req, Destination::Value(&mut named))
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(named.id, "kept");
}

#[test]
fn request_body_and_headers_reach_the_server() {
    let client = Client::with_options(
        None,
        [
            options::base_url(&format!("http://{}/api/public/v1.0/", start_server())),
            options::user_agent("opsmngr-it"),
        ],
    )
    .unwrap();
    let payload = serde_json::json!({"script": "a < b && c > d"});
    let req = client.new_request(HttpMethod::Post, "echo", Some(&payload)).unwrap();
    let (echo, _): (Echo, _) = client.execute_json(&Context::background(), &req).unwrap();

    assert_eq!(echo.body, r#"{"script":"a < b && c > d"}"#);
    assert_eq!(echo.content_type.as_deref(), Some("application/json"));
    assert_eq!(echo.accept.as_deref(), Some("application/json"));
    let agent = echo.user_agent.unwrap();
    assert!(agent.starts_with("opsmngr-it opsmngr-core/"), "{agent}");
}

#[test]
fn diagnostics_stream_raw_gzip() {
    let client = client_for(start_server());
    let opts = DiagnosticsListOpts {
        limit: 10,
        minutes: 5,
    };
    let mut archive = Vec::new();
    let resp = client
        .diagnostics()
        .get(&Context::background(), GROUP_ID, Some(&opts), &mut archive)
        .unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("content-type"), Some("application/gzip"));
    assert_eq!(resp.header("x-query"), Some("limit=10&minutes=5"));
    assert_eq!(archive, mock_server::DIAGNOSTICS_ARCHIVE);
}

#[test]
fn diagnostics_without_options_send_no_query() {
    let client = client_for(start_server());
    let mut archive = Vec::new();
    let resp = client
        .diagnostics()
        .get(&Context::background(), GROUP_ID, None, &mut archive)
        .unwrap();
    assert_eq!(resp.header("x-query"), Some(""));
    assert!(!archive.is_empty());
}

#[test]
fn host_measurements_repeat_metric_names() {
    let client = client_for(start_server());
    let opts = ProcessMeasurementListOptions {
        granularity: "PT5M".to_string(),
        m: vec!["CONNECTIONS".to_string(), "MEMORY_RESIDENT".to_string()],
        ..ProcessMeasurementListOptions::default()
    };
    let (measurements, _) = client
        .measurements()
        .host(&Context::background(), GROUP_ID, "host-1", Some(&opts))
        .unwrap();

    assert_eq!(measurements.granularity, "PT5M");
    assert_eq!(measurements.host_id, "host-1");
    let names: Vec<&str> = measurements
        .measurements
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(names, ["CONNECTIONS", "MEMORY_RESIDENT"]);
    assert_eq!(measurements.measurements[0].data_points[1].value, None);
}

#[test]
fn deadline_expires_during_slow_request() {
    let client = client_for(start_server());
    let req = client.new_request(HttpMethod::Get, "slow", NO_BODY).unwrap();
    let ctx = Context::background().with_timeout(Duration::from_millis(200));
    let mut named = Named::default();

    let err = client
        .execute(&ctx, &req, Destination::Value(&mut named))
        .unwrap_err();
    assert!(
        matches!(err, Error::Context(ContextError::DeadlineExceeded)),
        "{err:?}"
    );
    assert_eq!(named, Named::default());
}

#[test]
fn cancel_while_in_flight_reports_cancellation() {
    let client = client_for(start_server());
    let req = client.new_request(HttpMethod::Get, "slow", NO_BODY).unwrap();
    let ctx = Context::background();

    let canceler = {
        let ctx = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            ctx.cancel();
        })
    };
    let mut named = Named::default();
    let err = client
        .execute(&ctx, &req, Destination::Value(&mut named))
        .unwrap_err();
    canceler.join().unwrap();

    assert!(matches!(err, Error::Context(ContextError::Canceled)), "{err:?}");
    assert_eq!(named, Named::default());
}

#[test]
fn cancel_ends_wait_without_reading_the_body() {
    let client = client_for(start_server());
    let req = client.new_request(HttpMethod::Get, "slow", NO_BODY).unwrap();
    let ctx = Context::background();

    let canceler = {
        let ctx = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            ctx.cancel();
        })
    };
    let started = Instant::now();
    let err = client.execute(&ctx, &req, Destination::None).unwrap_err();
    let elapsed = started.elapsed();
    canceler.join().unwrap();

    assert!(matches!(err, Error::Context(ContextError::Canceled)), "{err:?}");
    assert!(elapsed < mock_server::SLOW_DELAY / 2, "waited {elapsed:?}");
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = client_for(addr);
    let err = client
        .agents()
        .list_agent_links(&Context::background(), GROUP_ID)
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{err:?}");
}

#[test]
fn completion_callback_sees_every_round_trip() {
    let calls = Arc::new(AtomicUsize::new(0));
    let statuses = Arc::new(std::sync::Mutex::new(Vec::new()));
    let client = {
        let calls = Arc::clone(&calls);
        let statuses = Arc::clone(&statuses);
        Client::with_options(
            None,
            [
                options::base_url(&format!("http://{}/api/public/v1.0/", start_server())),
                options::request_completed(move |_, resp| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    statuses.lock().unwrap().push(resp.status);
                }),
            ],
        )
        .unwrap()
    };
    let ctx = Context::background();

    client.agents().list_agent_links(&ctx, GROUP_ID).unwrap();
    client
        .agents()
        .list_agents_by_type(&ctx, GROUP_ID, "BOGUS")
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*statuses.lock().unwrap(), vec![200, 400]);
}
