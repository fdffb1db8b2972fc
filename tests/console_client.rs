use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    routing::{delete, get, post},
    Form, Json, Router,
};
use chrono::{TimeZone, Utc};
use mgraph_console::{
    api::{ConsoleClient, MetricSearch},
    config::ConsoleSettings,
    timezone::TimeNormalizer,
    ConsoleError, MetricsFilter, QueryConfig, Range, RateUnit,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Clone, Default)]
struct Backend {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Backend {
    fn record(&self, path: String, query: Option<String>) {
        let line = match query {
            Some(query) => format!("{}?{}", path, query),
            None => path,
        };
        self.seen.lock().unwrap().push(line);
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

async fn graph(State(backend): State<Backend>, Path(index): Path<String>, RawQuery(query): RawQuery) -> Json<Value> {
    backend.record(format!("/mgraph/{}/graph", index), query);
    Json(json!([
        {"timestamp": 1000, "samples": 0, "count": 0.0},
        {"timestamp": 61000, "samples": 4, "count": 12.25, "m1Rate": 0.5}
    ]))
}

async fn histogram(State(backend): State<Backend>, Path(index): Path<String>, RawQuery(query): RawQuery) -> Json<Value> {
    backend.record(format!("/mgraph/{}/histogram", index), query);
    Json(json!({"bin": [{"percentile": 50.0, "count": 9}, {"percentile": 99.9, "count": 1}]}))
}

async fn metrics(
    State(backend): State<Backend>,
    Path((index, app, kind)): Path<(String, String, String)>,
    RawQuery(query): RawQuery,
) -> String {
    backend.record(format!("/console/{}/metrics/{}/{}", index, app, kind), query.clone());
    format!("<ul data-query=\"{}\"></ul>", query.unwrap_or_default())
}

async fn fstats(Path((_index, _app)): Path<(String, String)>) -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "stats backend down")
}

async fn save_graph(
    State(backend): State<Backend>,
    Path((index, app)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> String {
    let mut fields: Vec<_> = form.into_iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    fields.sort();
    backend.record(format!("/console/{}/savegraph/{}", index, app), Some(fields.join("&")));
    "  g-17\n".to_string()
}

async fn delete_graph(State(backend): State<Backend>, Path((index, id)): Path<(String, String)>) -> (StatusCode, String) {
    backend.record(format!("/console/{}/deletegraph/{}", index, id), None);
    if id == "missing" {
        (StatusCode::NOT_FOUND, "no such graph".to_string())
    } else {
        (StatusCode::OK, String::new())
    }
}

async fn start_backend() -> (Backend, ConsoleSettings) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/mgraph/:index/graph", get(graph))
        .route("/mgraph/:index/histogram", get(histogram))
        .route("/console/:index/metrics/:app/:kind", get(metrics))
        .route("/console/:index/fstats/:app", get(fstats))
        .route("/console/:index/savegraph/:app", post(save_graph))
        .route("/console/:index/deletegraph/:id", delete(delete_graph))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let settings = ConsoleSettings {
        base_url: format!("http://{}", addr),
        index: "essem".to_string(),
        timeout: Duration::from_secs(5),
        search_idle: Duration::from_millis(50),
        default_tz: None,
    };
    (backend, settings)
}

fn config() -> QueryConfig {
    QueryConfig::new("essem", "web", "http requests")
        .with_host("app01")
        .with_range(Range::Day)
}

#[test_log::test(tokio::test)]
async fn test_load_metric_data_converts_timestamps() {
    let (backend, settings) = start_backend().await;
    let client = ConsoleClient::new(&settings).unwrap();

    let points = client.load_metric_data(&config()).await.unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].date, Some(Utc.timestamp_millis_opt(1000).unwrap()));
    assert_eq!(points[1].samples, 4);
    assert_eq!(points[1].value("count"), Some(12.25));

    let seen = backend.seen();
    assert_eq!(
        seen[0],
        "/mgraph/essem/graph?emptyBins=false&aggregateOn=name&downsampleTo=5m&downsampleFn=avg\
         &range=day&limit=5000&name=http%20requests&app=web&host=app01"
    );
}

#[tokio::test]
async fn test_load_metric_data_shifts_into_timezone() {
    let (backend, settings) = start_backend().await;
    let client = ConsoleClient::new(&settings)
        .unwrap()
        .with_normalizer(TimeNormalizer::new(chrono_tz::UTC));

    let t = 1_700_000_000_000;
    let config = config()
        .with_window(t, t + 86_400_000)
        .with_rate_unit(RateUnit::PerMinute)
        .with_timezone("Asia/Tokyo");
    let points = client.load_metric_data(&config).await.unwrap();

    let nine_hours = 9 * 3_600_000;
    assert_eq!(points[0].date, Some(Utc.timestamp_millis_opt(1000 + nine_hours).unwrap()));

    let seen = backend.seen();
    assert!(seen[0].contains("range=day"));
    assert!(seen[0].contains(&format!("rangeStart={}&rangeEnd={}", t, t + 86_400_000)));
    assert!(seen[0].ends_with("&rateUnit=perMinute"));
}

#[tokio::test]
async fn test_load_metric_data_rejects_unknown_timezone() {
    let (_backend, settings) = start_backend().await;
    let client = ConsoleClient::new(&settings).unwrap();

    let err = client
        .load_metric_data(&config().with_timezone("Nowhere/Special"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::InvalidTimezone(_)));
}

#[tokio::test]
async fn test_load_histogram_data() {
    let (backend, settings) = start_backend().await;
    let client = ConsoleClient::new(&settings).unwrap();

    let bins = client.load_histogram_data(&config()).await.unwrap();
    assert_eq!(bins.len(), 2);
    assert_eq!(bins[0].count, 9);
    assert_eq!(
        backend.seen()[0],
        "/mgraph/essem/histogram?range=day&name=http%20requests&app=web&host=app01&units=millis"
    );
}

#[tokio::test]
async fn test_load_metrics_listing() {
    let (_backend, settings) = start_backend().await;
    let client = ConsoleClient::new(&settings).unwrap();
    let filter = MetricsFilter::new("timer", "active");

    let html = client.load_metrics("web", &filter, Some("jvm gc")).await.unwrap();
    assert_eq!(html, "<ul data-query=\"filter=active&prefix=jvm%20gc\"></ul>");

    let html = client.load_metrics("web", &filter, None).await.unwrap();
    assert_eq!(html, "<ul data-query=\"filter=active\"></ul>");
}

#[tokio::test]
async fn test_server_error_surfaces_status_and_body() {
    let (_backend, settings) = start_backend().await;
    let client = ConsoleClient::new(&settings).unwrap();

    let err = client.field_stats(&config(), "mean").await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(500));
    assert_eq!(err.body(), Some("stats backend down"));
}

#[tokio::test]
async fn test_save_graph_trims_id() {
    let (backend, settings) = start_backend().await;
    let client = ConsoleClient::new(&settings).unwrap();

    let form = vec![
        ("title".to_string(), "Request rate".to_string()),
        ("name".to_string(), "http requests".to_string()),
    ];
    let saved = client.save_graph("web", &form).await.unwrap();

    assert_eq!(saved.id, "g-17");
    assert_eq!(saved.location, "/console/essem/usergraph/g-17");
    assert_eq!(
        backend.seen()[0],
        "/console/essem/savegraph/web?name=http requests&title=Request rate"
    );
}

#[tokio::test]
async fn test_delete_graph() {
    let (backend, settings) = start_backend().await;
    let client = ConsoleClient::new(&settings).unwrap();

    client.delete_graph("g-17").await.unwrap();
    assert_eq!(backend.seen(), vec!["/console/essem/deletegraph/g-17".to_string()]);

    let err = client.delete_graph("missing").await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
    assert_eq!(err.body(), Some("no such graph"));
}

#[test_log::test(tokio::test)]
async fn test_metric_search_sends_only_settled_prefix() {
    let (backend, settings) = start_backend().await;
    let client = Arc::new(ConsoleClient::new(&settings).unwrap());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let search = MetricSearch::new(
        client,
        "web",
        MetricsFilter::new("all", "all"),
        settings.search_idle,
        move |result| {
            let _ = tx.send(result);
        },
    );

    search.key_up("j");
    search.key_up("jv");
    search.key_up("jvm");

    let html = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(html, "<ul data-query=\"filter=all&prefix=jvm\"></ul>");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.seen().len(), 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_metric_search_escape_reloads_unfiltered_listing() {
    let (backend, settings) = start_backend().await;
    let client = Arc::new(ConsoleClient::new(&settings).unwrap());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let search = MetricSearch::new(
        client,
        "web",
        MetricsFilter::new("all", "all"),
        settings.search_idle,
        move |result| {
            let _ = tx.send(result);
        },
    );

    search.key_up("jvm");
    let html = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(html, "<ul data-query=\"filter=all&prefix=jvm\"></ul>");

    search.escape();
    let html = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(html, "<ul data-query=\"filter=all\"></ul>");

    assert_eq!(
        backend.seen(),
        vec![
            "/console/essem/metrics/web/all?filter=all&prefix=jvm".to_string(),
            "/console/essem/metrics/web/all?filter=all".to_string(),
        ]
    );
}
