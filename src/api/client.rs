use chrono::{Local, TimeZone, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::fmt::Display;
use tracing::{debug, info};

use crate::{
    config::ConsoleSettings,
    error::{report, ConsoleError, Result},
    metrics::{record_points_normalized, RequestTimer},
    models::{DataPoint, HistogramBin, HistogramResponse, SavedGraph},
    query::{self, MetricsFilter, QueryConfig},
    range::Range,
    timezone::TimeNormalizer,
};

/// HTTP client for the metrics API and console fragments.
///
/// Requests built from a [`QueryConfig`] use the config's own index; the
/// rest use the index the client was configured with.
#[derive(Debug, Clone)]
pub struct ConsoleClient<Z: TimeZone = Local> {
    http: Client,
    base_url: String,
    index: String,
    default_tz: Option<String>,
    normalizer: TimeNormalizer<Z>,
}

impl ConsoleClient<Local> {
    pub fn new(settings: &ConsoleSettings) -> Result<Self> {
        settings.validate()?;
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            index: settings.index.clone(),
            default_tz: settings.default_tz.clone(),
            normalizer: TimeNormalizer::system(),
        })
    }
}

impl<Z> ConsoleClient<Z>
where
    Z: TimeZone,
    Z::Offset: Display,
{
    /// Swaps the zone that display dates are computed against.
    pub fn with_normalizer<Z2>(self, normalizer: TimeNormalizer<Z2>) -> ConsoleClient<Z2>
    where
        Z2: TimeZone,
    {
        ConsoleClient {
            http: self.http,
            base_url: self.base_url,
            index: self.index,
            default_tz: self.default_tz,
            normalizer,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn normalizer(&self) -> &TimeNormalizer<Z> {
        &self.normalizer
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Absolute link to the raw JSON behind a graph.
    pub fn graph_url(&self, config: &QueryConfig) -> String {
        self.url(&query::graph_endpoint(config))
    }

    async fn send(&self, endpoint: &'static str, request: RequestBuilder) -> Result<String> {
        let timer = RequestTimer::new(endpoint);
        let outcome = execute(request).await;
        if let Err(err) = &outcome {
            timer.fail();
            report(err);
        }
        outcome
    }

    async fn get_text(&self, endpoint: &'static str, path: &str) -> Result<String> {
        debug!("GET {}", path);
        self.send(endpoint, self.http.get(self.url(path))).await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str, path: &str) -> Result<T> {
        let body = self.get_text(endpoint, path).await?;
        serde_json::from_str(&body).map_err(|e| {
            let err = ConsoleError::from(e);
            report(&err);
            err
        })
    }

    /// Metric listing fragment for `app`, filtered by type, activity and prefix.
    pub async fn load_metrics(&self, app: &str, filter: &MetricsFilter, override_prefix: Option<&str>) -> Result<String> {
        let path = query::metrics_endpoint(&self.index, app, filter, override_prefix);
        info!("Loading metrics for {}", app);
        self.get_text("metrics", &path).await
    }

    /// Graph points with display dates derived for the configured (or
    /// default) timezone.
    pub async fn load_metric_data(&self, config: &QueryConfig) -> Result<Vec<DataPoint>> {
        info!("Loading graph data: {} ({})", config.name, config.range);
        let points: Vec<DataPoint> = self.get_json("graph", &query::graph_endpoint(config)).await?;
        let tz = config.tz.as_deref().or(self.default_tz.as_deref());
        let points = self.normalizer.normalize(points, tz, &Utc::now())?;
        record_points_normalized(points.len());
        Ok(points)
    }

    pub async fn load_histogram_data(&self, config: &QueryConfig) -> Result<Vec<HistogramBin>> {
        info!("Loading histogram: {} ({})", config.name, config.range);
        let histogram: HistogramResponse = self
            .get_json("histogram", &query::histogram_endpoint(config))
            .await?;
        Ok(histogram.bin)
    }

    pub async fn field_stats(&self, config: &QueryConfig, field: &str) -> Result<String> {
        self.get_text("fstats", &query::field_stats_endpoint(config, field))
            .await
    }

    pub async fn field_stats_for_range(&self, config: &QueryConfig, field: &str, range: Range) -> Result<String> {
        self.get_text("fstats", &query::field_stats_dialog_endpoint(config, field, range))
            .await
    }

    pub async fn stats(&self) -> Result<String> {
        self.get_text("stats", &query::stats_endpoint(&self.index)).await
    }

    pub async fn user_graphs(&self) -> Result<String> {
        self.get_text("usergraphs", &query::user_graphs_endpoint(&self.index))
            .await
    }

    /// The save-graph form fragment for one field of the current graph.
    pub async fn save_graph_form(&self, config: &QueryConfig, field: &str) -> Result<String> {
        self.get_text("savegraph_form", &query::save_graph_form_endpoint(config, field))
            .await
    }

    /// Posts a filled save-graph form; the server answers with the new id.
    pub async fn save_graph(&self, app: &str, form: &[(String, String)]) -> Result<SavedGraph> {
        let path = query::save_graph_endpoint(&self.index, app);
        info!("Saving graph for {}", app);
        let body = self
            .send("savegraph", self.http.post(self.url(&path)).form(form))
            .await?;

        let id = body.trim();
        if id.is_empty() {
            let err = ConsoleError::Internal("save returned an empty graph id".to_string());
            report(&err);
            return Err(err);
        }
        Ok(SavedGraph {
            id: id.to_string(),
            location: query::user_graph_location(&self.index, id),
        })
    }

    pub async fn delete_graph(&self, id: &str) -> Result<()> {
        let path = query::delete_graph_endpoint(&self.index, id);
        info!("Deleting graph {}", id);
        self.send("deletegraph", self.http.delete(self.url(&path)))
            .await
            .map(|_| ())
    }
}

async fn execute(request: RequestBuilder) -> Result<String> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ConsoleError::Http { status, body });
    }
    Ok(body)
}
