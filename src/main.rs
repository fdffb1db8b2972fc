use std::sync::Arc;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use mgraph_console::{
    api::{ConsoleClient, MetricSearch},
    config::ConsoleSettings,
    labels, logging, metrics,
    query::{self, MetricsFilter, QueryConfig},
    range::{Range, RateUnit},
    timezone::{parse_timezone, OffsetStrategy, TimeNormalizer},
    ConsoleError, Result,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "mgraph-console", version, about = "Query and chart helper for the mgraph metrics console")]
struct Cli {
    /// Base URL of the console (overrides MGRAPH_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Metrics index (overrides MGRAPH_INDEX)
    #[arg(long, global = true)]
    index: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Dump client metrics to stderr on exit
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a time series and print it with display dates
    Graph(GraphArgs),
    /// Fetch a percentile histogram
    Histogram(GraphArgs),
    /// Print the graph, histogram and permalink URLs without fetching
    Urls(GraphArgs),
    /// Print the label for the displayed window
    RangeDetail(GraphArgs),
    /// List metrics of an app
    Metrics(ListArgs),
    /// Search metrics; each stdin line is the current search box text
    Search(ListArgs),
    /// Field statistics fragment
    Fstats {
        #[command(flatten)]
        graph: GraphArgs,
        /// Opaque token passed through to the server
        #[arg(long)]
        t: Option<String>,
    },
    /// Save a graph from key=value form fields
    SaveGraph {
        #[arg(long)]
        app: String,
        #[arg(value_parser = parse_form_field)]
        fields: Vec<(String, String)>,
    },
    /// Delete a saved graph
    DeleteGraph { id: String },
}

#[derive(Debug, Args)]
struct GraphArgs {
    #[arg(long)]
    app: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    field: Option<String>,
    #[arg(long, default_value = "hour", value_parser = lenient_range)]
    range: Range,
    #[arg(long = "fn", default_value = "avg")]
    downsample_fn: String,
    #[arg(long)]
    rate_unit: Option<RateUnit>,
    /// Window start, epoch millis
    #[arg(long)]
    start: Option<i64>,
    /// Window end, epoch millis
    #[arg(long)]
    end: Option<i64>,
    /// IANA timezone for display dates
    #[arg(long)]
    tz: Option<String>,
    /// Evaluate timezone offsets at each point instead of once
    #[arg(long)]
    per_point_offsets: bool,
    #[arg(long, default_value = "")]
    y_label: String,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long)]
    app: String,
    #[arg(long = "type", default_value = "all")]
    type_filter: String,
    #[arg(long = "filter", default_value = "all")]
    activity_filter: String,
    #[arg(long)]
    prefix: Option<String>,
}

fn lenient_range(s: &str) -> std::result::Result<Range, String> {
    Ok(Range::parse_lenient(s))
}

fn parse_form_field(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

impl GraphArgs {
    fn to_config(&self, settings: &ConsoleSettings) -> QueryConfig {
        QueryConfig {
            index: settings.index.clone(),
            app: self.app.clone(),
            host: self.host.clone(),
            name: self.name.clone(),
            field: self.field.clone(),
            range: self.range,
            downsample_fn: self.downsample_fn.clone(),
            rate_unit: self.rate_unit,
            start_timestamp: self.start,
            end_timestamp: self.end,
            tz: self.tz.clone().or_else(|| settings.default_tz.clone()),
            t: None,
        }
    }

    fn strategy(&self) -> OffsetStrategy {
        if self.per_point_offsets {
            OffsetStrategy::PerPoint
        } else {
            OffsetStrategy::CurrentMoment
        }
    }
}

impl ListArgs {
    fn filter(&self) -> MetricsFilter {
        MetricsFilter {
            type_filter: self.type_filter.clone(),
            activity_filter: self.activity_filter.clone(),
            prefix: self.prefix.clone(),
        }
    }
}

fn settings(cli: &Cli) -> Result<ConsoleSettings> {
    let mut settings = ConsoleSettings::from_env()?;
    if let Some(url) = &cli.url {
        settings.base_url = url.clone();
    }
    if let Some(index) = &cli.index {
        settings.index = index.clone();
    }
    settings.validate()?;
    Ok(settings)
}

async fn run(cli: &Cli) -> Result<()> {
    let settings = settings(cli)?;
    let client = ConsoleClient::new(&settings)?;

    match &cli.command {
        Command::Graph(args) => {
            let config = args.to_config(&settings);
            let client = client.with_normalizer(TimeNormalizer::system().with_strategy(args.strategy()));
            let now = Utc::now();
            let tz = config.tz.as_deref().map(parse_timezone).transpose()?;
            let hover_format = labels::hover_format(tz.as_ref(), &now);

            println!("{}", labels::app_title(&config));
            println!("{}", client.normalizer().range_detail(&config, &now)?);
            let field = config.field.as_deref().unwrap_or("count");
            for point in client.load_metric_data(&config).await? {
                println!(
                    "{}",
                    labels::hover_text(&point, field, &args.y_label, config.rate_unit, &hover_format)
                );
            }
        }
        Command::Histogram(args) => {
            let config = args.to_config(&settings);
            for bin in client.load_histogram_data(&config).await? {
                println!("{:>8.2} {}", bin.percentile, bin.count);
            }
        }
        Command::Urls(args) => {
            let config = args.to_config(&settings);
            println!("{}", client.graph_url(&config));
            println!("{}", client.url(&query::histogram_endpoint(&config)));
            println!("{}", client.url(&query::permalink(&config)));
        }
        Command::RangeDetail(args) => {
            let config = args.to_config(&settings);
            let normalizer = TimeNormalizer::system().with_strategy(args.strategy());
            println!("{}", normalizer.range_detail(&config, &Utc::now())?);
        }
        Command::Metrics(args) => {
            println!("{}", client.load_metrics(&args.app, &args.filter(), None).await?);
        }
        Command::Search(args) => search(Arc::new(client), args, &settings).await?,
        Command::Fstats { graph, t } => {
            let mut config = graph.to_config(&settings);
            config.t = t.clone();
            let field = config.field.clone().unwrap_or_else(|| "count".to_string());
            println!("{}", client.field_stats(&config, &field).await?);
        }
        Command::SaveGraph { app, fields } => {
            let saved = client.save_graph(app, fields).await?;
            println!("{}", client.url(&saved.location));
        }
        Command::DeleteGraph { id } => client.delete_graph(id).await?,
    }
    Ok(())
}

async fn search(client: Arc<ConsoleClient>, args: &ListArgs, settings: &ConsoleSettings) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let search = MetricSearch::new(client, args.app.clone(), args.filter(), settings.search_idle, move |result| {
        let _ = tx.send(result);
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut awaiting = false;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = line.map_err(|e| ConsoleError::Internal(format!("stdin: {}", e)))?;
                match line {
                    Some(line) => {
                        if line == "\u{1b}" {
                            search.escape();
                        } else {
                            search.key_up(&line);
                        }
                        awaiting = true;
                    }
                    None => break,
                }
            }
            Some(result) = rx.recv() => print_listing(result),
        }
    }

    if awaiting {
        let wait = settings.search_idle + settings.timeout;
        if let Ok(Some(result)) = tokio::time::timeout(wait, rx.recv()).await {
            print_listing(result);
        }
    }
    Ok(())
}

fn print_listing(result: Result<String>) {
    match result {
        Ok(html) => println!("{}", html),
        Err(err) => eprintln!("{}", err),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logger("mgraph_console", cli.verbose, cli.json_logs) {
        eprintln!("{}", e);
    }

    let outcome = run(&cli).await;

    if cli.print_metrics {
        match metrics::render() {
            Ok(text) => eprintln!("{}", text),
            Err(e) => eprintln!("{}", e),
        }
    }

    if let Err(e) = outcome {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
