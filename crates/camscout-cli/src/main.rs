use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use camscout_client::{JsonFileSink, ReqwestTransport, read_dataset};
use camscout_core::config::{
    DEFAULT_MAP_URL, DEFAULT_MAX_ZOOM, DEFAULT_PAGE_SIZE, DEFAULT_START_ZOOM, DEFAULT_VIEWS_URL,
    DiscoveryConfig, ViewsQueryConfig, default_map_endpoint, default_views_endpoint,
};
use camscout_core::{
    CameraPipeline, CrawlConfig, Endpoint, Region, RetryPolicy, TracingCrawlReporter, ZoomLevel,
};

#[derive(Parser)]
#[command(name = "camscout", version, about = "Traffic camera discovery crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run views harvest and cluster discovery, merge, and write the dataset
    Harvest {
        #[command(flatten)]
        crawl: CrawlArgs,

        /// Output path of the JSON dataset
        #[arg(short, long, env = "CAMSCOUT_OUTPUT", default_value = "cameras.json")]
        output: PathBuf,
    },

    /// Only harvest camera views and print camera id -> HLS sources as JSON
    Views {
        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Only run cluster discovery and print the discovered cameras as JSON
    Discover {
        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Print totals of a previously written dataset
    Summary {
        /// Dataset written by `harvest`
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Western edge of the search region (degrees)
    #[arg(long, env = "CAMSCOUT_WEST", default_value_t = -109.0603, allow_hyphen_values = true)]
    west: f64,

    /// Southern edge of the search region (degrees)
    #[arg(long, env = "CAMSCOUT_SOUTH", default_value_t = 36.9924, allow_hyphen_values = true)]
    south: f64,

    /// Eastern edge of the search region (degrees)
    #[arg(long, env = "CAMSCOUT_EAST", default_value_t = -102.0415, allow_hyphen_values = true)]
    east: f64,

    /// Northern edge of the search region (degrees)
    #[arg(long, env = "CAMSCOUT_NORTH", default_value_t = 41.0034, allow_hyphen_values = true)]
    north: f64,

    /// Zoom level of the initial map query
    #[arg(long, env = "CAMSCOUT_START_ZOOM", default_value_t = DEFAULT_START_ZOOM)]
    start_zoom: u32,

    /// Deepest zoom level clusters are expanded to
    #[arg(long, env = "CAMSCOUT_MAX_ZOOM", default_value_t = DEFAULT_MAX_ZOOM)]
    max_zoom: u32,

    /// Records per views page
    #[arg(long, env = "CAMSCOUT_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Map-features GraphQL endpoint
    #[arg(long, env = "CAMSCOUT_MAP_URL", default_value = DEFAULT_MAP_URL)]
    map_url: String,

    /// Camera-views GraphQL endpoint
    #[arg(long, env = "CAMSCOUT_VIEWS_URL", default_value = DEFAULT_VIEWS_URL)]
    views_url: String,

    /// Total attempts per request, including the first
    #[arg(long, env = "CAMSCOUT_MAX_ATTEMPTS", default_value_t = 8)]
    max_attempts: u32,

    /// Base backoff delay in milliseconds
    #[arg(long, env = "CAMSCOUT_BASE_DELAY_MS", default_value_t = 600)]
    base_delay_ms: u64,

    /// Upper bound of a single backoff delay in milliseconds
    #[arg(long, env = "CAMSCOUT_MAX_DELAY_MS", default_value_t = 20_000)]
    max_delay_ms: u64,

    /// Relative backoff jitter in [0, 1)
    #[arg(long, env = "CAMSCOUT_JITTER", default_value_t = 0.25)]
    jitter: f64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "CAMSCOUT_TIMEOUT_SECS", default_value_t = 45)]
    timeout_secs: u64,

    /// Pause between views pages in milliseconds
    #[arg(long, env = "CAMSCOUT_PAGE_DELAY_MS", default_value_t = 100)]
    page_delay_ms: u64,

    /// Pause after each map query in milliseconds
    #[arg(long, env = "CAMSCOUT_JOB_DELAY_MS", default_value_t = 50)]
    job_delay_ms: u64,
}

impl CrawlArgs {
    fn to_config(&self) -> Result<CrawlConfig> {
        let region = Region::new(self.west, self.south, self.east, self.north)
            .context("Invalid search region")?;

        let config = CrawlConfig {
            region,
            map_endpoint: Endpoint {
                url: self.map_url.clone(),
                ..default_map_endpoint()
            },
            views_endpoint: Endpoint {
                url: self.views_url.clone(),
                ..default_views_endpoint()
            },
            views: ViewsQueryConfig {
                page_size: self.page_size,
                page_delay: Duration::from_millis(self.page_delay_ms),
                ..ViewsQueryConfig::default()
            },
            discovery: DiscoveryConfig {
                start_zoom: ZoomLevel::new(self.start_zoom),
                max_zoom: ZoomLevel::new(self.max_zoom),
                job_delay: Duration::from_millis(self.job_delay_ms),
                ..DiscoveryConfig::default()
            },
            retry: RetryPolicy::default()
                .with_max_attempts(self.max_attempts)
                .with_base_delay(Duration::from_millis(self.base_delay_ms))
                .with_max_delay(Duration::from_millis(self.max_delay_ms))
                .with_jitter(self.jitter),
            request_timeout: Duration::from_secs(self.timeout_secs),
        };
        config.validate().context("Invalid crawl configuration")?;
        Ok(config)
    }

    fn pipeline(&self) -> Result<CameraPipeline<ReqwestTransport>> {
        let config = self.to_config()?;
        let transport = ReqwestTransport::with_timeout(config.request_timeout)
            .context("Failed to create HTTP client")?;
        Ok(CameraPipeline::new(transport, config)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("camscout=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Harvest { crawl, output } => {
            let cancel = cancel_on_ctrl_c();
            cmd_harvest(&crawl, &output, &cancel).await?;
        }
        Commands::Views { crawl } => {
            let cancel = cancel_on_ctrl_c();
            cmd_views(&crawl, &cancel).await?;
        }
        Commands::Discover { crawl } => {
            let cancel = cancel_on_ctrl_c();
            cmd_discover(&crawl, &cancel).await?;
        }
        Commands::Summary { input } => {
            cmd_summary(&input)?;
        }
    }

    Ok(())
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling crawl");
            child.cancel();
        }
    });
    token
}

async fn cmd_harvest(crawl: &CrawlArgs, output: &Path, cancel: &CancellationToken) -> Result<()> {
    let pipeline = crawl.pipeline()?;
    let sink = JsonFileSink::new(output);

    let dataset = pipeline
        .run_to_sink(&sink, cancel, &TracingCrawlReporter)
        .await
        .context("Harvest failed")?;

    println!(
        "Wrote {} cameras ({} with HLS sources, {} placeable) to {}",
        dataset.count(),
        dataset.with_sources_count(),
        dataset.placeable_count(),
        output.display()
    );
    Ok(())
}

async fn cmd_views(crawl: &CrawlArgs, cancel: &CancellationToken) -> Result<()> {
    let pipeline = crawl.pipeline()?;
    let sources = pipeline
        .run_views(cancel, &TracingCrawlReporter)
        .await
        .context("Views harvest failed")?;

    println!("{}", serde_json::to_string_pretty(&sources)?);
    Ok(())
}

async fn cmd_discover(crawl: &CrawlArgs, cancel: &CancellationToken) -> Result<()> {
    let pipeline = crawl.pipeline()?;
    let discovery = pipeline
        .run_discovery(cancel, &TracingCrawlReporter)
        .await
        .context("Discovery failed")?;

    let stats = &discovery.stats;
    tracing::info!(
        queries = stats.queries,
        duplicates_skipped = stats.duplicates_skipped,
        clusters_at_zoom_cap = stats.clusters_at_zoom_cap,
        malformed_features = stats.malformed_features,
        deepest_zoom = ?stats.deepest_zoom.map(ZoomLevel::get),
        "Discovery stats"
    );
    println!("{}", serde_json::to_string_pretty(&discovery.cameras)?);
    Ok(())
}

fn cmd_summary(input: &Path) -> Result<()> {
    let dataset = read_dataset(input)
        .with_context(|| format!("Failed to read dataset: {}", input.display()))?;

    println!(
        "Generated:         {}",
        dataset.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Region:            [{}, {}, {}, {}]",
        dataset.region.west(),
        dataset.region.south(),
        dataset.region.east(),
        dataset.region.north()
    );
    println!("Cameras:           {}", dataset.count());
    println!("With HLS sources:  {}", dataset.with_sources_count());
    println!("Placeable:         {}", dataset.placeable_count());
    Ok(())
}
