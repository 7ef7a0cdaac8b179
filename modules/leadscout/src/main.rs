use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use browserless_client::BrowserlessClient;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use leadscout::render::BrowserlessFactory;
use leadscout::{BatchScheduler, RunContext, StdinOperator};
use leadscout_common::{load_config, AppConfig};

#[derive(Parser)]
#[command(name = "leadscout", about = "Resumable crawl-and-classify over paginated listing pages")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, default_value = "./config/leadscout.toml")]
    config: PathBuf,

    /// First listing page (overrides crawl.start_page)
    #[arg(long)]
    start_page: Option<u32>,

    /// Last listing page (overrides crawl.end_page)
    #[arg(long)]
    end_page: Option<u32>,

    /// Directory for the CSV outputs (overrides output.dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("leadscout=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("LeadScout starting...");

    let env = AppConfig::from_env()?;
    let mut config = load_config(&cli.config)?;
    if let Some(page) = cli.start_page {
        config.crawl.start_page = page;
    }
    if let Some(page) = cli.end_page {
        config.crawl.end_page = page;
    }
    if let Some(dir) = cli.output_dir {
        config.output.dir = dir;
    }
    config.validate()?;

    // One request covers navigation, the element wait and the scroll loop.
    let scroll = config.crawl.scroll_pause() * config.crawl.scroll_rounds;
    let request_timeout = config.crawl.navigation_timeout()
        + config.crawl.element_wait()
        + scroll
        + Duration::from_secs(10);
    let client = BrowserlessClient::new(
        &env.browserless_url,
        env.browserless_token.as_deref(),
        request_timeout,
    )
    .context("Failed to build Browserless client")?;
    let factory = Arc::new(BrowserlessFactory::new(
        Arc::new(client),
        config.crawl.navigation_timeout(),
    ));

    let mut ctx = RunContext::open(&config).with_context(|| {
        format!("Failed to open output directory {}", config.output.dir.display())
    })?;
    let mut scheduler = BatchScheduler::from_config(&config, factory, Arc::new(StdinOperator))?;

    let outcome = scheduler.run(&mut ctx).await;
    ctx.stats.total_processed = ctx.checkpoint.processed_count();
    ctx.stats.total_qualified = ctx.checkpoint.qualified_count();
    info!("{}", ctx.stats);

    if let Err(e) = outcome {
        error!(error = %e, "Crawl aborted");
        return Err(e.into());
    }
    Ok(())
}
