use anyhow::{Context, Result, anyhow};
use clap::Parser;
use occdb::connection::config::DatabaseConfig;
use occdb::connection::connect;
use occdb::demo::{Demo, DemoOptions};
use occdb::harness::HarnessConfig;
use occdb::model::TableNames;
use occdb::report::{ConsoleReporter, JsonReporter, Reporter};
use occdb::store::{EntityStore, StoreConfig};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Demonstrates optimistic concurrency control over employees and timers.
///
/// Connection settings come from `DB_*` environment variables (or `.env`).
#[derive(Debug, Parser)]
#[command(name = "occdb", version)]
struct Cli {
    /// How long the concurrency harness observes contention
    #[arg(long, default_value_t = 10)]
    observation_secs: u64,

    /// Emit one JSON object per line instead of text
    #[arg(long)]
    json: bool,

    /// Skip the concurrency harness
    #[arg(long)]
    skip_harness: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = DatabaseConfig::from_env()
        .map_err(|err| anyhow!(err))
        .context("failed to load database configuration")?;
    let tables = TableNames::default();
    let datastore = connect(&config, &tables)
        .await
        .with_context(|| format!("failed to open {}", config.to_url()))?;
    info!(backend = %config.backend, "datastore ready");

    let reporter: Box<dyn Reporter> = if cli.json {
        Box::new(JsonReporter::stdout())
    } else {
        Box::new(ConsoleReporter::stdout())
    };

    let options = DemoOptions {
        harness: (!cli.skip_harness).then(|| {
            HarnessConfig::default().observation(Duration::from_secs(cli.observation_secs))
        }),
    };

    let store = EntityStore::new(StoreConfig::new(tables));
    Demo::new(store, datastore, reporter.as_ref())
        .run(&options, &config.to_url())
        .await?;

    info!("demo finished");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("occdb=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
