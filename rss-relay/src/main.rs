use anyhow::{bail, Context};
use clap::Parser;
use rss_relay::config;
use rss_relay::notify::{LogNotifier, WebhookNotifier};
use rss_relay::publish::{DryRunPublisher, PublishJournal, WebhookPublisher};
use rss_relay::traits::{Notifier, PublishSink};
use rss_relay::{
    reconcile, utils, Collaborators, Database, DuplicateGate, FeedFetcher, FeedParser, RelayConfig,
    Scheduler, TokenCosine, TrackerPolicy,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Watch RSS feeds and publish each genuinely new item once
#[derive(Debug, Parser)]
#[command(name = "rss-relay", version)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Dotenv file providing DISCORD_WEBHOOK_URL and RSS_RELAY_PUBLISH_WEBHOOK
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// JSON state file
    #[arg(long, default_value = "db/db.json")]
    db: PathBuf,

    /// Log publishes instead of sending them and never write state
    #[arg(short = 't', long)]
    dry_run: bool,

    /// Run a single scan and exit
    #[arg(long)]
    once: bool,

    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Dry-run mode: {}", if args.dry_run { "ON" } else { "OFF" });

    if !config::load_env_file(&args.env_file)? {
        debug!("No {} found, using the process environment only", args.env_file.display());
    }

    let config = RelayConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    let settings = &config.settings;

    let mut db = Database::load(&args.db).map_err(|e| {
        error!("{}", e);
        e
    })?;
    reconcile(&mut db, &config.groups, utils::time::now_timestamp());

    let publisher: Arc<dyn PublishSink> = if args.dry_run {
        Arc::new(DryRunPublisher::new(settings.history_limit))
    } else {
        let Some(endpoint) = settings.publish_webhook.clone() else {
            bail!("no publish_webhook configured (or RSS_RELAY_PUBLISH_WEBHOOK set); use --dry-run to test without one");
        };
        let journal_path = settings
            .journal_path
            .clone()
            .unwrap_or_else(|| args.db.with_file_name("journal.json"));
        let journal = PublishJournal::open(journal_path, settings.history_limit)?;
        Arc::new(WebhookPublisher::new(endpoint, journal, settings.timeout_seconds)?)
    };

    let notifier: Arc<dyn Notifier> = match &settings.notify_webhook {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => {
            warn!("No notification webhook configured, events go to the log only");
            Arc::new(LogNotifier)
        }
    };

    let services = Collaborators {
        transport: Arc::new(FeedFetcher::new(settings.fetch_config())?),
        extractor: Arc::new(FeedParser::new()),
        gate: DuplicateGate::new(settings.gate_config(), Arc::new(TokenCosine)),
        publisher,
        notifier,
    };
    let policy = TrackerPolicy {
        retry_interval: settings.retry_interval_seconds,
        on_publish_failure: settings.on_publish_failure,
    };

    let db_path = (!args.dry_run).then(|| args.db.clone());
    let mut scheduler = Scheduler::new(config.groups.clone(), db, db_path, services, policy);

    if args.once {
        let next_due = scheduler.run_once().await;
        info!("Single scan done, next update would be at {}", utils::time::format_timestamp(next_due));
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Stop signal received");
        trigger.cancel();
    });

    scheduler.run(shutdown).await;
    info!("RSS Relay finished");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
