use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::templates::{catalogue, preview_content};
use shared::{
    build_caption, spawn_scheduler, CardRenderer, Config, ContentExtractor, HttpFeedSource,
    NewsPipeline, Orchestrator, RunOutcome, RunRequest, SeenStore, WebhookNotifier,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tech-poster")]
#[command(about = "Turn fresh tech headlines into poster cards")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once and print the run summary as JSON
    Run {
        /// Comma-separated template ids (midnight, aurora, slate, sunrise, matrix, paper)
        #[arg(short, long, value_delimiter = ',')]
        templates: Vec<String>,

        /// Number of articles to select (clamped to 5)
        #[arg(short, long, allow_negative_numbers = true)]
        max_posts: Option<i64>,

        /// Also print a publishing caption per poster
        #[arg(long)]
        captions: bool,
    },
    /// Run on a fixed interval until Ctrl-C
    Schedule {
        #[arg(short, long, value_delimiter = ',')]
        templates: Vec<String>,

        #[arg(short, long, allow_negative_numbers = true)]
        max_posts: Option<i64>,
    },
    /// List the most recently seen article URLs
    Seen {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// List the available poster templates
    Templates,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_orchestrator(config: &Config, seen: Arc<SeenStore>) -> Result<Orchestrator> {
    let feeds = HttpFeedSource::new(config.http_timeout())?;
    let extractor = ContentExtractor::new(config.http_timeout())?;
    let pipeline = NewsPipeline::new(
        Arc::new(feeds),
        Arc::new(extractor),
        seen,
        config.rss_feeds.clone(),
        config.lookback_hours,
    );
    let renderer = CardRenderer::new(config.output_dir.clone(), config.card_style());
    let notifier =
        WebhookNotifier::new(config.slack_webhook_url.clone(), config.webhook_url.clone())?;

    let mut orchestrator =
        Orchestrator::new(pipeline, Arc::new(renderer), config.orchestrator_settings());
    if notifier.is_enabled() {
        orchestrator = orchestrator.with_notifier(Arc::new(notifier));
    }
    Ok(orchestrator)
}

fn request(templates: Vec<String>, max_posts: Option<i64>) -> RunRequest {
    let mut request = RunRequest::manual().with_templates(templates);
    request.max_posts = max_posts;
    request
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = Config::from_env()?;

    match args.command {
        Command::Templates => {
            for info in catalogue() {
                println!("{:<9} {:<18} {}", info.id, info.label, info.description);
            }
            let sample = preview_content(config.default_template);
            println!("\nDefault: {} (preview: \"{}\")", config.default_template, sample.title);
        }
        Command::Seen { limit } => {
            let seen = SeenStore::open(&config.data_dir)?;
            println!("{} URLs seen so far", seen.len()?);
            for record in seen.recent(limit)? {
                println!(
                    "  {}  {}",
                    record.first_seen.format("%Y-%m-%d %H:%M"),
                    record.url
                );
            }
        }
        Command::Run {
            templates,
            max_posts,
            captions,
        } => {
            let seen = Arc::new(SeenStore::open(&config.data_dir)?);
            let orchestrator = build_orchestrator(&config, seen)?;

            let outcome = orchestrator.trigger(request(templates, max_posts)).await?;
            orchestrator.flush_notifications().await;

            match outcome {
                RunOutcome::Completed(summary) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&summary)
                            .context("Failed to encode run summary")?
                    );
                    if captions {
                        for poster in orchestrator.snapshot().last_results {
                            println!("\n--- {} ---", poster.image);
                            println!("{}", build_caption(&poster.article, &config.hashtags));
                        }
                    }
                }
                RunOutcome::Skipped => println!("A run is already in progress."),
                RunOutcome::Failed { run_id, error } => {
                    anyhow::bail!("Run {} failed: {}", run_id, error);
                }
            }
        }
        Command::Schedule {
            templates,
            max_posts,
        } => {
            if !config.enable_scheduler {
                anyhow::bail!("Scheduler disabled via configuration (ENABLE_SCHEDULER).");
            }
            let seen = Arc::new(SeenStore::open(&config.data_dir)?);
            let orchestrator = Arc::new(build_orchestrator(&config, seen)?);

            println!(
                "✓ Scheduler running every {} minute(s). Press Ctrl-C to stop.",
                config.schedule_interval_minutes
            );
            let handle = spawn_scheduler(
                orchestrator.clone(),
                config.schedule_interval(),
                request(templates, max_posts),
            );

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            handle.abort();
            orchestrator.flush_notifications().await;
            println!("\nScheduler stopped.");
        }
    }

    Ok(())
}
