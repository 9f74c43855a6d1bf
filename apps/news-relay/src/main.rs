use clap::Parser;
use gemini_engine::{init_logging, GeminiClient};
use news_relay::extractor::ReadabilityExtractor;
use news_relay::fetcher::{FeedSource, HackerNewsSource, NewsSource};
use news_relay::format::PostStyle;
use news_relay::pipeline::DEFAULT_EXCERPT_CHARS;
use news_relay::publisher::{DryRunPublisher, Publisher, TelegramPublisher};
use news_relay::translator::{GeminiTranslator, Translator};
use news_relay::{Config, Pipeline, Relay, RunSettings, Schedule, Scheduler, SeenStore, SourceKind, Trigger};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "news-relay", version, about = "Translate top tech news and post it to a Telegram channel")]
struct Cli {
    /// Run the pipeline once and exit instead of following the schedule
    #[arg(long)]
    once: bool,

    /// Log rendered messages instead of sending them; the seen store is left untouched
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();
    let cli = Cli::parse();

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;
    info!(?config, once = cli.once, dry_run = cli.dry_run, "Starting news relay");

    let store = SeenStore::load(&config.seen_store_path, config.seen_capacity).map_err(|e| {
        error!(error = %e, "Failed to load seen store");
        e
    })?;
    info!(path = %store.path().display(), entries = store.len(), "Seen store ready");

    // Shared HTTP client (reused for connection pooling); every call is bounded by its timeout
    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .user_agent(concat!("news-relay/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let source: Arc<dyn NewsSource> = match &config.source {
        SourceKind::Feed(urls) => Arc::new(FeedSource::new(http_client.clone(), urls.clone())),
        SourceKind::HackerNews(api_base) => Arc::new(HackerNewsSource::new(http_client.clone(), api_base.clone())),
    };

    let gemini = GeminiClient::new(
        http_client.clone(),
        config.gemini_api_key.clone(),
        config.gemini_base_url.clone(),
        config.gemini_model.clone(),
    );
    let translator = Translator::new(Arc::new(GeminiTranslator::new(gemini)), config.http_timeout);

    let publisher: Arc<dyn Publisher> = if cli.dry_run {
        Arc::new(DryRunPublisher)
    } else {
        Arc::new(TelegramPublisher::new(
            http_client.clone(),
            config.telegram_api_base.clone(),
            config.telegram_bot_token.clone(),
            config.telegram_channel_id.clone(),
        ))
    };

    let settings = RunSettings {
        fetch_count: config.fetch_count,
        post_quota: config.post_quota,
        target_language: config.target_language.clone(),
        translate_body: config.translate_body,
        excerpt_chars: DEFAULT_EXCERPT_CHARS,
        candidate_timeout: config.candidate_timeout,
        record_seen: !cli.dry_run,
        style: PostStyle {
            signature: config.channel_signature.clone(),
            max_chars: None,
        },
    };

    let pipeline = Pipeline::new(
        source,
        Arc::new(ReadabilityExtractor::new(http_client)),
        translator,
        publisher,
        store,
        settings,
    );
    let relay = Relay::new(pipeline);

    if cli.once {
        if let Some(report) = relay.trigger(Trigger::Startup).await {
            info!(published = report.published.len(), "Single run complete");
        }
        return Ok(());
    }

    let schedule = Schedule::new(config.post_times.clone(), config.timezone);
    for time in schedule.times() {
        info!(time = %time.format("%H:%M"), timezone = %config.timezone, "Scheduled daily run");
    }

    Scheduler::new(schedule, relay)
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("News relay stopped");
    Ok(())
}
