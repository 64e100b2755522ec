use std::{path::Path, sync::Arc};

use anyhow::{bail, Context};
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use herald_core::{
    config::{self, Config},
    domain::DraftStatus,
    gateway::{
        throttled::{ThrottleConfig, ThrottledGateway},
        GatewayRegistry,
    },
    locks::DraftLocks,
    notify::{LogNotifier, Notifier},
    publisher::Publisher,
    router::PublishRouter,
    scheduler::{PostScheduler, SchedulerConfig},
    store::{AccountStore, JsonFileStore},
};
use herald_telegram::{BotApi, TelegramGateway, TelegramNotifier, TelegramSettings, TelegramTarget};

const USAGE: &str = "usage: herald [run | publish <draft-id> | schedule <draft-id> <rfc3339> | test <destination-id> | drafts]";

struct App {
    store: Arc<JsonFileStore>,
    publisher: Publisher,
    scheduler: PostScheduler,
}

fn build(cfg: &Config) -> anyhow::Result<App> {
    let store = Arc::new(JsonFileStore::new(cfg.store_path.clone()));
    let api = Arc::new(BotApi::new(cfg.telegram_api_url.as_deref())?);

    let telegram = Arc::new(TelegramGateway::new(
        api.clone(),
        TelegramSettings {
            caption_limit: cfg.telegram_caption_limit,
            text_limit: cfg.telegram_text_limit,
            chunk_delay: cfg.chunk_delay,
            caption_followup_delay: cfg.caption_followup_delay,
        },
    ));
    let registry = GatewayRegistry::new()
        .with(Arc::new(ThrottledGateway::new(
            telegram,
            ThrottleConfig::default(),
        )))
        .with_unsupported_placeholders();
    let router = Arc::new(PublishRouter::new(Arc::new(registry), cfg.part_delay));
    let locks = Arc::new(DraftLocks::new());

    let notifier: Arc<dyn Notifier> = match (&cfg.notify_chat_id, &cfg.legacy_telegram) {
        (Some(chat_id), Some(creds)) => Arc::new(TelegramNotifier::new(
            api,
            TelegramTarget {
                bot_token: creds.bot_token.clone(),
                chat_id: chat_id.clone(),
                thread_id: None,
            },
        )),
        (Some(_), None) => {
            warn!("HERALD_NOTIFY_CHAT_ID is set without TELEGRAM_BOT_TOKEN; notifications go to the log");
            Arc::new(LogNotifier)
        }
        _ => Arc::new(LogNotifier),
    };

    let publisher = Publisher::new(store.clone(), router.clone(), locks.clone())
        .with_legacy(cfg.legacy_telegram.clone())
        .with_defaults(cfg.publish_defaults())
        .with_max_content_length(cfg.max_content_length);

    let scheduler = PostScheduler::new(
        store.clone(),
        router,
        notifier,
        locks,
        SchedulerConfig {
            interval: cfg.scheduler_interval,
            legacy: cfg.legacy_telegram.clone(),
            options: cfg.publish_defaults(),
        },
    );

    Ok(App {
        store,
        publisher,
        scheduler,
    })
}

async fn run(app: App) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let handle = app.scheduler.spawn(cancel.clone());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    cancel.cancel();
    handle.await.context("scheduler task panicked")?;
    Ok(())
}

async fn schedule(app: &App, draft_id: &str, when: &str) -> anyhow::Result<()> {
    let at = DateTime::parse_from_rfc3339(when)
        .with_context(|| format!("invalid RFC 3339 timestamp: {when}"))?;
    app.store
        .set_draft_status(draft_id, DraftStatus::Scheduled, Some(at.timestamp_millis()))
        .await?;
    println!("Scheduled {draft_id} for {}", at.with_timezone(&Utc).to_rfc3339());
    Ok(())
}

async fn list_drafts(app: &App) -> anyhow::Result<()> {
    let drafts = app.store.list_drafts().await?;
    if drafts.is_empty() {
        println!("No drafts in {}", app.store.path().display());
        return Ok(());
    }
    for d in drafts {
        let when = d
            .scheduled_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let status = match d.status {
            DraftStatus::Draft => "draft",
            DraftStatus::Scheduled => "scheduled",
            DraftStatus::Published => "published",
        };
        println!("{}\t{status}\t{when}\t{}", d.id, d.display_title());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG may come from .env, so it loads before logging starts.
    let exported = config::load_dotenv(Path::new(".env"))?;
    herald_core::logging::init("herald")?;
    if exported > 0 {
        info!(count = exported, "loaded variables from .env");
    }

    let cfg = Config::load()?;
    let app = build(&cfg)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] | ["run"] => run(app).await,
        ["publish", draft_id] => {
            let report = app.publisher.publish_draft(draft_id).await?;
            println!("{}", report.message);
            Ok(())
        }
        ["schedule", draft_id, when] => schedule(&app, draft_id, when).await,
        ["test", destination_id] => {
            app.publisher.test_connection(destination_id).await?;
            println!("Connection to {destination_id} works");
            Ok(())
        }
        ["drafts"] => list_drafts(&app).await,
        _ => bail!(USAGE),
    }
}
