//! # yell
//!
//! Assembles the board: settings, logging, the SQLite store, the engine,
//! the two retention jobs and the HTTP server.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState};
use auth_adapters::SvgCaptchaRenderer;
use chrono::TimeDelta;
use configs::{LogFormat, Settings};
use domains::{Clock, SystemClock};
use secrecy::ExposeSecret;
use services::{
    spawn_job, BoardEngine, CaptchaPruner, CaptchaService, HtmlSanitizer, JobTrigger, PageCache,
    PostPolicy, PostService, RetentionPruner,
};
use storage_adapters::SqliteStore;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "yell=info,services=info,api_adapters=info,tower_http=info";

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn seconds(secs: u64) -> anyhow::Result<TimeDelta> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .with_context(|| format!("{secs} seconds is out of range"))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_tracing(settings.log.format);

    let store = Arc::new(
        SqliteStore::connect(
            settings.database.url.expose_secret(),
            settings.database.max_connections,
        )
        .await
        .context("failed to open the database")?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let posts = PostService::new(
        store.clone(),
        Arc::new(HtmlSanitizer),
        clock.clone(),
        PostPolicy {
            page_size: settings.board.page_size,
            delete_code_length: settings.board.delete_code_length,
            trusted_image_hosts: settings.board.trusted_image_hosts.clone(),
        },
    );
    let captchas = CaptchaService::new(
        store.clone(),
        Arc::new(SvgCaptchaRenderer::default()),
        clock.clone(),
    );
    let cache = Arc::new(PageCache::new(
        settings.board.cached_pages,
        seconds(settings.board.cache_ttl_secs)?,
        clock.clone(),
    ));
    let engine = Arc::new(BoardEngine::new(posts, captchas, cache));

    let jobs = [
        spawn_job(
            Arc::new(RetentionPruner::new(store.clone(), settings.board.max_threads)),
            JobTrigger::Interval(settings.board.prune_interval()),
        ),
        spawn_job(
            Arc::new(CaptchaPruner::new(
                store.clone(),
                clock.clone(),
                seconds(settings.captcha.ttl_secs)?,
            )),
            JobTrigger::Interval(settings.captcha.prune_interval()),
        ),
    ];

    let app = router(AppState::new(engine, settings.report_to.as_str()));
    let address = settings.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("could not bind {address}"))?;
    info!("yell is listening at http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    for job in jobs {
        let name = job.name();
        job.stop().await;
        info!(job = name, "job stopped");
    }
    store.pool().close().await;
    info!("shutdown complete");
    Ok(())
}
