use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use prsync::cache::Caches;
use prsync::github::{GithubClient, RateLimit, auth};
use prsync::pr::TrackedPullRequest;
use prsync::sync::{SyncEngine, SyncSettings};
use prsync::util::config::AppConfig;
use prsync::util::time::relative_time;

#[derive(Parser, Debug)]
#[command(name = "prsync", version, about = "Rank the pull requests waiting on you")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a refresh cycle even if `refresh_on_start` is off
    #[arg(short, long, conflicts_with = "offline")]
    refresh: bool,

    /// Only show what is cached
    #[arg(long)]
    offline: bool,

    /// Remove every cache file before loading
    #[arg(long)]
    reset_cache: bool,

    /// Mark a pull request as viewed, e.g. `org/repo#42`
    #[arg(long, value_name = "PR")]
    viewed: Option<String>,

    /// Enable debug logging to file
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    let _guard = setup_logging(&config, cli.debug)?;

    info!("prsync starting");

    let token = match auth::resolve_token(config.github.token.as_deref()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Authentication error: {e}");
            std::process::exit(1);
        }
    };

    if config.github.username.is_empty() {
        eprintln!(
            "No username configured. Please add it to your config file.\n\
             Example config (~/.config/prsync/config.toml):\n\n\
             [github]\n\
             username = \"my-login\""
        );
        std::process::exit(1);
    }

    let client = GithubClient::new(&token, &config.github.api_url, config.sync.page_size)?;

    let cache_dir = config.cache_dir();
    let caches = Caches::load(&cache_dir, config.sync.abandoned_age_days, Utc::now()).await;
    if cli.reset_cache {
        caches.clear_all().await?;
        info!(dir = %cache_dir.display(), "Cache reset");
    }

    let (engine, mut outputs) = SyncEngine::new(client, caches, SyncSettings::from_config(&config));

    let mut status_rx = outputs.status;
    let status_printer = tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            if !status.is_empty() {
                eprintln!("{status}");
            }
        }
    });

    if let Some(pr) = cli.viewed.as_deref() {
        let (org, repo, number) = parse_pr_ref(pr)?;
        if !engine.mark_viewed(&org, &repo, number).await? {
            bail!("{pr} is not in the cache");
        }
    }

    engine.load_from_cache().await;

    let refresh = !cli.offline && (cli.refresh || config.sync.refresh_on_start);
    if refresh && !engine.refresh().await {
        eprintln!("A refresh is already running");
    }
    // Dropping the engine closes the status channel; the printer exits once
    // it has written every queued line.
    drop(engine);
    if let Err(e) = status_printer.await {
        warn!(error = %e, "Status printer failed");
    }

    let mut latest: HashMap<String, TrackedPullRequest> = HashMap::new();
    while let Ok(pr) = outputs.updates.try_recv() {
        latest.insert(pr.key(), pr);
    }
    let mut quota: Option<RateLimit> = None;
    while let Ok(rl) = outputs.quota.try_recv() {
        quota = Some(rl);
    }

    let mut ranked: Vec<_> = latest.into_values().filter(|pr| pr.is_open()).collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    print_ranked(&ranked);

    if let Some(rl) = quota {
        println!(
            "\nAPI quota: {}/{} (resets {})",
            rl.remaining,
            rl.limit,
            rl.reset_at.map_or_else(|| "?".to_string(), |t| relative_time(&t)),
        );
    }

    Ok(())
}

fn print_ranked(prs: &[TrackedPullRequest]) {
    if prs.is_empty() {
        println!("Nothing to review.");
        return;
    }

    for pr in prs {
        let score = if pr.importance == f64::MAX {
            "ready".to_string()
        } else {
            format!("{:.0}", pr.importance)
        };
        let updated = pr
            .remote
            .as_ref()
            .map(|r| relative_time(&r.updated_at))
            .unwrap_or_default();
        println!(
            "{score:>6}  {}/{}#{}  {}  ({}, {updated})",
            pr.org,
            pr.repo,
            pr.number,
            pr.title(),
            pr.derived.author,
        );

        let breakdown: Vec<String> = pr
            .importance_breakdown
            .iter()
            .map(|(term, value)| format!("{term} {value:.0}"))
            .collect();
        if !breakdown.is_empty() {
            println!("        {}", breakdown.join(", "));
        }
    }
}

/// Parse `org/repo#42`.
fn parse_pr_ref(s: &str) -> Result<(String, String, u64)> {
    let (path, number) = s
        .split_once('#')
        .with_context(|| format!("Expected org/repo#number, got {s:?}"))?;
    let (org, repo) = path
        .split_once('/')
        .with_context(|| format!("Expected org/repo#number, got {s:?}"))?;
    let number = number
        .parse()
        .with_context(|| format!("Invalid pull request number in {s:?}"))?;
    Ok((org.to_string(), repo.to_string(), number))
}

fn setup_logging(
    config: &AppConfig,
    debug: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    if !debug {
        return Ok(None);
    }

    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "prsync.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter("prsync=debug")
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}
