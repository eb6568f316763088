use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use swarmwatch_core::relay::{self, Relay};
use swarmwatch_core::report::{AnnotationReport, ReportFormat};
use swarmwatch_core::{CycleOutcome, ScanConfig, ScanScheduler, SchedulerConfig, badge_for};
use swarmwatch_scanner::{AdapterRegistry, CommentRecord, Page, RiskLevel, ScoringClient};
use tokio::task::LocalSet;
use url::Url;
use uuid::Uuid;

const STAGED_AUTHORS: u32 = 1000;
const MAX_ACCOUNT_AGE_DAYS: u32 = 365;
const MAX_POST_VOLUME: u32 = 5000;

/// A comment typed on the command line, before it becomes a [`CommentRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct StagedComment {
    pub author: Option<String>,
    pub text: String,
}

// Helper functions for the handlers

/// Read an HTML snapshot from disk, expanding `~`
pub fn load_page_from_file(path: &Path) -> Result<String, String> {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    let path = Path::new(expanded.as_ref());

    let html = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read page {}: {}", path.display(), e))?;
    if html.trim().is_empty() {
        return Err(format!("Page {} is empty", path.display()));
    }
    Ok(html)
}

/// Accept either a bare host or a full URL and return the lowercased host
pub fn parse_host_arg(arg: &str) -> Option<String> {
    let arg = arg.trim();
    if let Ok(url) = Url::parse(arg)
        && let Some(host) = url.host_str()
    {
        return Some(host.to_lowercase());
    }

    // Bare hosts don't parse on their own
    Url::parse(&format!("http://{}", arg))
        .ok()
        .and_then(|url| url.host_str().map(str::to_lowercase))
}

/// Parse "author: text" or plain "text"
pub fn parse_comment_arg(arg: &str) -> Result<StagedComment, String> {
    if let Some((author, text)) = arg.split_once(':') {
        let author = author.trim();
        let text = text.trim();
        let looks_like_author =
            !author.is_empty() && !author.contains(char::is_whitespace) && !text.starts_with("//");
        if looks_like_author {
            if text.is_empty() {
                return Err(format!("Comment from '{}' has no text", author));
            }
            return Ok(StagedComment {
                author: Some(author.to_string()),
                text: text.to_string(),
            });
        }
    }

    let text = arg.trim();
    if text.is_empty() {
        return Err("Comment text cannot be empty".to_string());
    }
    Ok(StagedComment {
        author: None,
        text: text.to_string(),
    })
}

/// Turn staged comments into scoring records with fresh ids and synthetic metadata
pub fn build_staged_records(comments: Vec<StagedComment>) -> Vec<CommentRecord> {
    let mut rng = rand::rng();
    comments
        .into_iter()
        .map(|comment| CommentRecord {
            id: Uuid::new_v4().to_string(),
            author: comment
                .author
                .unwrap_or_else(|| format!("user_{}", rng.random_range(0..STAGED_AUTHORS))),
            text: comment.text,
            account_age_days: rng.random_range(0..MAX_ACCOUNT_AGE_DAYS),
            post_volume: rng.random_range(0..MAX_POST_VOLUME),
        })
        .collect()
}

/// Load the config file and apply an `--endpoint` override
pub fn resolve_config(config_path: &str, endpoint: Option<&Url>) -> Result<ScanConfig, String> {
    let mut config = ScanConfig::load(config_path).map_err(|e| e.to_string())?;
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint.to_string();
    }
    Ok(config)
}

/// One-line, uncolored summary of a finished cycle
pub fn describe_outcome(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::NoAdapter => "unsupported host, nothing to scan".to_string(),
        CycleOutcome::Idle => "no new comments".to_string(),
        CycleOutcome::Skipped => "previous cycle still running, skipped".to_string(),
        CycleOutcome::Failed(e) => format!("cycle failed: {}", e),
        CycleOutcome::Rendered(summary) => {
            let mut line = format!("annotated {} comment(s)", summary.rendered);
            if summary.stale > 0 {
                line.push_str(&format!(", {} gone before results arrived", summary.stale));
            }
            if summary.already_scanned > 0 {
                line.push_str(&format!(", {} already annotated", summary.already_scanned));
            }
            line
        }
    }
}

fn spinner(quiet: bool) -> anyhow::Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn config_from_args(args: &ArgMatches) -> anyhow::Result<ScanConfig> {
    let config_path = args
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(swarmwatch_core::config::DEFAULT_CONFIG_PATH);
    resolve_config(config_path, args.get_one::<Url>("endpoint")).map_err(anyhow::Error::msg)
}

pub async fn handle_scan(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let page_path = args
        .get_one::<PathBuf>("page")
        .context("--page is required")?;
    let host_arg = args.get_one::<String>("host").context("--host is required")?;
    let host = parse_host_arg(host_arg)
        .with_context(|| format!("'{}' is not a valid host", host_arg))?;
    let cycles = args.get_one::<usize>("cycles").copied();
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let config = config_from_args(args)?;

    let html = load_page_from_file(page_path).map_err(anyhow::Error::msg)?;
    let page = Page::parse(&host, &html).with_viewport_width(config.viewport_width);
    let registry = AdapterRegistry::new()?;

    if !quiet {
        println!("{} Parsed page {}", "✓".green().bold(), page_path.display());
        match registry.resolve(&host) {
            Some(adapter) => println!(
                "{} Host: {} ({} adapter)",
                "→".blue(),
                host.bright_white(),
                adapter.name()
            ),
            None => println!(
                "{} Host {} is not supported; nothing will be annotated",
                "⚠".yellow().bold(),
                host.bright_white()
            ),
        }
        println!("{} Scoring via {}", "→".blue(), config.endpoint.bright_white());
        println!();
    }

    let client = ScoringClient::with_timeout(&config.endpoint, config.timeout_secs)?;
    let (handle, inbox) = relay::channel();
    let page = Rc::new(RefCell::new(page));

    let progress = spinner(quiet)?;
    progress.set_message(format!("Watching {} for comments...", host));
    let cycle_progress = progress.clone();
    let scheduler = ScanScheduler::new(
        page.clone(),
        Rc::new(registry),
        handle,
        SchedulerConfig::from(&config),
    )
    .with_cycle_callback(Rc::new(move |outcome: &CycleOutcome| {
        let line = describe_outcome(outcome);
        match outcome {
            CycleOutcome::Failed(_) => cycle_progress.println(format!("{} {}", "✗".red().bold(), line)),
            CycleOutcome::Rendered(_) => {
                cycle_progress.println(format!("{} {}", "✓".green().bold(), line))
            }
            _ => cycle_progress.set_message(line),
        }
    }));

    LocalSet::new()
        .run_until(async {
            tokio::spawn(Relay::new(client).serve(inbox));
            match cycles {
                Some(cycles) => {
                    scheduler.run_cycles(cycles).await;
                }
                None => {
                    tokio::select! {
                        _ = scheduler.run() => {}
                        _ = tokio::signal::ctrl_c() => {
                            progress.println(format!("{} Interrupted", "→".yellow().bold()));
                        }
                    }
                }
            }
        })
        .await;
    progress.finish_and_clear();

    let report = AnnotationReport::gather(&page.borrow());
    print!("{}", report.render(&format));
    Ok(())
}

pub async fn handle_submit(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let comments = args
        .get_many::<String>("comment")
        .into_iter()
        .flatten()
        .map(|c| parse_comment_arg(c))
        .collect::<Result<Vec<_>, String>>()
        .map_err(anyhow::Error::msg)?;
    let records = build_staged_records(comments);
    let config = config_from_args(args)?;
    let client = ScoringClient::with_timeout(&config.endpoint, config.timeout_secs)?;

    let progress = spinner(quiet)?;
    progress.set_message(format!("Scoring {} comment(s)...", records.len()));
    let results = client.analyze(&records).await;
    progress.finish_and_clear();
    let results = results.context("Scoring request failed")?;

    for record in &records {
        let Some(result) = results.iter().find(|r| r.comment_id == record.id) else {
            println!(
                "{} {}: {}",
                "?".bright_black(),
                record.author.bright_white(),
                record.text
            );
            continue;
        };

        let label = badge_for(result).label;
        let label = match result.risk_level {
            RiskLevel::High => label.red().bold(),
            RiskLevel::Medium => label.yellow().bold(),
            _ => label.green(),
        };
        println!("{}  {}: {}", label, record.author.bright_white(), record.text);
        for flag in &result.flags {
            println!("      • {}", flag.yellow());
        }
    }
    Ok(())
}

pub async fn handle_health(args: &ArgMatches) -> anyhow::Result<()> {
    let config = config_from_args(args)?;
    let client = ScoringClient::with_timeout(&config.endpoint, config.timeout_secs)?;

    let health = client
        .health()
        .await
        .with_context(|| format!("Scoring service at {} is unreachable", config.endpoint))?;

    println!(
        "{} Scoring service: {}",
        "✓".green().bold(),
        health.status.bright_white()
    );
    if let Some(model) = health.model {
        println!("{} Model: {}", "→".blue(), model.bright_white());
    }
    Ok(())
}
