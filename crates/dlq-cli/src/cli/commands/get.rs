//! `dlq get` – download URLs through a bounded admission gate.

use anyhow::{Context, Result};
use clap::Args;
use dlq_core::config::DlqConfig;
use dlq_core::url_model::DestinationNamer;
use dlq_core::{
    AdmissionGate, HttpFetch, ReleaseOrder, Request, RetryOverrides, TokioExecutor, WorkerReport,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Args)]
pub struct GetArgs {
    /// HTTP/HTTPS URLs to download.
    #[arg(required_unless_present = "list")]
    pub urls: Vec<String>,

    /// Read URLs from FILE: one `URL [DEST]` per line, a field starting with `#` begins a comment.
    #[arg(long, value_name = "FILE")]
    pub list: Option<PathBuf>,

    /// Directory for downloaded files (default: current directory).
    #[arg(short = 'o', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Maximum concurrent downloads (default: `capacity` from config).
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Attempts per download, including the first one.
    #[arg(long, value_name = "N")]
    pub attempts: Option<u32>,

    /// Seconds to wait between attempts.
    #[arg(long, value_name = "SECS", value_parser = parse_wait)]
    pub wait: Option<Duration>,

    /// Give freed slots to the most recently queued URL instead of the oldest.
    #[arg(long)]
    pub lifo: bool,

    /// Panic the worker when a download finally fails, instead of only reporting it.
    #[arg(long)]
    pub fail_loudly: bool,

    /// Replace files that already exist at the destination.
    #[arg(long)]
    pub overwrite: bool,
}

/// One line of a `--list` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub url: String,
    pub dest: Option<PathBuf>,
}

pub async fn run_get(cfg: &DlqConfig, args: GetArgs) -> Result<()> {
    let mut entries: Vec<ListEntry> = args
        .urls
        .iter()
        .map(|url| ListEntry {
            url: url.clone(),
            dest: None,
        })
        .collect();
    if let Some(list) = args.list.as_deref() {
        let text = std::fs::read_to_string(list)
            .with_context(|| format!("failed to read URL list {}", list.display()))?;
        entries.extend(parse_list(&text).with_context(|| format!("in {}", list.display()))?);
    }
    if entries.is_empty() {
        anyhow::bail!("no URLs to download");
    }

    let dir = match args.dir.clone() {
        Some(d) => d,
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create download dir {}", dir.display()))?;
    let mut namer = DestinationNamer::new(&dir);
    let planned = plan_downloads(entries, &mut namer);

    let policy = cfg.retry_policy().resolve(&RetryOverrides {
        max_attempts: args.attempts,
        wait: args.wait,
    });
    let order = if args.lifo {
        ReleaseOrder::Lifo
    } else {
        cfg.effective_release_order()
    };
    let capacity = args.jobs.unwrap_or_else(|| cfg.effective_capacity());
    let mut http = cfg.http_options();
    if args.overwrite {
        http.overwrite_existing = true;
    }

    let abort = Arc::new(AtomicBool::new(false));
    let signal_abort = Arc::clone(&abort);
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, aborting downloads");
            tracing::warn!("interrupted; aborting running transfers");
            signal_abort.store(true, Ordering::Relaxed);
        }
    });

    let gate = AdmissionGate::builder(capacity)
        .retry(policy)
        .release_order(order)
        .executor(TokioExecutor::current())
        .build(HttpFetch::new(http).with_abort(abort))?;
    tracing::info!(
        count = planned.len(),
        capacity,
        attempts = policy.max_attempts,
        "starting downloads"
    );

    for (url, dest) in planned {
        let request = Request::new(url, dest)
            .block_on_error(args.fail_loudly)
            .on_complete(print_report);
        gate.submit(request)?;
    }

    let gate = tokio::task::spawn_blocking(move || {
        gate.drain();
        gate
    })
    .await
    .context("drain task failed")?;
    signal_task.abort();

    let stats = gate.stats();
    println!("{} succeeded, {} failed", stats.succeeded, stats.failed);
    if stats.failed > 0 {
        anyhow::bail!("{} download(s) failed", stats.failed);
    }
    Ok(())
}

fn print_report(report: &WorkerReport) {
    match &report.failure {
        None if report.succeeded() => {
            println!("ok      {} -> {}", report.target, report.destination)
        }
        Some(err) => println!("FAILED  {}: {}", report.target, err),
        None => println!("FAILED  {}", report.target),
    }
}

/// Parse a URL list: blank lines and `#` comments are skipped, each other line
/// is `URL` or `URL DEST`.
pub fn parse_list(text: &str) -> Result<Vec<ListEntry>> {
    let mut entries = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = strip_comment(raw);
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [url] => entries.push(ListEntry {
                url: url.to_string(),
                dest: None,
            }),
            [url, dest] => entries.push(ListEntry {
                url: url.to_string(),
                dest: Some(PathBuf::from(dest)),
            }),
            _ => anyhow::bail!(
                "line {}: expected `URL [DEST]`, got {} fields",
                idx + 1,
                fields.len()
            ),
        }
    }
    Ok(entries)
}

/// Cut a trailing comment. `#` only starts one at the beginning of a field, so
/// URL fragments like `file.iso#sha256=...` survive.
fn strip_comment(line: &str) -> &str {
    let mut after_space = true;
    for (i, c) in line.char_indices() {
        if c == '#' && after_space {
            return &line[..i];
        }
        after_space = c.is_whitespace();
    }
    line
}

/// Pair each entry with its destination path. Relative `DEST`s are placed in
/// the namer's directory; entries without one get a name derived from the URL.
pub fn plan_downloads(
    entries: Vec<ListEntry>,
    namer: &mut DestinationNamer,
) -> Vec<(String, PathBuf)> {
    entries
        .into_iter()
        .map(|e| {
            let path = match e.dest {
                Some(d) if d.is_absolute() => d,
                Some(d) => namer.dir().join(d),
                None => namer.path_for(&e.url),
            };
            (e.url, path)
        })
        .collect()
}

fn parse_wait(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("`{}` is not a number of seconds", s))?;
    if secs < 0.0 {
        return Err("wait must not be negative".to_string());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}
