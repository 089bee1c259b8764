use anyhow::Context;
use std::io::Read;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use linkscout::batch::RunState;
use linkscout::config::{load_engine_config, load_engine_config_from, EngineConfig};
use linkscout::core::app_state::build_http_client;
use linkscout::{AppState, BatchEvent, UrlRecord};

const USAGE: &str = "\
usage: linkscout [--config PATH] [--batch-size N] [--strict|--no-strict] [--auto-fix] [--no-cache] (FILE | - | URL...)

Checks every link (one per line; blank lines and # comments are skipped), looks for
replacements for broken ones, and prints progress events as JSON lines on stdout.
Ctrl-C aborts the run.";

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    batch_size: Option<usize>,
    strict: Option<bool>,
    auto_fix: bool,
    no_cache: bool,
    inputs: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut args = args.into_iter();
    while let Some(a) = args.next() {
        match a.as_str() {
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            "--config" => {
                let v = args.next().context("--config needs a path")?;
                out.config = Some(PathBuf::from(v));
            }
            "--batch-size" => {
                let v = args.next().context("--batch-size needs a number")?;
                out.batch_size = Some(v.parse().with_context(|| format!("bad --batch-size '{}'", v))?);
            }
            "--strict" => out.strict = Some(true),
            "--no-strict" => out.strict = Some(false),
            "--auto-fix" => out.auto_fix = true,
            "--no-cache" => out.no_cache = true,
            _ => {
                if let Some(rest) = a.strip_prefix("--config=") {
                    out.config = Some(PathBuf::from(rest));
                } else if let Some(rest) = a.strip_prefix("--batch-size=") {
                    out.batch_size =
                        Some(rest.parse().with_context(|| format!("bad --batch-size '{}'", rest))?);
                } else if a.starts_with("--") {
                    anyhow::bail!("unknown option {}\n\n{}", a, USAGE);
                } else {
                    out.inputs.push(a);
                }
            }
        }
    }
    if out.inputs.is_empty() {
        anyhow::bail!("no input given\n\n{}", USAGE);
    }
    Ok(out)
}

fn apply_overrides(mut cfg: EngineConfig, args: &CliArgs) -> EngineConfig {
    if let Some(n) = args.batch_size {
        cfg.batch_size = n;
    }
    if let Some(strict) = args.strict {
        cfg.strict_domain_search = strict;
    }
    if args.auto_fix {
        cfg.auto_fix = true;
    }
    if args.no_cache {
        cfg.use_cache = false;
    }
    cfg
}

fn looks_like_url(s: &str) -> bool {
    url::Url::parse(s)
        .map(|u| u.scheme() == "http" || u.scheme() == "https")
        .unwrap_or(false)
}

/// One record per non-comment line; ids are `<source>:<line>`.
fn records_from_lines(source: &str, text: &str, out: &mut Vec<UrlRecord>) {
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut rec = UrlRecord::new(format!("{}:{}", source, idx + 1), line);
        rec.line = idx + 1;
        out.push(rec);
    }
}

fn read_records(inputs: &[String]) -> anyhow::Result<Vec<UrlRecord>> {
    let mut out = Vec::new();
    for (i, input) in inputs.iter().enumerate() {
        if input == "-" {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading urls from stdin")?;
            records_from_lines("stdin", &text, &mut out);
        } else if looks_like_url(input) {
            out.push(UrlRecord::new(format!("arg:{}", i + 1), input.as_str()));
        } else {
            let text = std::fs::read_to_string(input)
                .with_context(|| format!("reading urls from {}", input))?;
            records_from_lines(input, &text, &mut out);
        }
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the event stream.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let cfg = match &args.config {
        Some(path) => load_engine_config_from(path)?,
        None => load_engine_config(),
    };
    let cfg = apply_overrides(cfg, &args);
    cfg.validate()?;

    let records = read_records(&args.inputs)?;
    if records.is_empty() {
        warn!("no urls found in input");
        return Ok(());
    }

    let state = AppState::new(build_http_client()?, cfg)?;
    info!("{:?}", state);

    let (tx, mut rx) = mpsc::unbounded_channel::<BatchEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("cannot serialize event: {}", e),
            }
        }
    });

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, aborting");
            on_signal.cancel();
        }
    });

    let report = state
        .orchestrator
        .process_urls(records, &tx, Some(&cancel))
        .await?;
    drop(tx);
    printer.await?;

    info!(
        "{} urls: {} valid, {} redirect, {} invalid, {} error, {} replaced",
        report.stats.total,
        report.stats.valid,
        report.stats.redirect,
        report.stats.invalid,
        report.stats.error,
        report.stats.replaced
    );
    match report.state {
        RunState::Aborted => std::process::exit(130),
        RunState::Error => std::process::exit(2),
        _ => Ok(()),
    }
}
