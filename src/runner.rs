use anyhow::anyhow;
use std::io::{IsTerminal, Read};
use std::sync::Arc;

use crate::cli::Cli;
use webprobe::cdn::CdnClassifier;
use webprobe::config::{load_config, ScanConfig};
use webprobe::http_client::ReqwestConnector;
use webprobe::output::{spawn_output_writer, OutputFormat};
use webprobe::probe::dns::SystemResolver;
use webprobe::probe::{ProbeKind, ProbeSet};
use webprobe::utils::{dedup_targets, read_targets};
use webprobe::Scanner;

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::EnvFilter;
    let crate_level = if cli.debug { "debug" } else if cli.verbose { "info" } else { "warn" };
    // Keep transport crates quiet even in debug mode.
    let filter_str = format!(
        "webprobe={crate},reqwest=info,hyper=info,h2=info,hickory_proto=warn,hickory_resolver=info",
        crate = crate_level
    );
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .init();
}

/// Config file values, overridden by whatever the flags set.
fn effective_config(cli: &Cli) -> anyhow::Result<ScanConfig> {
    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(t) = cli.threads {
        cfg.concurrency = t;
    }
    if let Some(t) = cli.timeout {
        cfg.timeout_secs = t;
    }
    if cli.follow_redirects {
        cfg.follow_redirects = true;
    }
    if let Some(p) = &cli.impersonate {
        cfg.impersonate = p.clone();
    }
    if let Some(p) = &cli.proxy {
        cfg.proxy = Some(p.clone());
    }
    if let Some(d) = &cli.cdn_cache_dir {
        cfg.cdn_cache_dir = Some(d.clone());
    }
    if let Some(h) = cli.cdn_ttl_hours {
        cfg.cdn_cache_ttl_hours = h;
    }
    Ok(cfg)
}

fn gather_targets(cli: &Cli) -> anyhow::Result<Vec<String>> {
    let mut raw = Vec::new();
    if let Some(list) = &cli.list {
        if !list.is_file() {
            return Err(anyhow!("{} is not a valid file", list.display()));
        }
        raw.extend(read_targets(list)?);
    }
    raw.extend(cli.targets.iter().cloned());

    let stdin = std::io::stdin();
    if raw.is_empty() && !stdin.is_terminal() {
        let mut buf = String::new();
        stdin.lock().read_to_string(&mut buf)?;
        raw.extend(buf.lines().map(str::to_string));
    }
    Ok(dedup_targets(raw))
}

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    init_tracing(&cli);

    let cfg = effective_config(&cli)?;
    let targets = gather_targets(&cli)?;
    if targets.is_empty() {
        return Err(anyhow!("no targets provided; use -u, -l or pipe from stdin"));
    }

    let probes = ProbeSet::from_names(cli.probe_names());
    let format = if cli.silent {
        OutputFormat::Silent
    } else if cli.json {
        OutputFormat::Jsonl
    } else {
        OutputFormat::Plain
    };

    tracing::info!(targets = targets.len(), concurrency = cfg.concurrency, timeout = cfg.timeout_secs, impersonate = %cfg.impersonate, follow_redirects = cfg.follow_redirects, "Starting scan");

    let mut scanner = Scanner::new(
        Arc::new(ReqwestConnector),
        Arc::new(SystemResolver::new()),
        cfg.client_config(),
        probes.clone(),
    )
    .with_workers(cfg.concurrency);

    // Built once, before any worker starts, and read-only from then on.
    if probes.contains(&ProbeKind::Cdn) {
        let classifier = match cfg.cdn_options() {
            Ok(opts) => CdnClassifier::load(&opts).await,
            Err(e) => {
                tracing::warn!(error = %e, "cdn classification disabled");
                CdnClassifier::empty()
            }
        };
        scanner = scanner.with_classifier(Arc::new(classifier));
    }

    let (tx, rx) = tokio::sync::mpsc::channel(1024);
    let writer = spawn_output_writer(rx, format);

    let scanner = Arc::new(scanner);
    let summary = scanner.run(targets, tx).await;
    let stats = writer.await?;

    tracing::info!(succeeded = summary.succeeded, failed = summary.failed, written = stats.results, "Done");
    Ok(())
}
