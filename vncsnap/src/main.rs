//! vncsnap: photograph unauthenticated VNC servers discovered via Shodan.
//!
//! Fatal errors (missing API key, discovery failure, unusable dump
//! directory or log file) abort the run with a non-zero exit status.
//! Individual capture failures never do; they show up as one error line
//! each in the log.

mod args;
mod orchestrator;

use anyhow::{Context, Result};
use args::Args;
use clap::Parser;
use orchestrator::{Orchestrator, ScanContext};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use vncsnap_capture::StepBudget;
use vncsnap_discovery::ShodanClient;

fn init_logging(logfile: &Path, verbose: u8) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(logfile)
        .with_context(|| format!("opening logfile {}", logfile.display()))?;

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("vncsnap={level},vncsnap_capture={level},vncsnap_discovery=info").into()
            }),
        )
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.logfile, args.verbose)?;

    std::fs::create_dir_all(&args.dumpdir)
        .with_context(|| format!("creating dump directory {}", args.dumpdir.display()))?;

    let api_key = args
        .api_key
        .clone()
        .context("SHODAN_API_KEY is not set (flag --api-key or environment)")?;
    let client = ShodanClient::new(api_key);

    let orchestrator = Orchestrator::new(ScanContext {
        outdir: args.dumpdir.clone(),
        budget: StepBudget::from_secs(args.timeout_secs),
    });

    if args.stream {
        info!(port = args.port, "following the banner feed");
        let feed = client
            .stream_banners(args.port)
            .await
            .context("subscribing to the banner feed")?;
        orchestrator.run_stream(feed).await;
        info!("banner feed closed");
    } else {
        let mut pages = Vec::with_capacity(args.pages as usize);
        for page in 1..=args.pages {
            let result = client
                .search(&args.query, page)
                .await
                .with_context(|| format!("fetching search page {page}"))?;
            info!(
                page,
                matches = result.matches.len(),
                total = result.total,
                "fetched search page"
            );
            pages.push(result.hosts(args.port));
        }

        info!(pages = pages.len(), "starting batch scan");
        orchestrator.run_batch(pages).await;
        info!("batch scan finished");
    }

    Ok(())
}
