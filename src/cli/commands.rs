//! CLI command implementations

use anyhow::Result;
use clap::ValueEnum;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::fetch;
use crate::scan::{ProgressEvent, ProgressSink, ScanReport, ScanRequest, ScanSession, TimeWindow};

/// How progress events are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable progress and a ranked table
    Pretty,
    /// One JSON event per line
    Json,
    /// Server-push frames (`data: <json>` + blank line)
    Sse,
}

/// Per-scan overrides from the command line
#[derive(Debug, Clone, Default)]
pub struct ScanOverrides {
    pub window: Option<TimeWindow>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Scan tokens for overlapping traders
pub async fn scan(
    config: &Config,
    tokens: Vec<String>,
    overrides: ScanOverrides,
    format: OutputFormat,
) -> Result<()> {
    let mut scanner = config.scanner.clone();
    if let Some(limit) = overrides.concurrency {
        scanner.concurrency_limit = limit;
    }
    if let Some(secs) = overrides.timeout_secs {
        scanner.job_timeout_secs = secs;
    }
    if scanner.concurrency_limit == 0 || scanner.job_timeout_secs == 0 {
        anyhow::bail!("--concurrency and --timeout must be at least 1");
    }

    let fetcher = fetch::from_config(&config.fetcher)
        .map_err(|e| anyhow::anyhow!("Failed to create fetcher: {}", e))?;
    info!("Using {} fetcher", fetcher.name());

    let request = ScanRequest::new(tokens, overrides.window.unwrap_or(scanner.default_window));
    let session = ScanSession::new(fetcher, &scanner);
    let (sink, mut events) = ProgressSink::channel(scanner.event_buffer);

    // Ctrl-C cancels the scan; whatever settled is still intersected
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling scan");
            interrupt.cancel();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event, format);
        }
    });

    let outcome = session.run(request, &sink, &cancel).await;
    drop(sink);
    printer.await?;

    let report = outcome.map_err(|e| anyhow::anyhow!("Scan failed: {}", e))?;
    if format == OutputFormat::Pretty {
        print_report(&report);
    }

    Ok(())
}

fn print_event(event: &ProgressEvent, format: OutputFormat) {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(event).map_err(|e| e.to_string()),
        OutputFormat::Sse => event.to_sse_frame().map_err(|e| e.to_string()),
        OutputFormat::Pretty => Ok(describe_event(event)),
    };

    match rendered {
        Ok(line) if format == OutputFormat::Sse => print!("{}", line),
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to render progress event: {}", e),
    }
}

fn describe_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Started { message, .. } => message.clone(),
        ProgressEvent::TokenCompleted {
            token_id,
            completed_count,
            total_count,
            wallet_count,
        } => format!(
            "[{}/{}] {} - {} wallets",
            completed_count, total_count, token_id, wallet_count
        ),
        ProgressEvent::TokenFailed {
            token_id,
            error,
            completed_count,
            total_count,
        } => format!(
            "[{}/{}] {} - FAILED: {}",
            completed_count, total_count, token_id, error
        ),
        ProgressEvent::Completed { summary, .. } => format!(
            "Scan complete: {} tokens ({} failed), {} wallets seen, {} overlapping",
            summary.total_tokens,
            summary.failed_tokens,
            summary.total_unique_wallets,
            summary.intersected_wallets
        ),
        ProgressEvent::Error { message, .. } => format!("Scan error: {}", message),
    }
}

fn print_report(report: &ScanReport) {
    println!("\n=== OVERLAPPING WALLETS ({}) ===\n", report.overlaps.len());

    if report.overlaps.is_empty() {
        println!("No wallets traded more than one of the scanned tokens.");
        return;
    }

    println!("{:<4} {:<46} {:>7} {:>12}", "#", "Wallet", "Tokens", "Total PnL");
    for (rank, record) in report.overlaps.iter().enumerate() {
        println!(
            "{:<4} {:<46} {:>7} {:>12}",
            rank + 1,
            record.address,
            record.match_count,
            record.total_pnl
        );
        for token_id in &record.token_ids {
            if let Some(metrics) = record.per_token_metrics.get(token_id) {
                println!(
                    "       {} bought {} / sold {} / pnl {}",
                    token_id, metrics.bought, metrics.sold, metrics.pnl
                );
            }
        }
    }
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
