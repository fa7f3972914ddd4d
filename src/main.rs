//! barrage - HTTP load generator

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use barrage_core::{
    OrchestratorBuilder, OutputMode, RawRecord, Report, RequestTemplate, WorkloadConfig,
};
use barrage_report::{CsvExporter, SummaryRenderer};
use barrage_transport::HttpTransport;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod cli;

fn main() -> ExitCode {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: cli::Cli) -> Result<()> {
    let config = cli.workload_config();
    config.validate()?;
    let template = cli.request_template()?;

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(cpus) = cli.cpus {
        runtime.worker_threads(cpus.max(1));
    }
    let runtime = runtime.build().context("failed to start async runtime")?;

    let report = runtime.block_on(execute(config, template))?;

    match report {
        Report::Summary(summary) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            SummaryRenderer::new(&summary)
                .write(&mut out)
                .context("failed to write report")?;
            out.flush().context("failed to write report")?;
        }
        Report::Raw(raw) => {
            tracing::debug!(
                records = raw.records,
                completed = raw.completed,
                failed = raw.failed,
                "Raw output written"
            );
        }
    }
    Ok(())
}

async fn execute(config: WorkloadConfig, template: RequestTemplate) -> Result<Report> {
    let raw = config.output == OutputMode::Raw;
    let transport = HttpTransport::from_workload(&config)?;
    let orchestrator = OrchestratorBuilder::new()
        .config(config)
        .transport(Arc::new(transport))
        .template(template)
        .build()?;

    let writer = if raw {
        let stream = orchestrator.subscribe_records()?;
        Some(tokio::task::spawn_blocking(move || write_csv(stream)))
    } else {
        None
    };

    let report = orchestrator.run_with_signal_handling().await;
    // Closes the record stream even if the run never started.
    drop(orchestrator);

    if let Some(writer) = writer {
        let rows = writer.await.context("CSV writer task failed")??;
        tracing::debug!(rows, "CSV stream closed");
    }
    report.context("load run failed")
}

/// Write records to stdout as CSV until the stream closes
fn write_csv(mut stream: mpsc::Receiver<RawRecord>) -> Result<u64> {
    let stdout = std::io::stdout();
    let mut exporter = CsvExporter::new(stdout.lock()).context("failed to write CSV")?;
    exporter
        .write_all(std::iter::from_fn(|| stream.blocking_recv()))
        .context("failed to write CSV")?;
    exporter.finish().context("failed to write CSV")
}
