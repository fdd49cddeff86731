//! tag-mirror - Remote namespace to tag store mirroring
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::process::ExitCode;
use tag_mirror::config::{CliArgs, JobConfig};
use tag_mirror::db::{keys, SqliteTagStore};
use tag_mirror::job::{CancelFlag, MirrorJob};
use tag_mirror::mirror::PathMapper;
use tag_mirror::progress::{print_header, print_summary, ChannelSink, ProgressReporter};
use tag_mirror::remote::{RemoteNamespaceClient, SnapshotClient};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let client = SnapshotClient::from_path(&args.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;

    let config = JobConfig::from_args(&args, client.server(), client.root())
        .context("Invalid configuration")?;

    let mapper = PathMapper::from_config(&config);
    if !args.quiet {
        print_header(
            &config.remote_server,
            config.base_node.as_str(),
            mapper.root_path(),
            &config.name_filter.to_string(),
            config.dry_run,
        );
    }

    // A dry run never touches the store, so it gets a throwaway one
    let store = if config.dry_run {
        SqliteTagStore::open_in_memory()?
    } else {
        SqliteTagStore::open(&args.output).context("Failed to open tag database")?
    };
    if !config.dry_run {
        store.record_start(&config)?;
    }

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping after the current step...");
        handler_flag.cancel();
    })
    .context("Failed to set signal handler")?;

    let (sink, messages) = ChannelSink::pair();
    let progress = if args.quiet {
        None
    } else {
        Some(ProgressReporter::new())
    };
    let forwarder = progress.as_ref().map(|p| {
        p.set_status("Browsing...");
        p.forward(messages)
    });

    let dry_run = config.dry_run;
    let result = MirrorJob::new(config, &client, &store)
        .with_sink(&sink)
        .with_cancel(cancel)
        .run();

    drop(sink);
    if let Some(handle) = forwarder {
        if handle.join().is_err() {
            warn!("Progress thread panicked");
        }
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(p) = &progress {
                p.finish("Mirror failed");
            }
            if !dry_run {
                store.set_info(keys::STATUS, "failed")?;
            }
            return Err(e).context("Mirror job failed");
        }
    };

    if let Some(p) = &progress {
        if report.success {
            p.finish("Mirror completed");
        } else {
            p.finish_and_clear();
        }
    }

    if !dry_run {
        store.record_finish(&report)?;
    }

    if !args.quiet {
        let db_path = args.output.display().to_string();
        let db_size = fs::metadata(&args.output).ok().map(|m| m.len());
        print_summary(&report, &db_path, db_size);
    }

    if !report.failures.is_empty() {
        info!(failures = report.failures.len(), "Mirror completed with failures");
    }

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("tag_mirror=debug,warn")
    } else {
        EnvFilter::new("tag_mirror=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
