//! catindex - print the category catalog as a tree
//!
//! Fetches the catalog once (or serves it from the on-disk cache), prints it,
//! and with `--watch` keeps refetching and reprinting until interrupted.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use catalog_index::cli::{render, Cli, OutputMode, StartupConfig};
use catalog_index::refresh::{RefreshHandle, RefreshMessage};
use catalog_index::{CatalogService, CatalogSnapshot, CatalogStatus};

/// Sends log output to stderr so stdout carries only the catalog
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_snapshot(snapshot: &CatalogSnapshot, mode: OutputMode) -> bool {
    match render(snapshot, mode) {
        Ok(out) => {
            print!("{}", out);
            if mode.json {
                println!();
            }
            true
        }
        Err(err) => {
            eprintln!("error: failed to render catalog: {}", err);
            false
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let startup = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::from(2);
        }
    };

    let service = Arc::new(CatalogService::from_config(startup.catalog.clone()));
    let view = service.load().await;

    let snapshot = match (view.status, view.data) {
        (CatalogStatus::Unavailable, _) | (_, None) => {
            let reason = view
                .error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no data".to_string());
            eprintln!("error: catalog unavailable: {}", reason);
            return ExitCode::FAILURE;
        }
        (status, Some(snapshot)) => {
            if status == CatalogStatus::Stale {
                eprintln!(
                    "warning: catalog fetch failed, showing catalog from {}",
                    snapshot.fetched_at
                );
            }
            snapshot
        }
    };

    if !print_snapshot(&snapshot, startup.output) {
        return ExitCode::FAILURE;
    }

    if let Some(refresh) = startup.watch {
        let mut handle = RefreshHandle::spawn(Arc::clone(&service), refresh);
        loop {
            tokio::select! {
                message = handle.recv() => match message {
                    Some(RefreshMessage::Refreshed { .. }) => {
                        if let Some(snapshot) = service.snapshot() {
                            print_snapshot(&snapshot, startup.output);
                        }
                    }
                    Some(RefreshMessage::ServedStale { fetched_at }) => {
                        eprintln!("warning: refresh failed, still showing catalog from {}", fetched_at);
                    }
                    Some(RefreshMessage::RefreshError(reason)) => {
                        eprintln!("error: refresh failed: {}", reason);
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        handle.shutdown().await;
    }

    ExitCode::SUCCESS
}
