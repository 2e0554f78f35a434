//! CLI command handler: build options, run the dispatch, print the summary.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::arg_parser::Cli;
use crate::pipeline::{CancelToken, serve_stdio};
use crate::utils::config::{PackagePaths, PoolDefaults};
use crate::utils::cvfanout_toml::{
    CvfanoutToml, apply_file_to_opts, load_cvfanout_toml, resize_pool, throttle_setting,
};
use crate::utils::{Colors, LogRole, setup_logging};
use crate::{Opts, RunSummary, Substrate, fan_out_file};

/// Process substrate running this same binary in worker mode.
fn process_substrate() -> Option<Substrate> {
    match std::env::current_exe() {
        Ok(program) => Some(Substrate::Processes { program }),
        Err(e) => {
            warn!("cannot locate own executable ({}); using threads", e);
            None
        }
    }
}

/// `--config`, else `.cvfanout.toml` in the current directory.
fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(PackagePaths::get().config_filename()))
}

/// Defaults, then the config file (if any), then CLI flags.
pub(crate) fn build_opts(cli: &Cli, file: Option<&CvfanoutToml>) -> Opts {
    let defaults = PoolDefaults::current();
    debug!(
        "pool defaults: {} threads -> {} workers, {} writing at once",
        defaults.available_threads,
        defaults.worker_count,
        defaults.max_concurrent_for(defaults.worker_count)
    );
    let mut opts = Opts::default();
    if let Some(file) = file {
        apply_file_to_opts(file, &mut opts, process_substrate);
    }

    if let Some(ref output) = cli.output {
        opts.output = output.clone();
    }
    if let Some(workers) = cli.workers {
        resize_pool(&mut opts, workers, cli.queue_capacity, cli.max_concurrent);
    }
    if let Some(capacity) = cli.queue_capacity {
        opts.pool.queue_capacity = capacity;
    }
    if let Some(max) = cli.max_concurrent {
        opts.pool.max_concurrent_active = throttle_setting(max);
    }
    if let Some(secs) = cli.join_timeout {
        opts.pool.join_timeout = Duration::from_secs(secs);
    }
    if !cli.category_field.is_empty() {
        opts.rules.fields = cli.category_field.clone();
    }
    if let Some(ref default) = cli.default_category {
        opts.rules.default = default.clone();
    }
    match cli.processes {
        Some(true) => {
            if let Some(sub) = process_substrate() {
                opts.substrate = sub;
            }
        }
        Some(false) => opts.substrate = Substrate::Threads,
        None => {}
    }
    if let Some(verbose) = cli.verbose {
        opts.verbose = verbose;
    }
    opts
}

/// Run a dispatch (default) or serve as a child worker when `--worker-stdio`.
pub fn handle_run(cli: &Cli) -> Result<()> {
    if cli.worker_stdio {
        setup_logging(
            cli.verbose.unwrap_or(false),
            LogRole::Worker {
                pid: std::process::id(),
            },
        );
        let served = serve_stdio(io::stdin().lock(), io::stdout().lock())
            .context("worker stdio loop")?;
        debug!("worker child served {} requests", served);
        return Ok(());
    }

    let config_path = config_path(cli);
    let loaded = load_cvfanout_toml(&config_path);
    let file = loaded.as_ref().ok().and_then(Option::as_ref);
    // Logging first: building opts already logs (pool defaults, missing executable).
    let verbose = cli
        .verbose
        .or_else(|| file.and_then(CvfanoutToml::verbose))
        .unwrap_or(false);
    setup_logging(verbose, LogRole::Coordinator);
    match &loaded {
        Ok(Some(_)) => debug!("loaded {}", config_path.display()),
        Ok(None) => {}
        Err(e) => warn!("{} ignored: {}", config_path.display(), e),
    }
    let opts = build_opts(cli, file);
    let input = cli.input.as_deref().context("INPUT is required")?;
    debug!("{} CONFIG:{:#?}", PackagePaths::get().pkg_name().to_uppercase(), opts);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            // Second Ctrl+C: stop waiting for in-flight writes.
            std::process::exit(130);
        }
        handler_token.cancel();
    })
    .context("set Ctrl+C handler")?;

    let summary = fan_out_file(input, &opts, Some(cancel))?;
    print_summary(&summary, &opts);
    Ok(())
}

/// Print the run summary. Stragglers and unaccounted items are always shown when present.
pub fn print_summary(summary: &RunSummary, opts: &Opts) {
    println!();
    println!(
        "Done in {:.2}s: {} submitted | {} | {}",
        summary.elapsed.as_secs_f64(),
        summary.submitted,
        Colors::colorize(Colors::SUCCEEDED, &format!("succeeded: {}", summary.succeeded)),
        Colors::colorize(Colors::FAILED, &format!("failed: {}", summary.failed)),
    );
    if summary.discarded > 0 {
        println!("Discarded (cancelled): {}", summary.discarded);
    }
    println!("Throughput: {:.2} items/s", summary.throughput());
    println!("Output: {}", opts.output.display());
    if summary.timed_out() {
        println!(
            "{}",
            Colors::colorize(
                Colors::STRAGGLER,
                &format!(
                    "Workers past the {:?} join timeout: {:?} ({} items without outcome at the deadline)",
                    opts.pool.join_timeout,
                    summary.timed_out_workers,
                    summary.unaccounted()
                ),
            )
        );
    }
    if opts.verbose {
        for (id, reason) in summary.failures() {
            eprintln!("  failed: item {}: {}", id, reason);
        }
    }
}
