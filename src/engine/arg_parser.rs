use clap::Parser;
use std::path::PathBuf;

/// Fan CSV records out into per-category text files with a bounded worker pool.
#[derive(Clone, Debug, Parser)]
#[command(name = "cvfanout")]
#[command(about = "Write one text file per CSV row, grouped into category folders.")]
pub struct Cli {
    /// CSV file to read (header row required).
    #[arg(value_name = "INPUT", required_unless_present = "worker_stdio")]
    pub input: Option<PathBuf>,

    /// Output root. Default: `cvfanout_out`.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Number of workers. Default: 2 x available threads, at most 8.
    #[arg(long, short = 'w', value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,

    /// Queue capacity. Default: 2 x workers.
    #[arg(long, short = 'q', value_parser = clap::value_parser!(usize))]
    pub queue_capacity: Option<usize>,

    /// Max workers writing at the same time (semaphore). Default: half the threads, at least 1.
    /// `0` turns the limit off.
    #[arg(long, short = 's', value_parser = clap::value_parser!(usize))]
    pub max_concurrent: Option<usize>,

    /// Seconds to wait for workers after submission ends.
    #[arg(long, short = 't', value_parser = clap::value_parser!(u64))]
    pub join_timeout: Option<u64>,

    /// Category field, in precedence order. Can specify multiple: --category-field a b c
    #[arg(long, num_args = 1..)]
    pub category_field: Vec<String>,

    /// Category used when no category field has a value.
    #[arg(long)]
    pub default_category: Option<String>,

    /// Run each worker's writes in a child process instead of in-process.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub processes: Option<bool>,

    /// Verbose output (debug logging and progress bar).
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Config file. Default: `.cvfanout.toml` in the current directory.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Serve write requests on stdin/stdout (used by --processes).
    #[arg(long, hide = true)]
    pub worker_stdio: bool,
}
