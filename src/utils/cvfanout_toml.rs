//! Load `.cvfanout.toml` (CLI only). Lib does not use this; library callers build [`Opts`] directly.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::config::PoolDefaults;
use crate::{Opts, Substrate};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CvfanoutToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsSection {
    output: Option<String>,
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    max_concurrent: Option<usize>,
    join_timeout_secs: Option<u64>,
    category_fields: Option<Vec<String>>,
    default_category: Option<String>,
    substrate: Option<SubstrateName>,
    verbose: Option<bool>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SubstrateName {
    Threads,
    Processes,
}

/// Load the config file at `path`. `Ok(None)` if there is no readable file there.
pub(crate) fn load_cvfanout_toml(path: &Path) -> Result<Option<CvfanoutToml>, toml::de::Error> {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Ok(None);
    };
    toml::from_str(&s).map(Some)
}

impl CvfanoutToml {
    /// `verbose` from the file, needed before logging is set up.
    pub(crate) fn verbose(&self) -> Option<bool> {
        self.settings.verbose
    }
}

/// `max_concurrent` as given by a user: `0` turns the throttle off.
pub(crate) fn throttle_setting(max: usize) -> Option<usize> {
    (max > 0).then_some(max)
}

/// New worker count from one config layer. Queue size and throttle the same layer leaves unset
/// follow the new count instead of keeping values sized for the old one.
pub(crate) fn resize_pool(
    opts: &mut Opts,
    workers: usize,
    queue_capacity: Option<usize>,
    max_concurrent: Option<usize>,
) {
    opts.pool.worker_count = workers;
    if queue_capacity.is_none() {
        opts.pool.queue_capacity = workers * PoolDefaults::QUEUE_SLOTS_PER_WORKER;
    }
    if max_concurrent.is_none() {
        opts.pool.max_concurrent_active = Some(PoolDefaults::current().max_concurrent_for(workers));
    }
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($idx:expr, $opts:expr, $idx_field:ident => $($opts_field:ident).+) => {
        if let Some(v) = $idx.$idx_field.clone() {
            $opts.$($opts_field).+ = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
/// `process_substrate` builds the process substrate when the file asks for it.
pub(crate) fn apply_file_to_opts(
    file: &CvfanoutToml,
    opts: &mut Opts,
    process_substrate: impl Fn() -> Option<Substrate>,
) {
    let s = &file.settings;
    if let Some(ref p) = s.output {
        opts.output = PathBuf::from(p);
    }
    if let Some(workers) = s.workers {
        resize_pool(opts, workers, s.queue_capacity, s.max_concurrent);
    }
    apply_file_opt!(s, opts, queue_capacity => pool.queue_capacity);
    if let Some(max) = s.max_concurrent {
        opts.pool.max_concurrent_active = throttle_setting(max);
    }
    if let Some(secs) = s.join_timeout_secs {
        opts.pool.join_timeout = Duration::from_secs(secs);
    }
    apply_file_opt!(s, opts, category_fields => rules.fields);
    apply_file_opt!(s, opts, default_category => rules.default);
    apply_file_opt!(s, opts, verbose => verbose);
    match s.substrate {
        Some(SubstrateName::Processes) => {
            if let Some(sub) = process_substrate() {
                opts.substrate = sub;
            }
        }
        Some(SubstrateName::Threads) => opts.substrate = Substrate::Threads,
        None => {}
    }
}
