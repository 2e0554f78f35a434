use colored::{ColoredString, Colorize};
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Which side of the process substrate is logging. Child workers share the parent's stderr, so
/// their lines carry the child pid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogRole {
    Coordinator,
    Worker { pid: u32 },
}

impl LogRole {
    fn tag(self) -> String {
        let name = env!("CARGO_PKG_NAME");
        match self {
            LogRole::Coordinator => name.to_string(),
            LogRole::Worker { pid } => format!("{name} child {pid}"),
        }
    }
}

/// Dependencies log at `warn`; this crate at `info`, or `debug` when verbose. `RUST_LOG` still
/// applies on top. Safe to call more than once: later calls are ignored.
pub fn setup_logging(verbose: bool, role: LogRole) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let tag = role.tag();

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(move |buf, record| {
            let tag = tag.cyan();
            let level_str = match record.level() {
                Level::Error => Some("ERROR".red()),
                Level::Warn => Some("WARN".yellow()),
                _ => None,
            };
            match level_str {
                Some(level_str) => {
                    // Worker thread names (`cvfanout-worker-3`) say which worker hit the problem.
                    let origin = std::thread::current()
                        .name()
                        .map(str::to_string)
                        .unwrap_or_else(|| record.target().to_string());
                    writeln!(buf, "[{} {} {}] {}", tag, level_str, origin.white(), record.args())
                }
                None => writeln!(buf, "[{}] {}", tag, record.args()),
            }
        })
        .try_init();
}

/// Summary colors.
pub struct Colors;

impl Colors {
    pub const SUCCEEDED: &'static str = "green";
    pub const FAILED: &'static str = "red";
    pub const STRAGGLER: &'static str = "yellow";

    pub fn colorize(color: &str, text: &str) -> ColoredString {
        text.color(color)
    }
}
