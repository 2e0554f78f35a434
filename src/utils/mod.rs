pub mod config;
pub(crate) mod cvfanout_toml;
pub mod fd_limit;
pub mod logger;
pub mod tempfiles;

pub use config::*;
pub use fd_limit::{FDS_PER_WORKER, FdBudget, max_workers_by_fd_limit};
pub use logger::{Colors, LogRole, setup_logging};
pub use tempfiles::{rename_temp_to_final, temp_path_for};
