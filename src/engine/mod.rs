//! Engine module: CLI surface, name tools, progress display

pub mod arg_parser;
pub mod cli;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::{handle_run, print_summary};
pub use tools::{resolve_category, resolve_destination, sanitize_name};
