//! CLI command handlers. Each command is in its own file.

mod checksum;
mod completions;
mod download;

pub use checksum::run_checksum;
pub use completions::{run_completions, run_man};
pub use download::run_download;
