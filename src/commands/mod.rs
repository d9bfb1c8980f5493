pub mod download;
pub mod listing;
pub mod usage;

pub use download::{download_recursive, run_mirror};
pub use listing::render_listing;
pub use usage::{disk_usage, format_size, render_usage};
