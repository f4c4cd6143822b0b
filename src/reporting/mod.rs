//! Run reporting functionality

pub mod report_writer;

pub use report_writer::{print_summary, write_manifest, write_report};
