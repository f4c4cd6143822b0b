//! Core stamping functionality

pub mod allocator;
pub mod config;
pub mod error;
pub mod flattener;
pub mod overlay;
pub mod pipeline;
pub mod stamper;

pub use allocator::{BatesAllocator, BatesLabel};
pub use config::{RgbColor, StampConfig, StampPosition};
pub use error::{Result, StampError};
pub use pipeline::{DocumentResult, DocumentStatus, RunReport, StampPipeline};
