//! Bates Stamper Library
//!
//! A parallel Bates-stamping library for PDF document trees.

pub mod core;
pub mod scanner;
pub mod reporting;

pub use crate::core::pipeline;
pub use crate::scanner::document_locator;
pub use crate::reporting::report_writer;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::core::allocator::{BatesAllocator, BatesLabel, LABEL_PAD_WIDTH};
    pub use crate::core::config::{RgbColor, StampConfig, StampPosition};
    pub use crate::core::error::{Result, StampError};
    pub use crate::core::flattener::{
        detect_flattener, ghostscript_available, Flattener, GhostscriptFlattener,
        RewriteFlattener, DEFAULT_FLATTEN_TIMEOUT,
    };
    pub use crate::core::overlay::{render_stamp, text_width, Overlay};
    pub use crate::core::pipeline::{
        DocumentResult, DocumentStatus, RunReport, StampPipeline,
    };
    pub use crate::core::stamper::{effective_media_box, DocumentStamper, MediaBox};
    pub use crate::reporting::report_writer::{print_summary, write_manifest, write_report};
    pub use crate::scanner::document_locator::{locate_documents, DocumentRef};
}
