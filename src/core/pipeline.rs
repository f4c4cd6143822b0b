//! Run orchestration
//!
//! Drives a whole stamping run in two phases. Labels are reserved
//! sequentially in discovery order, which fixes the label-to-page
//! mapping up front; the actual stamping then fans out across the rayon
//! pool. Every failure past discovery is caught at the document
//! boundary and recorded, never propagated.

use indicatif::{ParallelProgressIterator, ProgressBar};
use lopdf::{Document, ObjectId};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

use super::allocator::{BatesAllocator, BatesLabel};
use super::config::StampConfig;
use super::error::{Result, StampError};
use super::flattener::{detect_flattener, Flattener};
use super::overlay::render_stamp;
use super::stamper::{effective_media_box, DocumentStamper};
use crate::scanner::document_locator::DocumentRef;

/// Outcome for one document
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Stamped {
        pages_stamped: usize,
        first_label: String,
        last_label: String,
    },
    Failed {
        error: String,
    },
}

/// Immutable record of one document's run
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub document: DocumentRef,
    #[serde(flatten)]
    pub status: DocumentStatus,
    pub warnings: Vec<String>,
}

impl DocumentResult {
    fn failed(document: DocumentRef, error: &StampError) -> Self {
        DocumentResult {
            document,
            status: DocumentStatus::Failed {
                error: error.to_string(),
            },
            warnings: Vec::new(),
        }
    }

    pub fn is_stamped(&self) -> bool {
        matches!(self.status, DocumentStatus::Stamped { .. })
    }
}

/// Aggregate outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total_documents: usize,
    pub stamped_documents: usize,
    pub failed_documents: usize,
    pub pages_stamped: usize,
    pub first_label: Option<String>,
    pub last_label: Option<String>,
    pub interrupted: bool,
    pub results: Vec<DocumentResult>,
}

impl RunReport {
    /// Aggregate per-document results, which must be in discovery order
    pub fn from_results(results: Vec<DocumentResult>, interrupted: bool) -> Self {
        let mut stamped_documents = 0;
        let mut failed_documents = 0;
        let mut pages_total = 0;
        let mut first_label: Option<String> = None;
        let mut last_label: Option<String> = None;

        for result in &results {
            match &result.status {
                DocumentStatus::Stamped {
                    pages_stamped,
                    first_label: first,
                    last_label: last,
                } => {
                    stamped_documents += 1;
                    pages_total += *pages_stamped;
                    if first_label.is_none() {
                        first_label = Some(first.clone());
                    }
                    last_label = Some(last.clone());
                }
                DocumentStatus::Failed { .. } => failed_documents += 1,
            }
        }

        RunReport {
            total_documents: results.len(),
            stamped_documents,
            failed_documents,
            pages_stamped: pages_total,
            first_label,
            last_label,
            interrupted,
            results,
        }
    }

    pub fn warning_count(&self) -> usize {
        self.results.iter().map(|r| r.warnings.len()).sum()
    }
}

/// A document with its reserved label range
struct StampJob {
    document: DocumentRef,
    labels: Vec<BatesLabel>,
}

/// Reservation-phase outcome for one document
enum Prepared {
    Ready(StampJob),
    Failed(DocumentResult),
}

/// The whole stamping run, configured once
pub struct StampPipeline {
    config: StampConfig,
    flattener: Option<Box<dyn Flattener>>,
    shutdown: Arc<AtomicBool>,
    verbose: bool,
}

impl StampPipeline {
    /// Build a pipeline, probing for the flatten engine when either
    /// flatten flag is on
    pub fn new(config: StampConfig, flatten_timeout: Duration) -> Self {
        let flattener = if config.flatten_input || config.flatten_output {
            Some(detect_flattener(flatten_timeout))
        } else {
            None
        };
        StampPipeline {
            config,
            flattener,
            shutdown: Arc::new(AtomicBool::new(false)),
            verbose: false,
        }
    }

    /// Build a pipeline around a specific flatten engine (used by tests)
    pub fn with_flattener(config: StampConfig, flattener: Box<dyn Flattener>) -> Self {
        StampPipeline {
            config,
            flattener: Some(flattener),
            shutdown: Arc::new(AtomicBool::new(false)),
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Share an externally-set shutdown flag (Ctrl-C handler)
    pub fn shutdown_on(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn flattener_name(&self) -> Option<&'static str> {
        self.flattener.as_ref().map(|f| f.name())
    }

    /// Execute the run over `documents`, already in discovery order
    pub fn run(&self, documents: &[DocumentRef], progress: &ProgressBar) -> RunReport {
        let mut allocator = BatesAllocator::new(&self.config.prefix, self.config.start);

        // Phase 1: sequential label reservation in document order
        let mut prepared: Vec<Prepared> = Vec::with_capacity(documents.len());
        for document in documents {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            prepared.push(self.reserve(document, &mut allocator));
        }

        // Phase 2: stamp reserved documents in parallel
        let results: Vec<DocumentResult> = prepared
            .into_par_iter()
            .progress_with(progress.clone())
            .filter_map(|prepared| match prepared {
                Prepared::Failed(result) => Some(result),
                Prepared::Ready(job) => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        return None; // Stop processing new documents
                    }
                    Some(self.stamp_document(job))
                }
            })
            .collect();

        RunReport::from_results(results, self.shutdown.load(Ordering::SeqCst))
    }

    /// Open, sanity-check, and reserve one label per page
    ///
    /// Parse and stampability failures consume no labels; a document that
    /// exhausts the counter mid-reservation retires what it was issued.
    fn reserve(&self, document: &DocumentRef, allocator: &mut BatesAllocator) -> Prepared {
        match self.try_reserve(document, allocator) {
            Ok(labels) => Prepared::Ready(StampJob {
                document: document.clone(),
                labels,
            }),
            Err(err) => {
                if self.verbose {
                    eprintln!(
                        "Cannot reserve {}: {}",
                        document.input_path.display(),
                        err
                    );
                }
                Prepared::Failed(DocumentResult::failed(document.clone(), &err))
            }
        }
    }

    fn try_reserve(
        &self,
        document: &DocumentRef,
        allocator: &mut BatesAllocator,
    ) -> Result<Vec<BatesLabel>> {
        let pages = self.page_count(&document.input_path)?;
        let mut labels = Vec::with_capacity(pages);
        for _ in 0..pages {
            labels.push(allocator.next_label()?);
        }
        Ok(labels)
    }

    /// Page count after preflight, parse, and stampability checks
    fn page_count(&self, path: &Path) -> Result<usize> {
        preflight(path)?;
        let doc = Document::load(path).map_err(|e| {
            StampError::Document(format!("cannot parse {}: {}", path.display(), e))
        })?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(StampError::Document(format!(
                "{} is encrypted; decrypt it before stamping",
                path.display()
            )));
        }
        let pages = doc.get_pages().len();
        if pages == 0 {
            return Err(StampError::Document(format!(
                "{} contains no pages",
                path.display()
            )));
        }
        Ok(pages)
    }

    /// Stamp one reserved document and write its mirrored output
    ///
    /// On failure the job's labels stay consumed, leaving a gap in the
    /// issued sequence; numbers are never reassigned.
    fn stamp_document(&self, job: StampJob) -> DocumentResult {
        let mut warnings = Vec::new();
        match self.stamp_inner(&job, &mut warnings) {
            Ok(pages_stamped) => DocumentResult {
                status: DocumentStatus::Stamped {
                    pages_stamped,
                    first_label: job.labels.first().map(|l| l.text.clone()).unwrap_or_default(),
                    last_label: job.labels.last().map(|l| l.text.clone()).unwrap_or_default(),
                },
                document: job.document,
                warnings,
            },
            Err(err) => {
                if self.verbose {
                    eprintln!("Failed {}: {}", job.document.input_path.display(), err);
                }
                DocumentResult {
                    status: DocumentStatus::Failed {
                        error: err.to_string(),
                    },
                    document: job.document,
                    warnings,
                }
            }
        }
    }

    fn stamp_inner(&self, job: &StampJob, warnings: &mut Vec<String>) -> Result<usize> {
        let document = &job.document;

        // Optional pre-stamp flatten, staged through a scratch file.
        // A flatten failure downgrades to a warning and the original
        // content is stamped instead.
        let mut staged: Option<NamedTempFile> = None;
        if self.config.flatten_input {
            if let Some(flattener) = &self.flattener {
                let scratch = scratch_file()?;
                match flattener.flatten(&document.input_path, scratch.path()) {
                    Ok(()) => staged = Some(scratch),
                    Err(err) => warnings.push(format!(
                        "input flatten failed, stamping original content: {}",
                        err
                    )),
                }
            }
        }
        let source: &Path = match &staged {
            Some(scratch) => scratch.path(),
            None => &document.input_path,
        };

        let mut doc = Document::load(source).map_err(|e| {
            StampError::Document(format!("cannot parse {}: {}", source.display(), e))
        })?;

        let pages = doc.get_pages();
        if pages.len() != job.labels.len() {
            return Err(StampError::Document(format!(
                "{}: page count changed from {} to {} since reservation",
                document.input_path.display(),
                job.labels.len(),
                pages.len()
            )));
        }

        // Resolve every page's box before mutating anything
        let page_ids: Vec<ObjectId> = pages.values().copied().collect();
        let mut boxes = Vec::with_capacity(page_ids.len());
        for &page_id in &page_ids {
            boxes.push(effective_media_box(&doc, page_id)?);
        }

        let mut stamper = DocumentStamper::new(&mut doc);
        for ((page_id, media_box), label) in page_ids.iter().zip(&boxes).zip(&job.labels) {
            let overlay = render_stamp(
                &label.text,
                media_box.width(),
                media_box.height(),
                &self.config,
            )?;
            stamper.stamp_page(*page_id, &overlay, *media_box)?;
        }

        if let Some(parent) = document.output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StampError::Document(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        // Optional post-stamp flatten; on failure the stamped-but-
        // unflattened bytes still ship, with a warning.
        if self.config.flatten_output {
            if let Some(flattener) = &self.flattener {
                let scratch = scratch_file()?;
                save_document(&mut doc, scratch.path())?;
                if let Err(err) = flattener.flatten(scratch.path(), &document.output_path) {
                    warnings.push(format!(
                        "output flatten failed, writing stamped file as-is: {}",
                        err
                    ));
                    fs::copy(scratch.path(), &document.output_path).map_err(|e| {
                        StampError::Document(format!(
                            "cannot write {}: {}",
                            document.output_path.display(),
                            e
                        ))
                    })?;
                }
                return Ok(job.labels.len());
            }
        }

        save_document(&mut doc, &document.output_path)?;
        Ok(job.labels.len())
    }
}

/// Quick header check before handing the file to the parser
fn preflight(path: &Path) -> Result<()> {
    let mut file = File::open(path).map_err(|e| {
        StampError::Document(format!("cannot open {}: {}", path.display(), e))
    })?;
    let mut header = [0u8; 5];
    if file.read_exact(&mut header).is_err() || &header != b"%PDF-" {
        return Err(StampError::Document(format!(
            "{} is not a PDF (bad header)",
            path.display()
        )));
    }
    Ok(())
}

fn save_document(doc: &mut Document, path: &Path) -> Result<()> {
    doc.save(path).map_err(|e| {
        StampError::Document(format!("cannot write {}: {}", path.display(), e))
    })?;
    Ok(())
}

fn scratch_file() -> Result<NamedTempFile> {
    let scratch = tempfile::Builder::new()
        .prefix("bates-stage-")
        .suffix(".pdf")
        .tempfile()?;
    Ok(scratch)
}
