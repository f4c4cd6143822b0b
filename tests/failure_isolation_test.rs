//! Integration tests for per-document failure isolation
//!
//! A failing document must never abort the run or disturb the numbering
//! of its neighbors. Labels reserved by a document that fails after
//! reservation stay consumed, leaving a gap; labels are never reused.

mod common;

use bates_stamper_rs::prelude::*;
use indicatif::ProgressBar;
use lopdf::dictionary;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use common::{build_pdf, stamped_labels};

fn run(config: StampConfig, documents: &[DocumentRef]) -> RunReport {
    let pipeline = StampPipeline::new(config, Duration::from_secs(5));
    pipeline.run(documents, &ProgressBar::hidden())
}

fn failed_error(report: &RunReport, name: &str) -> String {
    let result = report
        .results
        .iter()
        .find(|r| r.document.relative_path.to_string_lossy() == name)
        .unwrap();
    match &result.status {
        DocumentStatus::Failed { error } => error.clone(),
        other => panic!("expected {} to fail, got {:?}", name, other),
    }
}

/// A corrupt document in the middle of the tree is isolated; since the
/// failure happens before reservation, its neighbors stay contiguous
#[test]
fn test_corrupt_document_consumes_no_labels() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    build_pdf(&input.path().join("a.pdf"), 1, 612.0, 792.0);
    // Valid header, rotten body: passes preflight, fails the parser
    fs::write(
        input.path().join("b.pdf"),
        b"%PDF-1.4\nRANDOM GARBAGE DATA HERE\n%%EOF",
    )
    .unwrap();
    build_pdf(&input.path().join("c.pdf"), 1, 612.0, 792.0);

    let documents = locate_documents(input.path(), output.path()).unwrap();
    let report = run(StampConfig::default(), &documents);

    assert_eq!(report.stamped_documents, 2);
    assert_eq!(report.failed_documents, 1);
    assert_eq!(stamped_labels(&output.path().join("a.pdf")), vec!["BATES-000001"]);
    assert_eq!(stamped_labels(&output.path().join("c.pdf")), vec!["BATES-000002"]);
    assert!(!output.path().join("b.pdf").exists());
    assert!(failed_error(&report, "b.pdf").contains("cannot parse"));
}

/// A file that is not a PDF at all is rejected by the preflight check
#[test]
fn test_non_pdf_payload_fails_preflight() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    fs::write(input.path().join("fake.pdf"), b"just some text").unwrap();

    let documents = locate_documents(input.path(), output.path()).unwrap();
    let report = run(StampConfig::default(), &documents);

    assert_eq!(report.failed_documents, 1);
    assert!(failed_error(&report, "fake.pdf").contains("bad header"));
}

/// A write failure after reservation retires the reserved labels: the
/// next document continues past the gap, numbers are never reused
#[test]
fn test_write_failure_leaves_gap() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    build_pdf(&input.path().join("a.pdf"), 1, 612.0, 792.0);
    build_pdf(&input.path().join("b.pdf"), 2, 612.0, 792.0);
    build_pdf(&input.path().join("c.pdf"), 1, 612.0, 792.0);

    // Occupy b's output path with a directory so its write fails
    fs::create_dir_all(output.path().join("b.pdf")).unwrap();

    let documents = locate_documents(input.path(), output.path()).unwrap();
    let report = run(StampConfig::default(), &documents);

    assert_eq!(report.stamped_documents, 2);
    assert_eq!(report.failed_documents, 1);
    assert_eq!(stamped_labels(&output.path().join("a.pdf")), vec!["BATES-000001"]);
    // b reserved 000002-000003 and failed; c continues at 000004
    assert_eq!(stamped_labels(&output.path().join("c.pdf")), vec!["BATES-000004"]);
    assert!(failed_error(&report, "b.pdf").contains("cannot write"));
}

/// A document with no pages cannot be stamped and consumes no labels
#[test]
fn test_zero_page_document_fails_cleanly() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    build_pdf(&input.path().join("empty.pdf"), 0, 612.0, 792.0);
    build_pdf(&input.path().join("real.pdf"), 1, 612.0, 792.0);

    let documents = locate_documents(input.path(), output.path()).unwrap();
    let report = run(StampConfig::default(), &documents);

    assert_eq!(report.stamped_documents, 1);
    assert_eq!(report.failed_documents, 1);
    assert!(failed_error(&report, "empty.pdf").contains("no pages"));
    // No gap: the empty document never reserved anything
    assert_eq!(
        stamped_labels(&output.path().join("real.pdf")),
        vec!["BATES-000001"]
    );
}

/// Encrypted documents are refused at reservation time
#[test]
fn test_encrypted_document_is_refused() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    // Build a normal document, then mark its trailer as encrypted
    let path = input.path().join("locked.pdf");
    build_pdf(&path, 1, 612.0, 792.0);
    let mut doc = lopdf::Document::load(&path).unwrap();
    let encrypt_id = doc.add_object(dictionary! { "Filter" => "Standard" });
    doc.trailer.set("Encrypt", encrypt_id);
    doc.save(&path).unwrap();

    let documents = locate_documents(input.path(), output.path()).unwrap();
    let report = run(StampConfig::default(), &documents);

    assert_eq!(report.stamped_documents, 0);
    assert_eq!(report.failed_documents, 1);
    assert!(!output.path().join("locked.pdf").exists());
}

/// A start value at the top of the counter range fails the document
/// instead of wrapping the sequence
#[test]
fn test_counter_exhaustion_fails_document_cleanly() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    build_pdf(&input.path().join("a.pdf"), 2, 612.0, 792.0);

    let config = StampConfig {
        start: u64::MAX,
        ..StampConfig::default()
    };
    let documents = locate_documents(input.path(), output.path()).unwrap();
    let report = run(config, &documents);

    assert_eq!(report.stamped_documents, 0);
    assert_eq!(report.failed_documents, 1);
    assert!(failed_error(&report, "a.pdf").contains("exhausted"));
    assert!(!output.path().join("a.pdf").exists());
}

/// A shutdown requested before the run starts produces an interrupted
/// report and processes nothing
#[test]
fn test_preset_shutdown_skips_all_work() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    build_pdf(&input.path().join("doc.pdf"), 1, 612.0, 792.0);

    let flag = Arc::new(AtomicBool::new(false));
    flag.store(true, Ordering::SeqCst);

    let pipeline =
        StampPipeline::new(StampConfig::default(), Duration::from_secs(5)).shutdown_on(flag);
    let documents = locate_documents(input.path(), output.path()).unwrap();
    let report = pipeline.run(&documents, &ProgressBar::hidden());

    assert!(report.interrupted);
    assert_eq!(report.total_documents, 0);
    assert!(!output.path().join("doc.pdf").exists());
}
