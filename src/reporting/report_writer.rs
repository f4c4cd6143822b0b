//! Report writing functionality

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::core::error::{Result, StampError};
use crate::core::pipeline::{DocumentStatus, RunReport};

/// Write the human-readable run report
///
/// # Arguments
/// * `output_path` - Path to output file
/// * `report` - Aggregated run results
pub fn write_report(output_path: &Path, report: &RunReport) -> Result<()> {
    let mut file = File::create(output_path)?;

    // Write header with timestamp
    let now = std::time::SystemTime::now();
    writeln!(file, "Bates Stamping Report")?;
    writeln!(file, "=====================")?;
    writeln!(file, "Generated: {:?}", now)?;
    writeln!(file)?;

    writeln!(file, "Summary Statistics:")?;
    writeln!(file, "-------------------")?;
    writeln!(file, "  Total documents: {}", report.total_documents)?;
    writeln!(file, "  Stamped documents: {}", report.stamped_documents)?;
    writeln!(file, "  Failed documents: {}", report.failed_documents)?;
    writeln!(file, "  Pages stamped: {}", report.pages_stamped)?;
    if let (Some(first), Some(last)) = (&report.first_label, &report.last_label) {
        writeln!(file, "  Bates range: {} - {}", first, last)?;
    }
    if report.interrupted {
        writeln!(file, "  Run interrupted before completion")?;
    }
    writeln!(file)?;

    if report.failed_documents > 0 {
        writeln!(file, "Failed Documents:")?;
        writeln!(file, "-----------------")?;
        for result in &report.results {
            if let DocumentStatus::Failed { error } = &result.status {
                writeln!(file, "  {}", result.document.input_path.display())?;
                writeln!(file, "    {}", error)?;
            }
        }
        writeln!(file)?;
    }

    if report.warning_count() > 0 {
        writeln!(file, "Warnings:")?;
        writeln!(file, "---------")?;
        for result in &report.results {
            for warning in &result.warnings {
                writeln!(file, "  {}", result.document.input_path.display())?;
                writeln!(file, "    {}", warning)?;
            }
        }
        writeln!(file)?;
    }

    writeln!(file, "Stamped Documents:")?;
    writeln!(file, "------------------")?;
    for result in &report.results {
        if let DocumentStatus::Stamped {
            pages_stamped,
            first_label,
            last_label,
        } = &result.status
        {
            writeln!(
                file,
                "  {} - {}  {} ({} page{})",
                first_label,
                last_label,
                result.document.relative_path.display(),
                pages_stamped,
                if *pages_stamped == 1 { "" } else { "s" }
            )?;
        }
    }

    Ok(())
}

/// Write the machine-readable manifest (the Bates log)
///
/// Deliberately timestamp-free so identical runs produce identical
/// manifests.
pub fn write_manifest(output_path: &Path, report: &RunReport) -> Result<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| StampError::Document(format!("cannot serialize manifest: {}", e)))?;
    Ok(())
}

/// Print the end-of-run console summary
pub fn print_summary(report: &RunReport) {
    println!("==================================================");
    println!("STAMPING COMPLETE");
    println!("==================================================");
    println!("Documents stamped: {}", report.stamped_documents);
    println!("Documents failed: {}", report.failed_documents);
    println!("Pages stamped: {}", report.pages_stamped);
    match (&report.first_label, &report.last_label) {
        (Some(first), Some(last)) => println!("Bates range: {} - {}", first, last),
        _ => println!("Bates range: (no labels applied)"),
    }
    if report.warning_count() > 0 {
        println!("Warnings: {}", report.warning_count());
    }
    println!();
}
