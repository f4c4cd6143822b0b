//! Content flattening adapters
//!
//! Flattening normalizes a document's internal structure for maximum
//! viewer compatibility. The real work is done by Ghostscript when it is
//! installed; otherwise a degraded in-process rewrite keeps the pipeline
//! usable. The choice is made once per run, never per document.

use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use lopdf::Document;

use super::error::{Result, StampError};

pub const DEFAULT_FLATTEN_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A strategy for flattening one PDF file into another
pub trait Flattener: Send + Sync {
    fn name(&self) -> &'static str;

    /// Flatten `input` into `output`. Both paths must differ.
    fn flatten(&self, input: &Path, output: &Path) -> Result<()>;
}

/// External flatten via the `gs` pdfwrite device
pub struct GhostscriptFlattener {
    program: String,
    timeout: Duration,
}

impl GhostscriptFlattener {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("gs", timeout)
    }

    /// Override the executable name, mainly for tests
    pub fn with_program(program: &str, timeout: Duration) -> Self {
        GhostscriptFlattener {
            program: program.to_string(),
            timeout,
        }
    }
}

impl Flattener for GhostscriptFlattener {
    fn name(&self) -> &'static str {
        "ghostscript"
    }

    fn flatten(&self, input: &Path, output: &Path) -> Result<()> {
        let mut output_flag = OsString::from("-sOutputFile=");
        output_flag.push(output);

        let mut child = Command::new(&self.program)
            .arg("-q")
            .arg("-dNOPAUSE")
            .arg("-dBATCH")
            .arg("-dSAFER")
            .arg("-sDEVICE=pdfwrite")
            .arg("-dCompatibilityLevel=1.4")
            .arg("-dPDFSETTINGS=/prepress")
            .arg(output_flag)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                StampError::Flatten(format!("failed to spawn {}: {}", self.program, e))
            })?;

        // Drain stderr on its own thread; a chatty child would otherwise
        // fill the pipe and block instead of exiting
        let stderr_pipe = child.stderr.take();
        let drain = std::thread::spawn(move || {
            let mut captured = String::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut captured);
            }
            captured
        });

        // Poll rather than block so a hung process cannot stall the run
        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        let _ = drain.join();
                        return Err(StampError::Flatten(format!(
                            "{} timed out after {}s",
                            self.program,
                            self.timeout.as_secs()
                        )));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = drain.join();
                    return Err(StampError::Flatten(format!(
                        "failed waiting for {}: {}",
                        self.program, e
                    )));
                }
            }
        };

        let stderr = drain.join().unwrap_or_default();
        if !status.success() {
            return Err(StampError::Flatten(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Degraded in-process fallback: reparse and rewrite with compressed
/// streams. Normalizes cross-reference structure only; content is left
/// as stamped.
pub struct RewriteFlattener;

impl Flattener for RewriteFlattener {
    fn name(&self) -> &'static str {
        "rewrite"
    }

    fn flatten(&self, input: &Path, output: &Path) -> Result<()> {
        let mut doc = Document::load(input).map_err(|e| {
            StampError::Flatten(format!("cannot reload {}: {}", input.display(), e))
        })?;
        doc.compress();
        doc.save(output).map_err(|e| {
            StampError::Flatten(format!("cannot write {}: {}", output.display(), e))
        })?;
        Ok(())
    }
}

/// Whether the external flatten tool responds to a version query
pub fn ghostscript_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Probe once at run start and commit to one implementation
pub fn detect_flattener(timeout: Duration) -> Box<dyn Flattener> {
    if ghostscript_available("gs") {
        Box::new(GhostscriptFlattener::new(timeout))
    } else {
        eprintln!("⚠️  Ghostscript not found; falling back to in-process rewrite flatten");
        Box::new(RewriteFlattener)
    }
}
