//! Sequential Bates label allocation

use serde::Serialize;
use std::fmt;

use super::error::{Result, StampError};

/// Minimum digit count in a label; larger values render in full
pub const LABEL_PAD_WIDTH: usize = 6;

/// One issued label: the counter value and its rendered text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatesLabel {
    pub value: u64,
    pub text: String,
}

impl fmt::Display for BatesLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Monotonic label source for one run
///
/// Owned by the pipeline and borrowed mutably during the sequential
/// reservation phase, so issue order is exactly reservation order.
/// Values increase by 1 per call and are never reissued; labels reserved
/// by a document that later fails stay consumed.
#[derive(Debug)]
pub struct BatesAllocator {
    prefix: String,
    next: u64,
    issued: u64,
}

impl BatesAllocator {
    pub fn new(prefix: &str, start: u64) -> Self {
        BatesAllocator {
            prefix: prefix.to_string(),
            next: start,
            issued: 0,
        }
    }

    /// Issue the next label and advance the counter by exactly 1
    ///
    /// The counter refuses to wrap: once advancing would overflow, this
    /// and every later call fail, so issued values stay strictly
    /// increasing. The final value of the range is never issued.
    pub fn next_label(&mut self) -> Result<BatesLabel> {
        let value = self.next;
        self.next = value.checked_add(1).ok_or_else(|| {
            StampError::Document("label counter exhausted at the end of its range".to_string())
        })?;
        self.issued += 1;
        Ok(BatesLabel {
            value,
            text: format!("{}{:0width$}", self.prefix, value, width = LABEL_PAD_WIDTH),
        })
    }

    /// How many labels this run has consumed so far
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// The value the next call to `next_label` will use
    pub fn peek(&self) -> u64 {
        self.next
    }
}
