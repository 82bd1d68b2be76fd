// src/history/source.rs

//! Local package history source
//!
//! Runs the host package manager binary to produce the raw summary and
//! detail reports. Output is fully captured before any parsing happens and
//! a non-zero exit is a hard [`Error::LocalSource`] with no retry.

use crate::error::{Error, Result};
use std::process::Command;
use tracing::debug;

/// Provider of raw history report text, the seam between the engines and
/// the package manager binary
pub trait HistorySource {
    /// Raw `history list` output
    fn summary_report(&self) -> Result<String>;

    /// Raw `history info <id>` output for one transaction
    fn detail_report(&self, id: u64) -> Result<String>;
}

/// Validate a user-supplied transaction id before it goes anywhere near an
/// external invocation.
///
/// Only plain decimal digits are accepted; anything else is rejected up
/// front as an argument-injection defense.
pub fn validate_transaction_id(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Validation(format!(
            "invalid transaction id '{raw}': expected digits only"
        )));
    }
    trimmed
        .parse()
        .map_err(|_| Error::Validation(format!("transaction id out of range: '{raw}'")))
}

/// History source backed by the detected dnf/yum binary
pub struct DnfHistory {
    binary: String,
}

impl DnfHistory {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run_history(&self, args: &[&str]) -> Result<String> {
        debug!("running {} history {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .arg("history")
            .args(args)
            .output()
            .map_err(|e| {
                Error::LocalSource(format!(
                    "failed to run {}: {e}. Is {} installed?",
                    self.binary, self.binary
                ))
            })?;

        if !output.status.success() {
            return Err(Error::LocalSource(format!(
                "{} history {} failed: {}",
                self.binary,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl HistorySource for DnfHistory {
    // --reverse lists oldest first; the sync engine re-sorts by id anyway,
    // so the report order is cosmetic rather than load-bearing.
    fn summary_report(&self) -> Result<String> {
        self.run_history(&["list", "--reverse"])
    }

    fn detail_report(&self, id: u64) -> Result<String> {
        self.run_history(&["info", &id.to_string()])
    }
}
