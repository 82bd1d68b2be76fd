// src/history/mod.rs

//! Local package-manager transaction history
//!
//! Typed records for dnf/yum history reports, the parsers that produce them
//! from raw report text, and the subprocess source that runs the reports.
//! All records are constructed fresh on every parse, consumed once by the
//! sync or verify engine, and discarded; nothing here is cached or mutated
//! after construction.

mod nevra;
mod report;
mod source;

pub use nevra::Nevra;
pub use report::{normalize_datetime, parse_detail_report, parse_summary_report};
pub use source::{DnfHistory, HistorySource, validate_transaction_id};

use serde::{Deserialize, Serialize};

/// One row of `dnf history list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSummary {
    /// Host-local sequential transaction id
    pub id: u64,
    pub command_line: String,
    /// Normalized to RFC 3339 at parse time
    pub timestamp: String,
    /// Free-text action summary, e.g. "Install 3, Upgrade 2"
    pub actions: String,
    /// Free-text altered-count annotation, e.g. "5" or "5 EE"
    pub altered: String,
}

/// The full record for one transaction, from `dnf history info <id>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionDetail {
    pub id: u64,
    /// RFC 3339
    pub begin_time: String,
    /// RFC 3339
    pub end_time: String,
    pub user: String,
    pub return_code: String,
    pub release_version: String,
    pub command_line: String,
    pub comment: String,
    pub packages: Vec<PackageChange>,
    /// Verbatim scriptlet output lines, order preserved, may be empty
    pub scriptlet_output: Vec<String>,
}

/// The kind of change applied to one package within a transaction
///
/// Modeled as a closed set with a fallback so future dnf output tokens are
/// carried through verbatim instead of being silently misclassified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageAction {
    Install,
    Upgrade,
    Erase,
    Downgrade,
    Reinstall,
    Obsoleting,
    Other(String),
}

impl PackageAction {
    /// Classify the leading token of a package-change line
    pub fn from_token(token: &str) -> PackageAction {
        match token {
            "Install" => PackageAction::Install,
            "Upgrade" | "Update" => PackageAction::Upgrade,
            "Erase" | "Remove" => PackageAction::Erase,
            "Downgrade" => PackageAction::Downgrade,
            "Reinstall" => PackageAction::Reinstall,
            "Obsoleting" => PackageAction::Obsoleting,
            other => PackageAction::Other(other.to_string()),
        }
    }

    /// The canonical token for this action
    pub fn as_str(&self) -> &str {
        match self {
            PackageAction::Install => "Install",
            PackageAction::Upgrade => "Upgrade",
            PackageAction::Erase => "Erase",
            PackageAction::Downgrade => "Downgrade",
            PackageAction::Reinstall => "Reinstall",
            PackageAction::Obsoleting => "Obsoleting",
            PackageAction::Other(token) => token,
        }
    }
}

impl std::fmt::Display for PackageAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PackageAction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PackageAction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(PackageAction::from_token(&token))
    }
}

/// One package affected by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageChange {
    pub action: PackageAction,
    pub name: String,
    pub version: String,
    pub release: String,
    /// Empty string when the package carries no epoch
    #[serde(default)]
    pub epoch: String,
    pub arch: String,
    /// The repository a package came from, for plain `@repo` lines
    #[serde(default)]
    pub repo: String,
    /// Set only for `@@repo` upgraded pairs, mutually exclusive with `repo`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from_repo: String,
}

impl PackageChange {
    /// Identity tuple used when comparing items across systems.
    ///
    /// `repo`/`from_repo` are carried for display only; two changes that
    /// differ solely in repository are the same item.
    pub fn identity(&self) -> (&PackageAction, &str, &str, &str, &str, &str) {
        (
            &self.action,
            self.name.as_str(),
            self.version.as_str(),
            self.release.as_str(),
            self.epoch.as_str(),
            self.arch.as_str(),
        )
    }

    /// Packed `name-version-release.arch` form for display
    pub fn descriptor(&self) -> String {
        format!("{}-{}-{}.{}", self.name, self.version, self.release, self.arch)
    }
}
