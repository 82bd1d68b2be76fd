// src/verify.rs

//! Verification engine
//!
//! Performs a full two-way audit of local vs. remote transactions: first a
//! set diff of transaction ids, then a per-transaction diff of package
//! items for every id both sides hold. The audit walks every comparable id
//! before concluding; remote fetch problems demote to per-id warnings
//! because this phase is diagnostic, not transactional.

use crate::error::Result;
use crate::history::{HistorySource, PackageChange, parse_detail_report, parse_summary_report};
use crate::host::HostIdentity;
use crate::ledger::Ledger;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Item-level discrepancies for one transaction
#[derive(Debug, Clone)]
pub struct ItemDiff {
    pub transaction_id: u64,
    /// Items present locally but not on the server
    pub missing: Vec<PackageChange>,
    /// Items present on the server but not locally
    pub extra: Vec<PackageChange>,
}

/// Outcome of one verification run
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub local_total: usize,
    pub remote_total: usize,
    /// Local transaction ids absent on the server, ascending
    pub missing_on_server: Vec<u64>,
    /// Transactions whose item sets differ, ascending by id
    pub item_diffs: Vec<ItemDiff>,
    /// Transactions with identical item sets on both sides
    pub fully_verified: usize,
    /// Ids skipped because a detail fetch failed on either side
    pub skipped: Vec<u64>,
}

impl VerifyReport {
    /// Ids of transactions missing at least one item on the server
    pub fn with_missing_items(&self) -> Vec<u64> {
        self.item_diffs
            .iter()
            .filter(|d| !d.missing.is_empty())
            .map(|d| d.transaction_id)
            .collect()
    }

    /// Ids of transactions with at least one extra item on the server
    pub fn with_extra_items(&self) -> Vec<u64> {
        self.item_diffs
            .iter()
            .filter(|d| !d.extra.is_empty())
            .map(|d| d.transaction_id)
            .collect()
    }

    /// True only when every discrepancy category is empty
    pub fn is_clean(&self) -> bool {
        self.missing_on_server.is_empty() && self.item_diffs.is_empty()
    }
}

/// Audit the ledger server's copy of this host's transaction history.
///
/// Ids present only on the server are not walked for item comparison;
/// there is no local ground truth to compare them against.
pub fn verify(
    history: &dyn HistorySource,
    ledger: &dyn Ledger,
    host: &HostIdentity,
) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    let summaries = parse_summary_report(&history.summary_report()?)?;
    let mut local_ids: Vec<u64> = summaries.iter().map(|s| s.id).collect();
    local_ids.sort_unstable();
    report.local_total = local_ids.len();

    let remote_ids = ledger.known_transaction_ids(host)?;
    report.remote_total = remote_ids.len();
    debug!(
        "verifying {} local against {} remote transactions",
        report.local_total, report.remote_total
    );

    report.missing_on_server = local_ids
        .iter()
        .copied()
        .filter(|id| !remote_ids.contains(id))
        .collect();

    for &id in local_ids.iter().filter(|id| remote_ids.contains(*id)) {
        let local_detail = match history.detail_report(id) {
            Ok(text) => parse_detail_report(id, &text)?,
            Err(e) => {
                warn!("could not get local details for transaction #{id}: {e}");
                report.skipped.push(id);
                continue;
            }
        };

        let stored = match ledger.transaction_items(&host.machine_id, id) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("could not get server details for transaction #{id}: {e}");
                report.skipped.push(id);
                continue;
            }
        };

        let (missing, extra) = compare_items(&local_detail.packages, &stored.items);
        if missing.is_empty() && extra.is_empty() {
            report.fully_verified += 1;
        } else {
            report.item_diffs.push(ItemDiff {
                transaction_id: id,
                missing,
                extra,
            });
        }
    }

    Ok(report)
}

/// Diff two item lists on the package identity key.
///
/// The key is `(action, name, version, release, epoch, arch)`; repository
/// fields are carried along for display but never compared. Returns
/// `(missing, extra)` in input order.
pub fn compare_items(
    local: &[PackageChange],
    remote: &[PackageChange],
) -> (Vec<PackageChange>, Vec<PackageChange>) {
    let local_keys: HashSet<_> = local.iter().map(|p| p.identity()).collect();
    let remote_keys: HashSet<_> = remote.iter().map(|p| p.identity()).collect();

    let missing = local
        .iter()
        .filter(|p| !remote_keys.contains(&p.identity()))
        .cloned()
        .collect();
    let extra = remote
        .iter()
        .filter(|p| !local_keys.contains(&p.identity()))
        .cloned()
        .collect();

    (missing, extra)
}
