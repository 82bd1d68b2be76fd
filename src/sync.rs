// src/sync.rs

//! Synchronization engine
//!
//! Reconciles the local transaction history against the set already held by
//! the ledger server and pushes only the unsent delta, oldest first. Every
//! run emits exactly one execution record, success or failure, so the server
//! always sees that the agent ran.

use crate::error::Result;
use crate::history::{HistorySource, parse_detail_report, parse_summary_report};
use crate::host::HostIdentity;
use crate::ledger::{ExecutionRecord, Ledger, TransactionRecord};
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

/// Run-wide values carried into the execution record, discovered once at
/// the start of a run
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub agent_version: String,
    /// os-release PRETTY_NAME
    pub os: String,
    pub needs_restarting: bool,
}

/// Aggregate outcome of one synchronization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Transactions fully handled: skipped as already known, or pushed
    pub processed: usize,
    /// Transactions actually pushed this run
    pub sent: usize,
}

/// Synchronize the local transaction history with the ledger server.
///
/// Transactions are walked in ascending id order so a partial failure never
/// leaves a later transaction recorded without an earlier one. Any failure
/// aborts the run immediately with the counters frozen at their last
/// values; the execution record is still delivered, tagged as failed and
/// carrying the error text.
pub fn synchronize(
    history: &dyn HistorySource,
    ledger: &dyn Ledger,
    host: &HostIdentity,
    ctx: &ExecutionContext,
) -> Result<SyncOutcome> {
    let mut processed = 0;
    let mut sent = 0;

    let result = sync_run(history, ledger, host, &mut processed, &mut sent);

    let record = ExecutionRecord {
        machine_id: host.machine_id.clone(),
        hostname: host.hostname.clone(),
        executed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        success: result.is_ok(),
        details: match &result {
            Ok(()) => String::new(),
            Err(e) => e.to_string(),
        },
        transactions_processed: processed,
        transactions_sent: sent,
        agent_version: ctx.agent_version.clone(),
        os: ctx.os.clone(),
        needs_restarting: ctx.needs_restarting,
    };

    // The run result stands on its own; a lost execution record is only
    // worth a warning.
    if let Err(e) = ledger.push_execution(&record) {
        warn!("failed to record execution: {e}");
    }

    result.map(|()| SyncOutcome { processed, sent })
}

fn sync_run(
    history: &dyn HistorySource,
    ledger: &dyn Ledger,
    host: &HostIdentity,
    processed: &mut usize,
    sent: &mut usize,
) -> Result<()> {
    let known = ledger.known_transaction_ids(host)?;
    debug!("server knows {} transactions for this host", known.len());

    let mut summaries = parse_summary_report(&history.summary_report()?)?;
    summaries.sort_by_key(|s| s.id);

    for summary in &summaries {
        if known.contains(&summary.id) {
            debug!("transaction #{} already sent, skipping", summary.id);
            *processed += 1;
            continue;
        }

        let detail = parse_detail_report(summary.id, &history.detail_report(summary.id)?)?;
        let record = TransactionRecord::assemble(host, summary, &detail);
        ledger.push_transaction(&record)?;

        info!(
            "sent transaction #{} ({} items)",
            summary.id,
            record.items.len()
        );
        *processed += 1;
        *sent += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ledger::testing::{FixtureHistory, MemoryLedger, detail_report, summary_report};

    fn host() -> HostIdentity {
        HostIdentity {
            machine_id: "abc123".into(),
            hostname: "web01".into(),
        }
    }

    fn history_with_ids(ids: &[u64]) -> FixtureHistory {
        let rows: Vec<(u64, &str, &str)> = ids
            .iter()
            .map(|&id| (id, "install vim", "2024-01-15 10:23"))
            .collect();
        let mut history = FixtureHistory {
            summary: summary_report(&rows),
            ..FixtureHistory::default()
        };
        for &id in ids {
            history.details.insert(
                id,
                detail_report("vim-enhanced-8.2.2637-20.el9.x86_64", "appstream"),
            );
        }
        history
    }

    #[test]
    fn test_pushes_only_unsent_delta() {
        let history = history_with_ids(&[1, 2, 3]);
        let ledger = MemoryLedger::with_known_ids(&[1, 3]);

        let outcome = synchronize(&history, &ledger, &host(), &ExecutionContext::default())
            .unwrap();

        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.sent, 1);
        let pushed = ledger.pushed.borrow();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].transaction_id, 2);
        assert_eq!(pushed[0].machine_id, "abc123");
        assert_eq!(pushed[0].items.len(), 1);
    }

    #[test]
    fn test_pushes_oldest_first() {
        let mut history = history_with_ids(&[3, 1, 2]);
        // Rows deliberately out of order in the report text
        history.summary = summary_report(&[
            (3, "update", "2024-02-01 08:00"),
            (1, "install vim", "2024-01-10 09:12"),
            (2, "update", "2024-01-15 10:23"),
        ]);
        let ledger = MemoryLedger::default();

        synchronize(&history, &ledger, &host(), &ExecutionContext::default()).unwrap();

        let order: Vec<u64> = ledger
            .pushed
            .borrow()
            .iter()
            .map(|r| r.transaction_id)
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_push_failure_aborts_and_freezes_counters() {
        let history = history_with_ids(&[1, 2, 3]);
        let mut ledger = MemoryLedger::with_known_ids(&[1, 3]);
        ledger.fail_push_for = Some(2);

        let result = synchronize(&history, &ledger, &host(), &ExecutionContext::default());
        assert!(matches!(result, Err(Error::Remote(_))));

        let executions = ledger.executions.borrow();
        assert_eq!(executions.len(), 1);
        assert!(!executions[0].success);
        assert_eq!(executions[0].transactions_processed, 1);
        assert_eq!(executions[0].transactions_sent, 0);
        assert!(executions[0].details.contains("500"));
    }

    #[test]
    fn test_listing_failure_is_fatal_but_still_recorded() {
        let history = history_with_ids(&[1]);
        let mut ledger = MemoryLedger::default();
        ledger.fail_listing = true;

        let result = synchronize(&history, &ledger, &host(), &ExecutionContext::default());
        assert!(matches!(result, Err(Error::Remote(_))));
        assert!(ledger.pushed.borrow().is_empty());

        let executions = ledger.executions.borrow();
        assert_eq!(executions.len(), 1);
        assert!(!executions[0].success);
        assert_eq!(executions[0].transactions_processed, 0);
    }

    #[test]
    fn test_second_run_sends_nothing() {
        let history = history_with_ids(&[10, 11]);
        let ledger = MemoryLedger::default();

        let first = synchronize(&history, &ledger, &host(), &ExecutionContext::default())
            .unwrap();
        assert_eq!(first.sent, 2);

        let second = synchronize(&history, &ledger, &host(), &ExecutionContext::default())
            .unwrap();
        assert_eq!(second.processed, 2);
        assert_eq!(second.sent, 0);
        assert_eq!(ledger.executions.borrow().len(), 2);
    }

    #[test]
    fn test_execution_record_carries_context() {
        let history = history_with_ids(&[]);
        let ledger = MemoryLedger::default();
        let ctx = ExecutionContext {
            agent_version: "0.3.0".into(),
            os: "AlmaLinux 9.3".into(),
            needs_restarting: true,
        };

        synchronize(&history, &ledger, &host(), &ctx).unwrap();

        let executions = ledger.executions.borrow();
        assert_eq!(executions[0].agent_version, "0.3.0");
        assert_eq!(executions[0].os, "AlmaLinux 9.3");
        assert!(executions[0].needs_restarting);
        assert!(executions[0].success);
        assert!(executions[0].details.is_empty());
    }
}
