// src/ledger/mod.rs

//! Remote ledger client contract and wire records
//!
//! The ledger server keeps the durable, queryable copy of every host's
//! transaction history. The engines only depend on the [`Ledger`] trait;
//! the HTTP implementation lives in [`http`].

mod http;

pub use http::HttpLedger;

use crate::error::Result;
use crate::history::{PackageChange, TransactionDetail, TransactionSummary};
use crate::host::HostIdentity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The four calls the engines make against the ledger server.
///
/// All calls are synchronous request/response, single attempt; a
/// non-success response is uniformly an [`crate::Error::Remote`].
pub trait Ledger {
    /// Transaction ids the server already holds for this host
    fn known_transaction_ids(&self, host: &HostIdentity) -> Result<HashSet<u64>>;

    /// Store one transaction with all its items
    fn push_transaction(&self, record: &TransactionRecord) -> Result<()>;

    /// Fetch one stored transaction and its items
    fn transaction_items(&self, machine_id: &str, transaction_id: u64) -> Result<StoredTransaction>;

    /// Record one agent run, success or failure
    fn push_execution(&self, record: &ExecutionRecord) -> Result<()>;
}

/// Wire record for storing one transaction: local summary + detail + host
/// identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: u64,
    pub machine_id: String,
    pub hostname: String,
    pub begin_time: String,
    pub end_time: String,
    pub actions: String,
    pub altered: String,
    pub user: String,
    pub return_code: String,
    pub release_version: String,
    pub command_line: String,
    pub comment: String,
    /// Scriptlet output lines, newline-joined on the wire
    pub scriptlet_output: String,
    pub items: Vec<PackageChange>,
}

impl TransactionRecord {
    /// Assemble the wire record from the parsed local records
    pub fn assemble(
        host: &HostIdentity,
        summary: &TransactionSummary,
        detail: &TransactionDetail,
    ) -> TransactionRecord {
        TransactionRecord {
            transaction_id: summary.id,
            machine_id: host.machine_id.clone(),
            hostname: host.hostname.clone(),
            begin_time: detail.begin_time.clone(),
            end_time: detail.end_time.clone(),
            actions: summary.actions.clone(),
            altered: summary.altered.clone(),
            user: detail.user.clone(),
            return_code: detail.return_code.clone(),
            release_version: detail.release_version.clone(),
            command_line: summary.command_line.clone(),
            comment: detail.comment.clone(),
            scriptlet_output: detail.scriptlet_output.join("\n"),
            items: detail.packages.clone(),
        }
    }
}

/// A transaction as returned by the server's items endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredTransaction {
    pub transaction_id: u64,
    pub hostname: String,
    pub begin_time: String,
    pub end_time: String,
    pub actions: String,
    pub altered: String,
    pub user: String,
    pub return_code: String,
    pub release_version: String,
    pub command_line: String,
    pub comment: String,
    pub scriptlet_output: String,
    pub items: Vec<PackageChange>,
}

/// One agent run, as reported to the server after every synchronization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionRecord {
    pub machine_id: String,
    pub hostname: String,
    /// RFC 3339
    pub executed_at: String,
    pub success: bool,
    /// Empty on success, the error text on failure
    pub details: String,
    pub transactions_processed: usize,
    pub transactions_sent: usize,
    pub agent_version: String,
    /// os-release PRETTY_NAME
    pub os: String,
    pub needs_restarting: bool,
}

/// One machine-id registration for a hostname, as returned by the server.
///
/// A hostname accumulates a new row whenever it is reinstalled or
/// re-provisioned under a fresh machine id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineRecord {
    pub hostname: String,
    pub machine_id: String,
    /// RFC 3339; absent until the server has seen a run from the machine
    pub begin_time: Option<String>,
}

/// Minimal row shape for the known-transactions listing
#[derive(Debug, Deserialize)]
pub(crate) struct KnownTransaction {
    pub transaction_id: u64,
}

/// In-memory test doubles shared by the engine unit tests and the
/// integration suite.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::Error;
    use crate::history::HistorySource;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// A ledger held entirely in memory, with per-call failure switches
    #[derive(Default)]
    pub struct MemoryLedger {
        pub known_ids: RefCell<HashSet<u64>>,
        pub stored: RefCell<HashMap<u64, StoredTransaction>>,
        pub pushed: RefCell<Vec<TransactionRecord>>,
        pub executions: RefCell<Vec<ExecutionRecord>>,
        pub fail_listing: bool,
        pub fail_push_for: Option<u64>,
        pub fail_items_for: RefCell<HashSet<u64>>,
    }

    impl MemoryLedger {
        pub fn with_known_ids(ids: &[u64]) -> MemoryLedger {
            let ledger = MemoryLedger::default();
            ledger.known_ids.borrow_mut().extend(ids.iter().copied());
            ledger
        }
    }

    impl Ledger for MemoryLedger {
        fn known_transaction_ids(&self, _host: &HostIdentity) -> Result<HashSet<u64>> {
            if self.fail_listing {
                return Err(Error::Remote("server returned status 503".to_string()));
            }
            Ok(self.known_ids.borrow().clone())
        }

        fn push_transaction(&self, record: &TransactionRecord) -> Result<()> {
            if self.fail_push_for == Some(record.transaction_id) {
                return Err(Error::Remote("server returned status 500".to_string()));
            }
            self.known_ids.borrow_mut().insert(record.transaction_id);
            self.stored.borrow_mut().insert(
                record.transaction_id,
                StoredTransaction {
                    transaction_id: record.transaction_id,
                    hostname: record.hostname.clone(),
                    items: record.items.clone(),
                    ..StoredTransaction::default()
                },
            );
            self.pushed.borrow_mut().push(record.clone());
            Ok(())
        }

        fn transaction_items(
            &self,
            _machine_id: &str,
            transaction_id: u64,
        ) -> Result<StoredTransaction> {
            if self.fail_items_for.borrow().contains(&transaction_id) {
                return Err(Error::Remote("server returned status 502".to_string()));
            }
            self.stored
                .borrow()
                .get(&transaction_id)
                .cloned()
                .ok_or_else(|| Error::remote_status(404, "transaction not found"))
        }

        fn push_execution(&self, record: &ExecutionRecord) -> Result<()> {
            self.executions.borrow_mut().push(record.clone());
            Ok(())
        }
    }

    /// History source serving canned report text
    #[derive(Default)]
    pub struct FixtureHistory {
        pub summary: String,
        pub details: HashMap<u64, String>,
    }

    impl HistorySource for FixtureHistory {
        fn summary_report(&self) -> Result<String> {
            Ok(self.summary.clone())
        }

        fn detail_report(&self, id: u64) -> Result<String> {
            self.details
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::LocalSource(format!("no detail fixture for {id}")))
        }
    }

    /// Summary report text with the standard two header lines
    pub fn summary_report(rows: &[(u64, &str, &str)]) -> String {
        let mut text = String::from(
            "ID     | Command line             | Date and time    | Action(s)      | Altered\n\
             -----------------------------------------------------------------------------\n",
        );
        for (id, command, date) in rows {
            text.push_str(&format!(
                "    {id} | {command} | {date} | Install        |    1\n"
            ));
        }
        text
    }

    /// Minimal detail report for one transaction with one installed package
    pub fn detail_report(descriptor: &str, repo: &str) -> String {
        format!(
            "Transaction ID : 0\n\
             Begin time     : 2024-01-15 10:23:11\n\
             End time       : 2024-01-15 10:23:52\n\
             User           : root <root>\n\
             Return-Code    : Success\n\
             Command Line   : install\n\
             Packages Altered:\n    Install  {descriptor} @{repo}\n"
        )
    }
}
