// tests/agent_flow.rs

//! End-to-end agent flow over fixture reports and an in-memory ledger:
//! parse -> synchronize -> verify, then tamper with the server copy and
//! verify again.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use txmirror::history::HistorySource;
use txmirror::sync::ExecutionContext;
use txmirror::{
    ExecutionRecord, HostIdentity, Ledger, PackageAction, Result, StoredTransaction,
    TransactionRecord, synchronize, verify,
};

const SUMMARY_REPORT: &str = "\
ID     | Command line             | Date and time    | Action(s)      | Altered
-------------------------------------------------------------------------------
     1 | install vim-enhanced     | 2024-01-10 09:12 | Install        |    1
     2 | update                   | 2024-01-15 10:23 | Upgrade        |    2
";

const DETAIL_1: &str = "\
Transaction ID : 1
Begin time     : 2024-01-10 09:12:02
End time       : 2024-01-10 09:12:30
User           : root <root>
Return-Code    : Success
Releasever     : 9
Command Line   : install vim-enhanced
Packages Altered:
    Install vim-enhanced-2:8.2.2637-20.el9.x86_64 @appstream
";

const DETAIL_2: &str = "\
Transaction ID : 2
Begin time     : 2024-01-15 10:23:11
End time       : 2024-01-15 10:23:52 (41 seconds)
User           : root <root>
Return-Code    : Success
Releasever     : 9
Command Line   : update
Packages Altered:
    Upgrade  bash-5.1.8-5.el9.x86_64 @baseos
    Upgraded bash-5.1.8-4.el9.x86_64 @@System
Scriptlet output:
   1 /sbin/ldconfig: cache updated
";

struct FlatHistory;

impl HistorySource for FlatHistory {
    fn summary_report(&self) -> Result<String> {
        Ok(SUMMARY_REPORT.to_string())
    }

    fn detail_report(&self, id: u64) -> Result<String> {
        match id {
            1 => Ok(DETAIL_1.to_string()),
            2 => Ok(DETAIL_2.to_string()),
            _ => panic!("unexpected detail request for {id}"),
        }
    }
}

#[derive(Default)]
struct InMemoryServer {
    transactions: RefCell<HashMap<u64, StoredTransaction>>,
    executions: RefCell<Vec<ExecutionRecord>>,
}

impl Ledger for InMemoryServer {
    fn known_transaction_ids(&self, _host: &HostIdentity) -> Result<HashSet<u64>> {
        Ok(self.transactions.borrow().keys().copied().collect())
    }

    fn push_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.transactions.borrow_mut().insert(
            record.transaction_id,
            StoredTransaction {
                transaction_id: record.transaction_id,
                hostname: record.hostname.clone(),
                begin_time: record.begin_time.clone(),
                end_time: record.end_time.clone(),
                actions: record.actions.clone(),
                altered: record.altered.clone(),
                user: record.user.clone(),
                return_code: record.return_code.clone(),
                release_version: record.release_version.clone(),
                command_line: record.command_line.clone(),
                comment: record.comment.clone(),
                scriptlet_output: record.scriptlet_output.clone(),
                items: record.items.clone(),
            },
        );
        Ok(())
    }

    fn transaction_items(
        &self,
        _machine_id: &str,
        transaction_id: u64,
    ) -> Result<StoredTransaction> {
        Ok(self
            .transactions
            .borrow()
            .get(&transaction_id)
            .cloned()
            .expect("transaction not stored"))
    }

    fn push_execution(&self, record: &ExecutionRecord) -> Result<()> {
        self.executions.borrow_mut().push(record.clone());
        Ok(())
    }
}

fn host() -> HostIdentity {
    HostIdentity {
        machine_id: "3f1c9a".into(),
        hostname: "build02".into(),
    }
}

#[test]
fn test_sync_then_verify_round_trip() {
    let history = FlatHistory;
    let server = InMemoryServer::default();

    // First run mirrors both transactions
    let outcome = synchronize(&history, &server, &host(), &ExecutionContext::default()).unwrap();
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.sent, 2);

    {
        let stored = server.transactions.borrow();
        let first = &stored[&1];
        assert_eq!(first.hostname, "build02");
        assert_eq!(first.command_line, "install vim-enhanced");
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.items[0].epoch, "2");
        assert_eq!(first.items[0].repo, "appstream");

        let second = &stored[&2];
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.items[0].action, PackageAction::Upgrade);
        assert_eq!(second.items[1].from_repo, "System");
        assert_eq!(second.scriptlet_output, "1 /sbin/ldconfig: cache updated");
        assert!(second.begin_time.starts_with("2024-01-15T10:23:11"));
    }

    // Second run finds nothing new
    let again = synchronize(&history, &server, &host(), &ExecutionContext::default()).unwrap();
    assert_eq!(again.processed, 2);
    assert_eq!(again.sent, 0);

    // Both runs were recorded
    let executions = server.executions.borrow();
    assert_eq!(executions.len(), 2);
    assert!(executions.iter().all(|e| e.success));
    assert_eq!(executions[0].transactions_sent, 2);
    assert_eq!(executions[1].transactions_sent, 0);
    drop(executions);

    // The mirror audits clean
    let report = verify(&history, &server, &host()).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.fully_verified, 2);
    assert_eq!(report.local_total, 2);
    assert_eq!(report.remote_total, 2);
}

#[test]
fn test_verify_flags_tampered_mirror() {
    let history = FlatHistory;
    let server = InMemoryServer::default();
    synchronize(&history, &server, &host(), &ExecutionContext::default()).unwrap();

    // Drop one item from transaction 2 on the server side
    server
        .transactions
        .borrow_mut()
        .get_mut(&2)
        .unwrap()
        .items
        .remove(1);

    let report = verify(&history, &server, &host()).unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.with_missing_items(), vec![2]);
    assert!(report.with_extra_items().is_empty());
    assert_eq!(report.fully_verified, 1);
    assert_eq!(report.item_diffs[0].missing[0].name, "bash");
}
