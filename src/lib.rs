// src/lib.rs

//! txmirror
//!
//! Host agent that keeps a durable, de-duplicated copy of this machine's
//! yum/dnf transaction history on a remote ledger server, and can audit
//! that copy against the live local history.
//!
//! # Architecture
//!
//! - History parser: turns the `dnf history list` table and the
//!   `dnf history info` block into typed transaction records
//! - Synchronization engine: pushes only the unsent delta, oldest first,
//!   and records every run on the server
//! - Verification engine: full two-way diff of transactions and their
//!   package items, on the NEVRA + action identity
//!
//! Everything runs strictly sequentially; each run reads fresh state and
//! discards it on completion.

pub mod commands;
pub mod config;
mod error;
pub mod history;
pub mod host;
pub mod ledger;
pub mod sync;
pub mod verify;

pub use config::AgentConfig;
pub use error::{Error, Result};
pub use history::{
    Nevra, PackageAction, PackageChange, TransactionDetail, TransactionSummary,
    parse_detail_report, parse_summary_report,
};
pub use host::{HostIdentity, OsRelease};
pub use ledger::{
    ExecutionRecord, HttpLedger, Ledger, MachineRecord, StoredTransaction, TransactionRecord,
};
pub use sync::{ExecutionContext, SyncOutcome, synchronize};
pub use verify::{VerifyReport, compare_items, verify};
