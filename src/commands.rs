// src/commands.rs
//! Command handlers for the txmirror CLI

use crate::config::AgentConfig;
use crate::history::{DnfHistory, validate_transaction_id};
use crate::host::{self, HostIdentity, OsRelease};
use crate::ledger::HttpLedger;
use crate::sync::{ExecutionContext, synchronize};
use crate::verify::{VerifyReport, verify};
use anyhow::Result;
use tracing::info;

/// Everything a run needs from the host, discovered once up front
struct RunEnv {
    host: HostIdentity,
    release: OsRelease,
    binary: String,
}

fn discover_env() -> Result<RunEnv> {
    let host = HostIdentity::discover()?;
    let release = OsRelease::load();
    let binary = host::package_binary(&release)?;
    Ok(RunEnv {
        host,
        release,
        binary,
    })
}

/// `txmirror sync`: push the unsent local transactions to the ledger server
pub fn run_sync(config: &AgentConfig) -> Result<()> {
    let env = discover_env()?;
    let history = DnfHistory::new(&env.binary);
    let ledger = HttpLedger::from_config(config)?;

    let ctx = ExecutionContext {
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        os: env.release.pretty_name.clone(),
        needs_restarting: host::needs_restarting(&env.binary),
    };

    println!("Synchronizing transaction history for {}", env.host.hostname);
    let outcome = synchronize(&history, &ledger, &env.host, &ctx)?;
    println!(
        "Done. {} transactions processed, {} transactions sent.",
        outcome.processed, outcome.sent
    );

    Ok(())
}

/// `txmirror verify`: audit the server's copy against local history.
///
/// Returns whether the audit came back clean; the caller turns a dirty
/// audit into a non-zero exit status.
pub fn run_verify(config: &AgentConfig) -> Result<bool> {
    let env = discover_env()?;
    let history = DnfHistory::new(&env.binary);
    let ledger = HttpLedger::from_config(config)?;

    println!("Verifying data integrity for {}", env.host.hostname);
    println!("Machine ID: {}\n", env.host.machine_id);

    let report = verify(&history, &ledger, &env.host)?;
    print_verify_report(&report);

    Ok(report.is_clean())
}

fn print_verify_report(report: &VerifyReport) {
    for id in &report.missing_on_server {
        println!("  ✗ Transaction #{id} exists locally but not on server");
    }

    for diff in &report.item_diffs {
        if !diff.missing.is_empty() {
            println!(
                "  ✗ Transaction #{} is missing {} package(s) on server",
                diff.transaction_id,
                diff.missing.len()
            );
            for pkg in &diff.missing {
                println!("    - {} {} ({})", pkg.action, pkg.descriptor(), pkg.repo);
            }
        }
        if !diff.extra.is_empty() {
            println!(
                "  ⚠ Transaction #{} has {} extra package(s) on server",
                diff.transaction_id,
                diff.extra.len()
            );
            for pkg in &diff.extra {
                println!("    + {} {}", pkg.action, pkg.descriptor());
            }
        }
    }

    for id in &report.skipped {
        println!("  ⚠ Transaction #{id} skipped: details unavailable");
    }

    let line = "=".repeat(60);
    println!("{line}");
    println!("VERIFICATION SUMMARY");
    println!("{line}");
    println!("Total local transactions:  {}", report.local_total);
    println!("Total server transactions: {}", report.remote_total);
    println!("Fully verified:            {}", report.fully_verified);
    println!("{}", "-".repeat(60));
    println!("Missing on server:         {}", report.missing_on_server.len());
    println!("With missing items:        {}", report.with_missing_items().len());
    println!("With extra items:          {}", report.with_extra_items().len());
    println!("{line}");

    if report.is_clean() {
        println!("\n✓ Data integrity verified successfully!");
    } else {
        println!("\n✗ Data integrity issues detected!");
        println!("Re-run 'txmirror sync' after clearing this host's data on the server.");
    }
}

/// Resolve the machine id a query command should ask about
fn query_machine_id(flag: Option<String>) -> Result<String> {
    match flag {
        Some(machine_id) => Ok(machine_id),
        None => Ok(host::machine_id()?),
    }
}

/// `txmirror transactions`: list transactions stored for a machine
pub fn list_transactions(config: &AgentConfig, machine_id: Option<String>) -> Result<()> {
    let machine_id = query_machine_id(machine_id)?;
    let ledger = HttpLedger::from_config(config)?;
    let transactions = ledger.list_transactions(&machine_id)?;

    println!();
    println!("* Machine ID  : {machine_id}");
    println!("* Transactions: {}", transactions.len());
    if transactions.is_empty() {
        return Ok(());
    }

    println!();
    println!("| ID | Begin | Actions | Altered | User | Return Code | Command Line |");
    println!("|----|-------|---------|---------|------|-------------|--------------|");
    for tx in &transactions {
        println!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            tx.transaction_id,
            tx.begin_time,
            tx.actions,
            tx.altered,
            tx.user,
            tx.return_code,
            tx.command_line
        );
    }

    Ok(())
}

/// `txmirror items`: show one stored transaction and its package items
pub fn show_items(
    config: &AgentConfig,
    machine_id: Option<String>,
    transaction_id: &str,
) -> Result<()> {
    // Validated up front even though the id only travels in a query string
    let transaction_id = validate_transaction_id(transaction_id)?;
    let machine_id = query_machine_id(machine_id)?;
    let ledger = HttpLedger::from_config(config)?;
    let tx = ledger.fetch_items(&machine_id, transaction_id)?;

    println!();
    println!("* Hostname       : {}", tx.hostname);
    println!("* Machine ID     : {machine_id}");
    println!("* Transaction ID : {}", tx.transaction_id);
    println!("* Begin Time     : {}", tx.begin_time);
    println!("* End Time       : {}", tx.end_time);
    println!("* User           : {}", tx.user);
    println!("* Return Code    : {}", tx.return_code);
    println!("* Command Line   : {}", tx.command_line);
    println!("* Items          : {}", tx.items.len());
    if tx.items.is_empty() {
        return Ok(());
    }

    println!();
    println!("| Action | Package | Version | Release | Epoch | Arch | Repo |");
    println!("|--------|---------|---------|---------|-------|------|------|");
    for item in &tx.items {
        println!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            item.action, item.name, item.version, item.release, item.epoch, item.arch, item.repo
        );
    }

    Ok(())
}

/// `txmirror machine-id`: list machine ids registered for a hostname
pub fn list_machine_ids(config: &AgentConfig, hostname: Option<String>) -> Result<()> {
    let hostname = match hostname {
        Some(hostname) => hostname,
        None => host::hostname()?,
    };
    let ledger = HttpLedger::from_config(config)?;
    let machines = ledger.list_machine_ids(&hostname)?;

    if machines.is_empty() {
        println!("No machine ids recorded for hostname {hostname}");
        return Ok(());
    }

    println!("| Hostname | Machine ID | Since |");
    println!("|----------|------------|-------|");
    for machine in &machines {
        println!(
            "| {} | {} | {} |",
            machine.hostname,
            machine.machine_id,
            machine.begin_time.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

/// `txmirror executions`: list recorded agent runs for a machine
pub fn list_executions(config: &AgentConfig, machine_id: Option<String>) -> Result<()> {
    let machine_id = query_machine_id(machine_id)?;
    let ledger = HttpLedger::from_config(config)?;
    let executions = ledger.list_executions(&machine_id)?;

    if executions.is_empty() {
        info!("no executions recorded for machine {machine_id}");
        println!("No executions recorded for machine {machine_id}");
        return Ok(());
    }

    println!("| Host | Success | Executed | Processed | Sent | Details |");
    println!("|------|---------|----------|-----------|------|---------|");
    for run in &executions {
        println!(
            "| {} | {} | {} | {} | {} | {} |",
            run.hostname,
            run.success,
            run.executed_at,
            run.transactions_processed,
            run.transactions_sent,
            run.details
        );
    }

    Ok(())
}
