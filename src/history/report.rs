// src/history/report.rs

//! Parsers for the two dnf history report shapes
//!
//! `dnf history list` produces a pipe-delimited table (one row per
//! transaction) and `dnf history info <id>` produces a `key : value` block
//! followed by an indented package table and optional scriptlet output.
//! Both reports are locale-formatted text; every timestamp that leaves this
//! module is normalized to RFC 3339.

use crate::error::{Error, Result};
use crate::history::{Nevra, PackageAction, PackageChange, TransactionDetail, TransactionSummary};
use chrono::{DateTime, Local, LocalResult, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// One `dnf history list` row: id | command line | date | actions | altered
static SUMMARY_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s*\|\s*(.*?)\s*\|\s*(.*?)\s*\|\s*(.*?)\s*\|\s*(.*?)\s*$").unwrap()
});

/// Package-change line ending in a single `@repository` token
static PACKAGE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(\w+)\s+(.+?)\s+@([^@\s]\S*)\s*$").unwrap());

/// Package-change line ending in a double `@@repository` token (upgraded pair)
static PACKAGE_UPGRADED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(\w+)\s+(.+?)\s+@@(\S+)\s*$").unwrap());

/// `key : value` metadata line; keys start at column zero, which keeps
/// indented scriptlet output containing colons out of this shape
static METADATA_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S.*?)\s*:\s*(.+)$").unwrap());

/// Datetime formats without a zone, in the order they are tried
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%a %d %b %Y %I:%M:%S %p",
    "%a %b %e %H:%M:%S %Y",
    "%d %b %Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Normalize a locale-formatted history timestamp to RFC 3339.
///
/// dnf prints timestamps in whatever format the host locale dictates; this
/// tries the known shapes and fails with [`Error::Parse`] if none fit.
/// Zone-less timestamps are interpreted as local time, matching what the
/// package manager itself displays.
pub fn normalize_datetime(text: &str) -> Result<String> {
    let trimmed = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    // C-locale output carries a trailing zone abbreviation ("... AM UTC")
    // that chrono cannot consume; split it off and handle UTC/GMT exactly.
    let (body, zone) = match trimmed.rsplit_once(' ') {
        Some((head, tail))
            if tail.len() <= 4 && tail.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            (head.trim(), Some(tail))
        }
        _ => (trimmed, None),
    };

    for candidate in [trimmed, body] {
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(candidate, format) {
                let normalized = match zone {
                    Some("UTC") | Some("GMT") if candidate == body => {
                        Utc.from_utc_datetime(&naive)
                            .to_rfc3339_opts(SecondsFormat::Secs, true)
                    }
                    _ => local_datetime(naive).to_rfc3339_opts(SecondsFormat::Secs, true),
                };
                return Ok(normalized);
            }
        }
    }

    Err(Error::Parse(format!("unsupported date format: '{trimmed}'")))
}

/// Resolve a naive local datetime, picking the earlier instant across DST
/// transitions and falling back to UTC for nonexistent times.
fn local_datetime(naive: NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => Utc.from_utc_datetime(&naive).with_timezone(&Local),
    }
}

/// Parse the `dnf history list` table into summary records.
///
/// The two header lines are skipped; remaining lines that do not match the
/// five-column row pattern (decorative separators, truncated rows) are
/// silently dropped. Rows come back in text order.
pub fn parse_summary_report(text: &str) -> Result<Vec<TransactionSummary>> {
    let mut summaries = Vec::new();

    for line in text.lines().skip(2) {
        let Some(caps) = SUMMARY_ROW.captures(line) else {
            continue;
        };

        let id: u64 = caps[1]
            .parse()
            .map_err(|_| Error::Parse(format!("transaction id out of range: '{}'", &caps[1])))?;

        summaries.push(TransactionSummary {
            id,
            command_line: caps[2].to_string(),
            timestamp: normalize_datetime(&caps[3])?,
            actions: caps[4].to_string(),
            altered: caps[5].to_string(),
        });
    }

    debug!("parsed {} summary rows", summaries.len());
    Ok(summaries)
}

/// Parse the `dnf history info <id>` report into a full transaction record.
///
/// Each line is matched against the known shapes in order: plain `@repo`
/// package line, `@@repo` upgraded-pair line, `key : value` metadata line,
/// and finally any line indented by at least two spaces is kept verbatim as
/// scriptlet output. Unrecognized metadata keys are ignored; an unparseable
/// date aborts the whole parse.
pub fn parse_detail_report(id: u64, text: &str) -> Result<TransactionDetail> {
    let mut detail = TransactionDetail {
        id,
        ..TransactionDetail::default()
    };

    for line in text.lines() {
        if let Some(caps) = PACKAGE_LINE.captures(line) {
            let mut change = package_change(&caps[1], &caps[2])?;
            change.repo = caps[3].to_string();
            detail.packages.push(change);
        } else if let Some(caps) = PACKAGE_UPGRADED_LINE.captures(line) {
            let mut change = package_change(&caps[1], &caps[2])?;
            change.from_repo = caps[3].to_string();
            detail.packages.push(change);
        } else if let Some(caps) = METADATA_LINE.captures(line) {
            apply_metadata(&mut detail, caps[1].trim(), caps[2].trim())?;
        } else if line.starts_with("  ") && !line.trim().is_empty() {
            detail.scriptlet_output.push(line.trim().to_string());
        }
    }

    debug!(
        "parsed detail for transaction {}: {} packages, {} scriptlet lines",
        id,
        detail.packages.len(),
        detail.scriptlet_output.len()
    );
    Ok(detail)
}

/// Build a [`PackageChange`] from an action token and a packed descriptor
fn package_change(action_token: &str, descriptor: &str) -> Result<PackageChange> {
    let nevra = Nevra::split(descriptor.trim())?;
    Ok(PackageChange {
        action: PackageAction::from_token(action_token),
        name: nevra.name,
        version: nevra.version,
        release: nevra.release,
        epoch: nevra.epoch,
        arch: nevra.arch,
        repo: String::new(),
        from_repo: String::new(),
    })
}

/// Populate one recognized metadata field; unknown keys are not an error
fn apply_metadata(detail: &mut TransactionDetail, key: &str, value: &str) -> Result<()> {
    match key {
        "Begin time" => detail.begin_time = normalize_datetime(value)?,
        // The end time may carry a trailing parenthesized duration,
        // e.g. "2024-01-15 10:24 (41 seconds)"
        "End time" => {
            let value = value.split(" (").next().unwrap_or(value);
            detail.end_time = normalize_datetime(value)?;
        }
        "User" => detail.user = value.to_string(),
        "Return-Code" => detail.return_code = value.to_string(),
        "Releasever" => detail.release_version = value.to_string(),
        "Command Line" => detail.command_line = value.to_string(),
        "Comment" => detail.comment = value.to_string(),
        _ => {}
    }
    Ok(())
}
