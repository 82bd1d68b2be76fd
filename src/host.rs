// src/host.rs

//! Host identity and environment discovery
//!
//! Machine id, hostname, the parsed os-release descriptor, and the dnf/yum
//! binary selection. Everything here is read once at the start of a run and
//! passed explicitly; there is no process-wide mutable state.

use crate::error::{Error, Result};
use std::process::Command;
use tracing::debug;

/// The identity a host presents to the ledger server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    /// Contents of /etc/machine-id, trimmed
    pub machine_id: String,
    pub hostname: String,
}

impl HostIdentity {
    /// Discover this host's identity
    pub fn discover() -> Result<HostIdentity> {
        Ok(HostIdentity {
            machine_id: machine_id()?,
            hostname: hostname()?,
        })
    }
}

/// Read the unique machine identifier from /etc/machine-id
pub fn machine_id() -> Result<String> {
    let data = std::fs::read_to_string("/etc/machine-id")
        .map_err(|e| Error::Io(format!("failed to read /etc/machine-id: {e}")))?;
    Ok(data.trim().to_string())
}

/// Read the system hostname
pub fn hostname() -> Result<String> {
    let data = std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map_err(|e| Error::Io(format!("failed to read hostname: {e}")))?;
    Ok(data.trim().to_string())
}

/// Parsed /etc/os-release descriptor
///
/// Only the fields the agent actually consumes; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub name: String,
    pub id: String,
    pub version_id: String,
    pub pretty_name: String,
}

impl OsRelease {
    /// Parse os-release text (`KEY=value`, values optionally quoted)
    pub fn parse(text: &str) -> OsRelease {
        let mut release = OsRelease::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim_matches(|c| c == '"' || c == '\'').to_string();
            match key {
                "NAME" => release.name = value,
                "ID" => release.id = value,
                "VERSION_ID" => release.version_id = value,
                "PRETTY_NAME" => release.pretty_name = value,
                _ => {}
            }
        }

        release
    }

    /// Load and parse /etc/os-release; missing file yields an empty descriptor
    pub fn load() -> OsRelease {
        match std::fs::read_to_string("/etc/os-release") {
            Ok(text) => OsRelease::parse(&text),
            Err(_) => OsRelease::default(),
        }
    }

    /// Major version as an integer, when VERSION_ID is numeric
    pub fn major_version(&self) -> Option<u32> {
        self.version_id.split('.').next()?.parse().ok()
    }
}

/// Select the package manager binary for this host.
///
/// EL8 and newer ship dnf; anything older (or an unreadable os-release)
/// falls back to yum. The selected binary must exist on PATH.
pub fn package_binary(release: &OsRelease) -> Result<String> {
    let binary = match release.major_version() {
        Some(major) if major >= 8 => "dnf",
        _ => "yum",
    };

    which::which(binary)
        .map_err(|_| Error::LocalSource(format!("{binary} is not installed")))?;

    debug!("selected package manager binary: {binary}");
    Ok(binary.to_string())
}

/// Ask the package manager whether the host needs a reboot.
///
/// `needs-restarting -r` exits non-zero when a reboot is advised, but its
/// exit code is also non-zero when the plugin is missing, so the combined
/// output is checked for the known no-reboot phrase instead.
pub fn needs_restarting(binary: &str) -> bool {
    let Ok(output) = Command::new(binary).args(["needs-restarting", "-r"]).output() else {
        return false;
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    !combined.contains("Reboot should not be necessary")
}

#[cfg(test)]
mod tests {
    use super::*;

    const OS_RELEASE_EL9: &str = r#"
NAME="AlmaLinux"
VERSION="9.3 (Shamrock Pampas Cat)"
ID="almalinux"
# comment line
VERSION_ID="9.3"
PRETTY_NAME="AlmaLinux 9.3 (Shamrock Pampas Cat)"
ANSI_COLOR="0;34"
"#;

    #[test]
    fn test_parse_os_release() {
        let release = OsRelease::parse(OS_RELEASE_EL9);
        assert_eq!(release.name, "AlmaLinux");
        assert_eq!(release.id, "almalinux");
        assert_eq!(release.version_id, "9.3");
        assert_eq!(release.pretty_name, "AlmaLinux 9.3 (Shamrock Pampas Cat)");
        assert_eq!(release.major_version(), Some(9));
    }

    #[test]
    fn test_parse_os_release_unquoted_values() {
        let release = OsRelease::parse("ID=fedora\nVERSION_ID=39\n");
        assert_eq!(release.id, "fedora");
        assert_eq!(release.major_version(), Some(39));
    }

    #[test]
    fn test_major_version_non_numeric() {
        let release = OsRelease::parse("VERSION_ID=rolling\n");
        assert_eq!(release.major_version(), None);
    }
}
