// src/history/nevra.rs

//! Packed NEVRA descriptor decomposition
//!
//! dnf history reports print packages as packed descriptors of the form
//! `name-[epoch:]version-release.arch`, optionally with a trailing `.rpm`.
//! Splits are anchored from the right, so package names containing `-` are
//! handled correctly.

use crate::error::{Error, Result};

/// The Name-Epoch-Version-Release-Architecture identity of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nevra {
    pub name: String,
    /// Empty string when the descriptor carries no epoch
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl Nevra {
    /// Decompose a packed descriptor string.
    ///
    /// This is only ever fed strings the report parser already matched
    /// structurally, so missing separators are a contract violation and
    /// fail fast with [`Error::Parse`] rather than returning partial data.
    pub fn split(descriptor: &str) -> Result<Nevra> {
        let packed = descriptor.strip_suffix(".rpm").unwrap_or(descriptor);

        let arch_idx = packed
            .rfind('.')
            .ok_or_else(|| Error::Parse(format!("no architecture separator in '{descriptor}'")))?;
        let arch = &packed[arch_idx + 1..];

        let rel_idx = packed[..arch_idx]
            .rfind('-')
            .ok_or_else(|| Error::Parse(format!("no release separator in '{descriptor}'")))?;
        let release = &packed[rel_idx + 1..arch_idx];

        let ver_idx = packed[..rel_idx]
            .rfind('-')
            .ok_or_else(|| Error::Parse(format!("no version separator in '{descriptor}'")))?;
        let version = &packed[ver_idx + 1..rel_idx];

        // The epoch, when present, sits between the name and the version:
        // name-epoch:version-release.arch
        let epoch = match packed.find(':') {
            Some(colon_idx) if colon_idx > ver_idx && colon_idx < rel_idx => {
                &packed[ver_idx + 1..colon_idx]
            }
            _ => "",
        };

        Ok(Nevra {
            name: packed[..ver_idx].to_string(),
            epoch: epoch.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
        })
    }

    /// Reassemble the packed descriptor with the original separators
    pub fn descriptor(&self) -> String {
        format!("{}-{}-{}.{}", self.name, self.version, self.release, self.arch)
    }
}
