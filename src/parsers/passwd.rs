//! User registry scan (`/etc/passwd` format)

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::types::{AllowSet, Result, UserIdentity, UsertimeError};

pub const DEFAULT_PASSWD_PATH: &str = "/etc/passwd";

pub const DEFAULT_HOME_ROOT: &str = "/home";

/// The two registry fields the scan cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub home: PathBuf,
}

impl RegistryEntry {
    /// Parse `name:password:uid:gid:gecos:home:shell`.
    /// Comments, blank lines and lines with fewer than six fields yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        if line.trim().is_empty() || line.starts_with('#') {
            return None;
        }
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 6 {
            return None;
        }
        Some(Self {
            name: fields[0].to_string(),
            home: PathBuf::from(fields[5]),
        })
    }

    /// Home directory exists and lies under one of `home_roots`
    pub fn has_live_home(&self, home_roots: &[PathBuf]) -> bool {
        home_roots.iter().any(|root| self.home.starts_with(root)) && self.home.is_dir()
    }
}

/// Build the allow set from a registry file.
///
/// Accounts are included when their home directory exists under a home root;
/// names are truncated to eight characters on the way in.
pub fn scan_registry(passwd: &Path, home_roots: &[PathBuf]) -> Result<AllowSet> {
    let content = std::fs::read_to_string(passwd)
        .map_err(|e| UsertimeError::Registry(format!("{}: {}", passwd.display(), e)))?;

    let mut identities = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let Some(entry) = RegistryEntry::parse_line(line) else {
            if !line.trim().is_empty() && !line.starts_with('#') {
                warn!(
                    "Skipping malformed registry line {} in {}",
                    idx + 1,
                    passwd.display()
                );
            }
            continue;
        };

        if !entry.has_live_home(home_roots) {
            continue;
        }

        match UserIdentity::new(&entry.name) {
            Some(identity) => {
                info!(
                    user = %identity,
                    home = %entry.home.display(),
                    "Adding user with existing home directory"
                );
                identities.push(identity);
            }
            None => warn!(line = idx + 1, "Skipping registry entry with empty name"),
        }
    }

    Ok(identities.into_iter().collect())
}
