//! Launch configuration fingerprints used to detect drift.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, fs, io::ErrorKind, path::Path};

use crate::error::{LedgerError, ResolveError};

/// Ordered identity of a daemon's launch configuration:
/// `[run_dir, exe_path, args...]`, all resolved and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecKey(Vec<String>);

impl ExecKey {
    /// Builds a key from resolved components.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            parts
                .into_iter()
                .map(|part| part.as_ref().trim().to_string())
                .collect(),
        )
    }

    /// Components of the key.
    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// SHA-256 hex digest of the key, stable across processes.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for part in &self.0 {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Last recorded [`ExecKey`] per daemon `full_name`.
///
/// A reconciler compares a daemon's current key with the recorded one to
/// decide whether the running instance must be stopped and replaced.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct KeyLedger {
    keys: HashMap<String, ExecKey>,
}

impl KeyLedger {
    /// Loads a ledger from `path`; a missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the ledger to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Key recorded for `full_name`.
    pub fn get(&self, full_name: &str) -> Option<&ExecKey> {
        self.keys.get(full_name)
    }

    /// Records `key` for `full_name`, returning the previous key.
    pub fn record(&mut self, full_name: &str, key: ExecKey) -> Option<ExecKey> {
        self.keys.insert(full_name.to_string(), key)
    }

    /// Whether `key` differs from the key recorded for `full_name`.
    /// Returns false when nothing was recorded yet.
    pub fn changed(&self, full_name: &str, key: &ExecKey) -> bool {
        self.keys
            .get(full_name)
            .is_some_and(|recorded| recorded != key)
    }

    /// Forgets `full_name`.
    pub fn remove(&mut self, full_name: &str) -> Option<ExecKey> {
        self.keys.remove(full_name)
    }
}

/// Resolves a path to an absolute one without touching the filesystem.
pub(crate) fn absolute(path: &Path) -> Result<String, ResolveError> {
    let absolute = std::path::absolute(path)?;
    Ok(absolute.to_string_lossy().into_owned())
}
