//! Code bundles and the proposals that reference them.

use crate::error::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Prefix shared by every bundle id and bundle file name.
pub const BUNDLE_PREFIX: &str = "b1-";

const BUNDLE_SUFFIX: &str = ".json";

/// Content-hash identifier of an installed bundle (`b1-<hex digest>`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(String);

impl BundleId {
    /// Build an id from a hex digest.
    pub fn from_digest(digest: &str) -> Self {
        Self(format!("{BUNDLE_PREFIX}{digest}"))
    }

    /// Wrap a raw id as read from the ledger.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digest part of the id, if it carries the bundle prefix.
    pub fn digest(&self) -> Option<&str> {
        self.0.strip_prefix(BUNDLE_PREFIX)
    }

    /// Short form for log lines, e.g. `b1-12345`.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(BUNDLE_PREFIX.len() + 5)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BundleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A content-addressed code archive ready for installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBundle {
    pub id: BundleId,
    /// Base file name, `b1-<digest>.json`.
    pub file_name: String,
    /// Hex SHA-512 of the zipped archive (`endoZipBase64Sha512` on chain).
    pub digest: String,
    /// Size of the bundle file in bytes.
    pub size: u64,
    /// Location of the bundle file on disk.
    pub path: PathBuf,
}

impl CodeBundle {
    /// Parse a bundle from its file name. Any leading directories are dropped;
    /// the file is assumed to live next to the name as given.
    pub fn from_file_name(name: &str) -> TypesResult<Self> {
        let path = PathBuf::from(name);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TypesError::InvalidBundleName(name.to_string()))?
            .to_string();

        let digest = file_name
            .strip_prefix(BUNDLE_PREFIX)
            .and_then(|rest| rest.strip_suffix(BUNDLE_SUFFIX))
            .filter(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| TypesError::InvalidBundleName(name.to_string()))?
            .to_string();

        Ok(Self {
            id: BundleId::from_digest(&digest),
            file_name,
            digest,
            size: 0,
            path,
        })
    }

    /// Resolve the bundle inside `dir`, recording its size.
    pub fn located_in(mut self, dir: &Path, size: u64) -> Self {
        self.path = dir.join(&self.file_name);
        self.size = size;
        self
    }
}

/// One governance-script invocation: a permit and the script it authorizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalSpec {
    pub permit: PathBuf,
    pub script: PathBuf,
}

impl EvalSpec {
    pub fn new(permit: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            permit: permit.into(),
            script: script.into(),
        }
    }

    /// Conventional pair for a script named `name`: `{name}-permit.json`, `{name}.js`.
    pub fn named(name: &str) -> Self {
        Self::new(format!("{name}-permit.json"), format!("{name}.js"))
    }
}

/// Evals and bundles submitted together as one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalBundle {
    pub name: String,
    /// Directory the eval and bundle files are resolved against.
    pub dir: PathBuf,
    pub evals: Vec<EvalSpec>,
    pub bundles: Vec<CodeBundle>,
}

impl ProposalBundle {
    /// Eval file paths in submission order: permit then script, per eval.
    pub fn eval_paths(&self) -> Vec<PathBuf> {
        self.evals
            .iter()
            .flat_map(|e| [&e.permit, &e.script])
            .map(|file| self.dir.join(file))
            .collect()
    }
}
