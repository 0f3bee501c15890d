use crate::bundle::BundleId;
use serde::{Deserialize, Serialize};

/// Outcome of one install pass over a set of bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    /// Bundles considered.
    pub todo: usize,
    /// Bundles present and verified when the pass ended.
    pub done: usize,
    /// Bundles skipped because the ledger already had them.
    pub already_installed: usize,
    /// Bundles installed by this pass, in order.
    pub installed: Vec<BundleId>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.todo == self.done
    }

    /// Fold another pass into this one.
    pub fn merge(&mut self, other: InstallReport) {
        self.todo += other.todo;
        self.done += other.done;
        self.already_installed += other.already_installed;
        self.installed.extend(other.installed);
    }
}
