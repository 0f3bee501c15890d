use serde::{Deserialize, Serialize};

/// Where a named vat currently stands in the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatDetails {
    /// Name that was looked up, e.g. `vaultFactory`.
    pub vat_name: String,
    /// Kernel id, e.g. `v43`.
    pub vat_id: String,
    /// Incarnation of the current transcript span.
    pub incarnation: u64,
    /// Bundle the vat was last started from, when recorded.
    pub bundle_id: Option<String>,
}
