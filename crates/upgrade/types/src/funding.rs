use serde::{Deserialize, Serialize};

/// Top-up computed when the installer cannot cover install fees.
///
/// `send_value` collateral (in base units) is sent to the installer, which
/// then opens a vault giving `give_collateral` to mint `want_minted`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MintPlan {
    pub want_minted: f64,
    pub give_collateral: f64,
    pub send_value: u64,
}
