//! Post-vote incarnation checks.

use crate::{PipelineError, PipelineResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use upgrade_ledger::StateReader;
use upgrade_types::VatDetails;

/// Incarnations by vat name.
pub type IncarnationSnapshot = BTreeMap<String, u64>;

/// Confirms that vats restarted the expected number of times.
pub struct IncarnationVerifier {
    reader: Arc<dyn StateReader>,
}

impl IncarnationVerifier {
    pub fn new(reader: Arc<dyn StateReader>) -> Self {
        Self { reader }
    }

    pub async fn details(&self, vat_name: &str) -> PipelineResult<VatDetails> {
        Ok(self.reader.vat_details(vat_name).await?)
    }

    /// Fail unless `vat_name` is at incarnation `expected`.
    pub async fn expect_incarnation(&self, vat_name: &str, expected: u64) -> PipelineResult<()> {
        let details = self.details(vat_name).await?;
        tracing::info!(
            vat_name = %vat_name,
            vat_id = %details.vat_id,
            incarnation = details.incarnation,
            bundle_id = ?details.bundle_id,
            "checked incarnation"
        );
        if details.incarnation != expected {
            return Err(PipelineError::IncarnationMismatch {
                vat_name: vat_name.to_string(),
                expected,
                actual: details.incarnation,
            });
        }
        Ok(())
    }

    /// Current incarnation of each named vat.
    pub async fn snapshot(&self, vat_names: &[String]) -> PipelineResult<IncarnationSnapshot> {
        let mut snapshot = IncarnationSnapshot::new();
        for name in vat_names {
            let incarnation = self.reader.current_incarnation(name).await?;
            snapshot.insert(name.clone(), incarnation);
        }
        Ok(snapshot)
    }

    /// Fail unless every vat in `before` advanced by exactly one.
    pub async fn expect_advanced(&self, before: &IncarnationSnapshot) -> PipelineResult<IncarnationSnapshot> {
        let mut after = IncarnationSnapshot::new();
        for (name, previous) in before {
            self.expect_incarnation(name, previous + 1).await?;
            after.insert(name.clone(), previous + 1);
        }
        Ok(after)
    }
}
