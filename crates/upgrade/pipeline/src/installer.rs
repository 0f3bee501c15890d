//! Bundle installation with post-install confirmation.

use crate::{PipelineError, PipelineResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use upgrade_agd::{KeyLookup, QueryClient, TxClient, TxOpts};
use upgrade_ledger::StateReader;
use upgrade_types::{BundleId, CodeBundle, InstallReport, ProposalBundle, PublishedBundleInfo};

/// Root storage key holding the latest install status. Not under `published.`.
pub const BUNDLES_PATH: &str = "bundles";

/// Installs bundles the ledger does not have yet, one at a time.
pub struct BundleInstaller {
    reader: Arc<dyn StateReader>,
    tx: Arc<dyn TxClient>,
    query: Arc<dyn QueryClient>,
    keys: Arc<dyn KeyLookup>,
    installer: String,
    chain_id: String,
}

impl BundleInstaller {
    pub fn new(
        reader: Arc<dyn StateReader>,
        tx: Arc<dyn TxClient>,
        query: Arc<dyn QueryClient>,
        keys: Arc<dyn KeyLookup>,
        installer: impl Into<String>,
        chain_id: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            tx,
            query,
            keys,
            installer: installer.into(),
            chain_id: chain_id.into(),
        }
    }

    /// Install every bundle in `bundles` that is not already in the ledger.
    ///
    /// Bundles are installed in order and each is confirmed before the next
    /// is sent. Re-running over the same list sends no transactions.
    pub async fn install_missing(&self, bundles: &[CodeBundle]) -> PipelineResult<InstallReport> {
        let mut loaded: BTreeSet<BundleId> = self.reader.list_installed_bundle_ids().await?;
        let mut report = InstallReport {
            todo: bundles.len(),
            ..InstallReport::default()
        };
        let mut from: Option<String> = None;

        for bundle in bundles {
            if loaded.contains(&bundle.id) {
                tracing::info!(bundle_id = %bundle.id.short(), "bundle already installed");
                report.already_installed += 1;
                report.done += 1;
                continue;
            }

            let address = match &from {
                Some(address) => address.clone(),
                None => {
                    let address = self.keys.lookup(&self.installer).await?;
                    from = Some(address.clone());
                    address
                }
            };

            self.install_one(bundle, &address).await?;
            self.confirm(bundle).await?;

            loaded.insert(bundle.id.clone());
            report.installed.push(bundle.id.clone());
            report.done += 1;
        }

        debug_assert!(report.is_complete());
        tracing::info!(
            todo = report.todo,
            done = report.done,
            already_installed = report.already_installed,
            "install pass finished"
        );
        Ok(report)
    }

    /// Install the bundles of every proposal, in proposal order.
    pub async fn install_all(&self, proposals: &[ProposalBundle]) -> PipelineResult<InstallReport> {
        let mut report = InstallReport::default();
        for proposal in proposals {
            tracing::debug!(proposal = %proposal.name, bundles = proposal.bundles.len(), "installing proposal bundles");
            report.merge(self.install_missing(&proposal.bundles).await?);
        }
        Ok(report)
    }

    async fn install_one(&self, bundle: &CodeBundle, from: &str) -> PipelineResult<()> {
        let action = vec![
            "swingset".to_string(),
            "install-bundle".to_string(),
            format!("@{}", bundle.path.display()),
            "--gas".to_string(),
            "auto".to_string(),
        ];
        tracing::info!(
            bundle_id = %bundle.id.short(),
            size = bundle.size,
            "installing bundle"
        );

        let result = self
            .tx
            .tx(&action, &TxOpts::new(from, self.chain_id.clone()))
            .await?;
        if !result.is_success() {
            return Err(PipelineError::InstallFailed {
                bundle_id: bundle.id.clone(),
                tx: result.abbr(),
                raw_log: result.raw_log,
            });
        }
        tracing::info!(bundle_id = %bundle.id.short(), tx = %result.abbr(), "install accepted");
        Ok(())
    }

    /// An install only counts once the chain reports it and the ledger has it.
    async fn confirm(&self, bundle: &CodeBundle) -> PipelineResult<()> {
        let raw = self.query.storage_value(BUNDLES_PATH).await?;
        let info: PublishedBundleInfo =
            serde_json::from_value(raw).map_err(|e| PipelineError::VerificationFailed {
                bundle_id: bundle.id.clone(),
                reason: format!("install status: {e}"),
            })?;

        if !info.confirms(&bundle.digest) {
            let reason = match &info.error {
                Some(error) => format!("chain reported error: {error}"),
                None if info.endo_zip_base64_sha512 != bundle.digest => format!(
                    "latest install is {}, not this bundle",
                    info.endo_zip_base64_sha512
                ),
                None => "chain reports it not installed".to_string(),
            };
            return Err(PipelineError::VerificationFailed {
                bundle_id: bundle.id.clone(),
                reason,
            });
        }

        if !self.reader.is_installed(&bundle.id).await? {
            return Err(PipelineError::VerificationFailed {
                bundle_id: bundle.id.clone(),
                reason: "missing from ledger after install".to_string(),
            });
        }
        Ok(())
    }
}
