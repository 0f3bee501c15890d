//! End-to-end run: precheck, fund, install, submit, vote, verify.

use crate::config::PipelineConfig;
use crate::context::ChainContext;
use crate::cost::{CostEstimator, FundingOutcome};
use crate::entry::check_bundle_entries;
use crate::error::{AtStage, Stage, StageError};
use crate::installer::BundleInstaller;
use crate::plan::total_bundle_bytes;
use crate::submitter::{ProposalSubmission, ProposalSubmitter};
use crate::verifier::{IncarnationSnapshot, IncarnationVerifier};
use crate::vote::{VoteDriver, VoteDriverOptions, VoteOutcome};
use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::Instrument;
use upgrade_types::{BundleId, InstallReport, ProposalBundle, ProposalMetadata};

/// Incarnation a vat should reach once the proposal has executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncarnationExpectation {
    /// This exact incarnation.
    Exact(u64),
    /// One more than before the run.
    AdvancedByOne,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncarnationCheck {
    pub vat_name: String,
    pub expectation: IncarnationExpectation,
}

impl IncarnationCheck {
    pub fn exact(vat_name: impl Into<String>, incarnation: u64) -> Self {
        Self {
            vat_name: vat_name.into(),
            expectation: IncarnationExpectation::Exact(incarnation),
        }
    }

    pub fn advanced(vat_name: impl Into<String>) -> Self {
        Self {
            vat_name: vat_name.into(),
            expectation: IncarnationExpectation::AdvancedByOne,
        }
    }
}

/// Everything a successful run did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Bundles the ledger lacked when the run started.
    pub missing_at_start: Vec<BundleId>,
    pub total_bytes: u64,
    pub funding: FundingOutcome,
    pub install: InstallReport,
    pub submission: ProposalSubmission,
    pub vote: VoteOutcome,
    /// Verified incarnations after the vote.
    pub incarnations: IncarnationSnapshot,
}

/// Drives one evaluation run over a set of proposals.
pub struct Pipeline {
    config: PipelineConfig,
    ctx: ChainContext,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, ctx: ChainContext) -> Self {
        Self { config, ctx }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cost_estimator(&self) -> CostEstimator {
        CostEstimator::new(
            self.ctx.query.clone(),
            self.ctx.keys.clone(),
            self.ctx.funder.clone(),
            self.config.funding.clone(),
        )
    }

    pub fn installer(&self) -> BundleInstaller {
        BundleInstaller::new(
            self.ctx.reader.clone(),
            self.ctx.tx.clone(),
            self.ctx.query.clone(),
            self.ctx.keys.clone(),
            self.config.accounts.installer.clone(),
            self.config.chain.chain_id.clone(),
        )
    }

    pub fn submitter(&self) -> ProposalSubmitter {
        ProposalSubmitter::new(
            self.ctx.reader.clone(),
            self.ctx.tx.clone(),
            self.ctx.keys.clone(),
            self.config.accounts.proposer.clone(),
            self.config.chain.chain_id.clone(),
            self.config.proposal.gas_adjustment.clone(),
        )
    }

    pub fn vote_driver(&self) -> VoteDriver {
        VoteDriver::new(
            self.ctx.query.clone(),
            self.ctx.tx.clone(),
            self.ctx.keys.clone(),
            self.ctx.clock.clone(),
            VoteDriverOptions {
                voter: self.config.accounts.proposer.clone(),
                chain_id: self.config.chain.chain_id.clone(),
                deposit: self.config.proposal.vote_deposit.clone(),
                block_interval: self.config.voting.block_interval(),
                max_polls: self.config.voting.max_polls,
            },
        )
    }

    pub fn verifier(&self) -> IncarnationVerifier {
        IncarnationVerifier::new(self.ctx.reader.clone())
    }

    /// Default title and description naming the proposals.
    pub fn metadata_for(&self, proposals: &[ProposalBundle]) -> ProposalMetadata {
        let names: Vec<&str> = proposals.iter().map(|p| p.name.as_str()).collect();
        let evals: usize = proposals.iter().map(|p| p.evals.len()).sum();
        let bundles: usize = proposals.iter().map(|p| p.bundles.len()).sum();
        ProposalMetadata {
            title: format!("Evaluate {}", names.join(", ")),
            description: format!("{evals} core eval(s) using {bundles} bundle(s)"),
            deposit: self.config.proposal.deposit.clone(),
        }
    }

    /// Run every stage in order, stopping at the first failure.
    ///
    /// Succeeds only if the proposal passed and every check holds.
    pub async fn run(
        &self,
        proposals: &[ProposalBundle],
        metadata: &ProposalMetadata,
        checks: &[IncarnationCheck],
    ) -> Result<PipelineReport, StageError> {
        let (missing_at_start, before) = self
            .precheck(proposals, checks)
            .instrument(tracing::info_span!("stage", stage = %Stage::Precheck))
            .await?;

        let (total_bytes, funding) = async {
            let total_bytes = total_bundle_bytes(proposals).await.at(Stage::Funding)?;
            let funding = self
                .cost_estimator()
                .ensure_funded(&self.config.accounts.installer, total_bytes)
                .await
                .at(Stage::Funding)?;
            Ok::<_, StageError>((total_bytes, funding))
        }
        .instrument(tracing::info_span!("stage", stage = %Stage::Funding))
        .await?;

        let install = self
            .installer()
            .install_all(proposals)
            .instrument(tracing::info_span!("stage", stage = %Stage::Install))
            .await
            .at(Stage::Install)?;

        let submission = self
            .submitter()
            .submit(proposals, metadata)
            .instrument(tracing::info_span!("stage", stage = %Stage::Submit))
            .await
            .at(Stage::Submit)?;

        let vote = async {
            let driver = self.vote_driver();
            let outcome = driver.vote_and_await().await.at(Stage::Vote)?;
            if let Some(submitted) = submission.proposal_id {
                if submitted != outcome.proposal.proposal_id {
                    tracing::warn!(
                        submitted,
                        voted = outcome.proposal.proposal_id,
                        "voted on a different proposal than the one submitted"
                    );
                }
            }
            if !outcome.passed() {
                return Err(StageError::new(
                    Stage::Vote,
                    PipelineError::ProposalNotPassed {
                        proposal_id: outcome.proposal.proposal_id,
                        status: outcome.proposal.status,
                    },
                ));
            }
            Ok::<_, StageError>(outcome)
        }
        .instrument(tracing::info_span!("stage", stage = %Stage::Vote))
        .await?;

        let incarnations = self
            .verify(checks, &before)
            .instrument(tracing::info_span!("stage", stage = %Stage::Verify))
            .await
            .at(Stage::Verify)?;

        tracing::info!(
            proposal_id = vote.proposal.proposal_id,
            installed = install.installed.len(),
            checks = incarnations.len(),
            "evaluation complete"
        );

        Ok(PipelineReport {
            missing_at_start,
            total_bytes,
            funding,
            install,
            submission,
            vote,
            incarnations,
        })
    }

    async fn precheck(
        &self,
        proposals: &[ProposalBundle],
        checks: &[IncarnationCheck],
    ) -> Result<(Vec<BundleId>, IncarnationSnapshot), StageError> {
        check_bundle_entries(proposals).await.at(Stage::Precheck)?;

        let loaded = self
            .ctx
            .reader
            .list_installed_bundle_ids()
            .await
            .at(Stage::Precheck)?;

        let mut seen = BTreeSet::new();
        let mut missing = Vec::new();
        for bundle in proposals.iter().flat_map(|p| p.bundles.iter()) {
            if !seen.insert(bundle.id.clone()) {
                continue;
            }
            if loaded.contains(&bundle.id) {
                tracing::info!(bundle_id = %bundle.id.short(), "bundle already loaded");
            } else {
                tracing::info!(bundle_id = %bundle.id.short(), size = bundle.size, "bundle not yet loaded");
                missing.push(bundle.id.clone());
            }
        }

        let advancing: Vec<String> = checks
            .iter()
            .filter(|c| c.expectation == IncarnationExpectation::AdvancedByOne)
            .map(|c| c.vat_name.clone())
            .collect();
        let before = self
            .verifier()
            .snapshot(&advancing)
            .await
            .at(Stage::Precheck)?;

        Ok((missing, before))
    }

    async fn verify(
        &self,
        checks: &[IncarnationCheck],
        before: &IncarnationSnapshot,
    ) -> Result<IncarnationSnapshot, PipelineError> {
        let verifier = self.verifier();
        let mut verified = IncarnationSnapshot::new();
        for check in checks {
            let expected = match check.expectation {
                IncarnationExpectation::Exact(n) => n,
                IncarnationExpectation::AdvancedByOne => {
                    let previous = before.get(&check.vat_name).copied().ok_or_else(|| {
                        PipelineError::NotFound(format!(
                            "no starting incarnation for {}",
                            check.vat_name
                        ))
                    })?;
                    previous + 1
                }
            };
            verifier.expect_incarnation(&check.vat_name, expected).await?;
            verified.insert(check.vat_name.clone(), expected);
        }
        Ok(verified)
    }
}
