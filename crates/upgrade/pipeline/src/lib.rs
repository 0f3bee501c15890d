//! Proposal evaluation pipeline.
//!
//! Takes a set of code bundles and governance scripts through a chain:
//!
//! 1. **Precheck**: check bundle archives and note which bundles the ledger
//!    already has
//! 2. **Funding**: top up the installer if fees would exceed its balance
//! 3. **Install**: install missing bundles and confirm each one
//! 4. **Submit**: submit the evals as one core-eval proposal
//! 5. **Vote**: deposit, vote yes and wait for a terminal status
//! 6. **Verify**: check vat incarnations once the proposal has passed
//!
//! Each stage is usable on its own ([`CostEstimator`], [`BundleInstaller`],
//! [`ProposalSubmitter`], [`VoteDriver`], [`IncarnationVerifier`]);
//! [`Pipeline`] runs them in order and tags failures with their [`Stage`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod config;
mod context;
pub mod cost;
pub mod entry;
mod error;
pub mod installer;
pub mod pipeline;
pub mod plan;
pub mod submitter;
pub mod verifier;
pub mod vote;

pub use config::PipelineConfig;
pub use context::ChainContext;
pub use cost::{CostEstimator, FundingOutcome};
pub use entry::{bundle_entry, check_bundle_entries, BundleEntry};
pub use error::{AtStage, PipelineError, PipelineResult, Stage, StageError};
pub use installer::BundleInstaller;
pub use pipeline::{IncarnationCheck, IncarnationExpectation, Pipeline, PipelineReport};
pub use plan::read_proposal_dir;
pub use submitter::{ProposalSubmission, ProposalSubmitter};
pub use verifier::{IncarnationSnapshot, IncarnationVerifier};
pub use vote::{VoteDriver, VoteDriverOptions, VoteOutcome};
