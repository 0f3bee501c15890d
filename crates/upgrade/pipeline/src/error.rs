//! Pipeline error types

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use upgrade_agd::AgdError;
use upgrade_ledger::LedgerError;
use upgrade_types::{BundleId, ProposalStatus, TxAbbr, TypesError};

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Install of {bundle_id} rejected: {tx}: {raw_log}")]
    InstallFailed {
        bundle_id: BundleId,
        tx: TxAbbr,
        raw_log: String,
    },

    #[error("Install of {bundle_id} not confirmed: {reason}")]
    VerificationFailed { bundle_id: BundleId, reason: String },

    #[error("Bundle {bundle_id} is not loaded in the ledger")]
    BundleNotLoaded { bundle_id: BundleId },

    #[error("Proposal submission rejected: {tx}: {raw_log}")]
    SubmissionFailed { tx: TxAbbr, raw_log: String },

    #[error("{action} on proposal {proposal_id} rejected: {tx}: {raw_log}")]
    VoteFailed {
        proposal_id: u64,
        action: &'static str,
        tx: TxAbbr,
        raw_log: String,
    },

    #[error("No open proposal to vote on")]
    NoOpenProposal,

    #[error("Proposal {proposal_id} still {last_status} after {tries_exhausted} polls")]
    Timeout {
        proposal_id: u64,
        tries_exhausted: u32,
        last_status: ProposalStatus,
    },

    #[error("Proposal {proposal_id} ended {status}")]
    ProposalNotPassed {
        proposal_id: u64,
        status: ProposalStatus,
    },

    #[error("Vat {vat_name} at incarnation {actual}, expected {expected}")]
    IncarnationMismatch {
        vat_name: String,
        expected: u64,
        actual: u64,
    },

    #[error("Funding failed: {0}")]
    FundingFailed(String),

    #[error("Bundle {bundle_id} is not installable: {reason}")]
    InvalidBundle { bundle_id: BundleId, reason: String },

    #[error("Invalid plan {}: {reason}", .path.display())]
    InvalidPlan { path: PathBuf, reason: String },

    #[error("Nothing to submit: {0}")]
    NothingToSubmit(String),

    #[error("Ledger error: {0}")]
    Ledger(#[source] LedgerError),

    #[error("Chain error: {0}")]
    Chain(#[from] AgdError),

    #[error("{0}")]
    Types(#[from] TypesError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<LedgerError> for PipelineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(what) => PipelineError::NotFound(what),
            other => PipelineError::Ledger(other),
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::Config(err.to_string())
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Precheck,
    Funding,
    Install,
    Submit,
    Vote,
    Verify,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Precheck => "precheck",
            Stage::Funding => "funding",
            Stage::Install => "install",
            Stage::Submit => "submit",
            Stage::Vote => "vote",
            Stage::Verify => "verify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline error tagged with the stage that raised it.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

impl StageError {
    pub fn new(stage: Stage, source: PipelineError) -> Self {
        Self { stage, source }
    }
}

/// Tag a fallible step with its stage.
pub trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E: Into<PipelineError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError::new(stage, e.into()))
    }
}
