//! Core types for upgrade proposal evaluation.
//!
//! This crate holds the data model shared by the ledger reader, the chain
//! command clients and the evaluation pipeline:
//! - code bundles and the `b1-<digest>.json` naming convention
//! - eval specs and proposal bundles (one governance proposal each)
//! - proposal records and their status state machine
//! - transaction results with an explicit success discriminant
//! - vat incarnation details and install reports

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod bundle;
mod error;
mod funding;
mod proposal;
mod report;
mod tx;
mod vat;

pub use bundle::{BundleId, CodeBundle, EvalSpec, ProposalBundle, BUNDLE_PREFIX};
pub use error::{TypesError, TypesResult};
pub use funding::MintPlan;
pub use proposal::{ProposalMetadata, ProposalRecord, ProposalStatus};
pub use report::InstallReport;
pub use tx::{PublishedBundleInfo, TxAbbr, TxAttribute, TxEvent, TxResult};
pub use vat::VatDetails;
