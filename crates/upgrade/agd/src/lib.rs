//! Write path and chain queries for upgrade evaluation.
//!
//! Everything that talks to a node goes through the traits in this crate:
//! - [`TxClient`] broadcasts a transaction and returns its [`TxResult`]
//! - [`QueryClient`] runs a query and returns JSON
//! - [`KeyLookup`] resolves a key name to an address
//! - [`Funder`] tops up an account
//! - [`Clock`] paces polling
//!
//! The subprocess implementations wrap the `agd`, `agops` and `agoric`
//! command-line tools. Tests substitute scripted fakes.
//!
//! [`TxResult`]: upgrade_types::TxResult

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod client;
mod clock;
mod error;
mod funding;
mod published;
mod traits;

pub use client::{parse_tx_output, AgdClient, AgdOptions};
pub use clock::{Clock, ManualClock, TokioClock};
pub use error::{AgdError, AgdResult};
pub use funding::{VaultFunder, VaultFunderOptions};
pub use published::decode_storage_value;
pub use traits::{Funder, KeyLookup, QueryClient, TxClient, TxOpts};
