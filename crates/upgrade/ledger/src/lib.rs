//! Read path for upgrade evaluation.
//!
//! The kernel database of a running node (the swingstore) mirrors what is
//! installed on chain. This crate exposes it through a read-only contract:
//! - which bundles are installed (`bundles` table)
//! - raw kernel key-value entries (`kvStore`)
//! - the current incarnation of a named vat (`transcriptSpans`)
//!
//! Design stance:
//! - The snapshot is opened read-only; nothing here writes.
//! - Nothing is cached across calls. Other actors may change chain state at
//!   any time, so every query reads the store again.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
mod traits;

pub use error::{LedgerError, LedgerResult};
pub use memory::InMemoryStateReader;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStateReader;
pub use traits::{StateReader, VAT_DYNAMIC_IDS_KEY};
