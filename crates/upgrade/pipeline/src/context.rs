//! Collaborators shared by the pipeline stages.

use std::sync::Arc;
use upgrade_agd::{Clock, Funder, KeyLookup, QueryClient, TxClient};
use upgrade_ledger::StateReader;

/// Every external dependency of a run, injected.
#[derive(Clone)]
pub struct ChainContext {
    pub reader: Arc<dyn StateReader>,
    pub tx: Arc<dyn TxClient>,
    pub query: Arc<dyn QueryClient>,
    pub keys: Arc<dyn KeyLookup>,
    pub funder: Arc<dyn Funder>,
    pub clock: Arc<dyn Clock>,
}
