use crate::published::decode_storage_value;
use crate::AgdResult;
use async_trait::async_trait;
use serde_json::Value;
use upgrade_types::{MintPlan, TxResult};

/// Signing and routing options for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOpts {
    /// Sender address.
    pub from: String,
    pub chain_id: String,
    /// Skip the interactive confirmation.
    pub yes: bool,
}

impl TxOpts {
    pub fn new(from: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            chain_id: chain_id.into(),
            yes: true,
        }
    }
}

/// Broadcasts transactions.
///
/// A returned `TxResult` may still carry a non-zero code; callers check
/// [`TxResult::is_success`]. `Err` means the command itself failed.
#[async_trait]
pub trait TxClient: Send + Sync {
    /// `args` is the action and its parameters, e.g.
    /// `["swingset", "install-bundle", "@b1-abc.json"]`.
    async fn tx(&self, args: &[String], opts: &TxOpts) -> AgdResult<TxResult>;
}

/// Runs read-only chain queries.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// `args` is the query path, e.g. `["gov", "proposal", "12"]`.
    async fn query(&self, args: &[String]) -> AgdResult<Value>;

    /// Latest value published at a chain storage path, with the stream cell
    /// and capdata framing removed.
    async fn storage_value(&self, path: &str) -> AgdResult<Value> {
        let raw = self
            .query(&["vstorage".to_string(), "data".to_string(), path.to_string()])
            .await?;
        decode_storage_value(&raw)
    }
}

/// Resolves key names to addresses.
#[async_trait]
pub trait KeyLookup: Send + Sync {
    async fn lookup(&self, name: &str) -> AgdResult<String>;
}

/// Performs a funding operation for an address.
///
/// Not idempotent: every call mints once.
#[async_trait]
pub trait Funder: Send + Sync {
    async fn mint(&self, address: &str, plan: &MintPlan) -> AgdResult<()>;
}
