//! In-memory reference implementation of [`StateReader`].
//!
//! Deterministic and test-friendly. It also backs dry runs where no node
//! database is available. The mutators stand in for the chain: this system
//! never writes to a real ledger.

use crate::traits::{StateReader, VAT_DYNAMIC_IDS_KEY};
use crate::{LedgerError, LedgerResult};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use upgrade_types::BundleId;

#[derive(Default)]
pub struct InMemoryStateReader {
    bundles: RwLock<BTreeSet<BundleId>>,
    kv: RwLock<HashMap<String, String>>,
    spans: RwLock<HashMap<String, u64>>,
}

impl InMemoryStateReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bundle as installed. Returns false if it already was.
    pub fn insert_bundle(&self, id: BundleId) -> LedgerResult<bool> {
        let mut guard = self
            .bundles
            .write()
            .map_err(|_| LedgerError::Backend("bundles lock poisoned".to_string()))?;
        Ok(guard.insert(id))
    }

    pub fn set_kv(&self, key: impl Into<String>, value: impl Into<String>) -> LedgerResult<()> {
        let mut guard = self
            .kv
            .write()
            .map_err(|_| LedgerError::Backend("kv lock poisoned".to_string()))?;
        guard.insert(key.into(), value.into());
        Ok(())
    }

    /// Register a dynamic vat with its options name, source bundle and
    /// current incarnation.
    pub fn add_vat(
        &self,
        vat_id: &str,
        name: &str,
        bundle_id: &str,
        incarnation: u64,
    ) -> LedgerResult<()> {
        let mut ids: Vec<String> = match self.kv_get_sync(VAT_DYNAMIC_IDS_KEY) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| LedgerError::Decode(format!("{VAT_DYNAMIC_IDS_KEY}: {e}")))?,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        if !ids.iter().any(|id| id == vat_id) {
            ids.push(vat_id.to_string());
        }
        let encode = |v: serde_json::Value| {
            serde_json::to_string(&v).map_err(|e| LedgerError::Decode(e.to_string()))
        };

        self.set_kv(VAT_DYNAMIC_IDS_KEY, encode(serde_json::json!(ids))?)?;
        self.set_kv(
            format!("{vat_id}.options"),
            encode(serde_json::json!({ "name": name }))?,
        )?;
        self.set_kv(
            format!("{vat_id}.source"),
            encode(serde_json::json!({ "bundleID": bundle_id }))?,
        )?;
        self.set_span(vat_id, incarnation)
    }

    /// Swap a vat's code: point its source at `bundle_id` and start the next
    /// incarnation.
    pub fn upgrade_vat(&self, vat_id: &str, bundle_id: &str) -> LedgerResult<u64> {
        let next = {
            let guard = self
                .spans
                .read()
                .map_err(|_| LedgerError::Backend("spans lock poisoned".to_string()))?;
            guard
                .get(vat_id)
                .copied()
                .ok_or_else(|| LedgerError::NotFound(format!("vat {vat_id} has no span")))?
                + 1
        };
        self.set_kv(
            format!("{vat_id}.source"),
            serde_json::json!({ "bundleID": bundle_id }).to_string(),
        )?;
        self.set_span(vat_id, next)?;
        Ok(next)
    }

    fn set_span(&self, vat_id: &str, incarnation: u64) -> LedgerResult<()> {
        let mut guard = self
            .spans
            .write()
            .map_err(|_| LedgerError::Backend("spans lock poisoned".to_string()))?;
        guard.insert(vat_id.to_string(), incarnation);
        Ok(())
    }

    fn kv_get_sync(&self, key: &str) -> LedgerResult<String> {
        let guard = self
            .kv
            .read()
            .map_err(|_| LedgerError::Backend("kv lock poisoned".to_string()))?;
        guard
            .get(key)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("kvStore key {key}")))
    }
}

#[async_trait]
impl StateReader for InMemoryStateReader {
    async fn list_installed_bundle_ids(&self) -> LedgerResult<BTreeSet<BundleId>> {
        let guard = self
            .bundles
            .read()
            .map_err(|_| LedgerError::Backend("bundles lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    async fn kv_get(&self, key: &str) -> LedgerResult<String> {
        self.kv_get_sync(key)
    }

    async fn current_span_incarnation(&self, vat_id: &str) -> LedgerResult<u64> {
        let guard = self
            .spans
            .read()
            .map_err(|_| LedgerError::Backend("spans lock poisoned".to_string()))?;
        guard
            .get(vat_id)
            .copied()
            .ok_or_else(|| LedgerError::NotFound(format!("no current transcript span for {vat_id}")))
    }
}
