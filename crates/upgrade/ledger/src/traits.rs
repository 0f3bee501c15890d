use crate::{LedgerError, LedgerResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use upgrade_types::{BundleId, VatDetails};

/// Kernel key listing the ids of dynamically created vats.
pub const VAT_DYNAMIC_IDS_KEY: &str = "vat.dynamicIDs";

/// Point-in-time, read-only view of installed code and vat state.
///
/// Backends implement the three primitive reads; name resolution and
/// incarnation lookup are shared.
#[async_trait]
pub trait StateReader: Send + Sync {
    /// Ids of every bundle present in the ledger.
    async fn list_installed_bundle_ids(&self) -> LedgerResult<BTreeSet<BundleId>>;

    /// Raw kernel entry stored under `key`.
    async fn kv_get(&self, key: &str) -> LedgerResult<String>;

    /// Incarnation of the active transcript span of `vat_id`.
    async fn current_span_incarnation(&self, vat_id: &str) -> LedgerResult<u64>;

    async fn is_installed(&self, id: &BundleId) -> LedgerResult<bool> {
        Ok(self.list_installed_bundle_ids().await?.contains(id))
    }

    async fn kv_get_json(&self, key: &str) -> LedgerResult<Value> {
        let raw = self.kv_get(key).await?;
        serde_json::from_str(&raw).map_err(|e| LedgerError::Decode(format!("{key}: {e}")))
    }

    /// Resolve a vat name to its kernel id.
    ///
    /// Matches the first dynamic vat whose configured name contains
    /// `vat_name`, so `vaultFactory` finds `zcf-b1-...-vaultFactory`.
    async fn find_vat(&self, vat_name: &str) -> LedgerResult<String> {
        let ids: Vec<String> = serde_json::from_value(self.kv_get_json(VAT_DYNAMIC_IDS_KEY).await?)
            .map_err(|e| LedgerError::Decode(format!("{VAT_DYNAMIC_IDS_KEY}: {e}")))?;

        for vat_id in ids {
            let options = match self.kv_get_json(&format!("{vat_id}.options")).await {
                Ok(options) => options,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            let matches = options
                .get("name")
                .and_then(Value::as_str)
                .map(|name| name.contains(vat_name))
                .unwrap_or(false);
            if matches {
                return Ok(vat_id);
            }
        }

        Err(LedgerError::NotFound(format!("vat not found: {vat_name}")))
    }

    async fn vat_details(&self, vat_name: &str) -> LedgerResult<VatDetails> {
        let vat_id = self.find_vat(vat_name).await?;
        let incarnation = self.current_span_incarnation(&vat_id).await?;
        let bundle_id = match self.kv_get_json(&format!("{vat_id}.source")).await {
            Ok(source) => source
                .get("bundleID")
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        Ok(VatDetails {
            vat_name: vat_name.to_string(),
            vat_id,
            incarnation,
            bundle_id,
        })
    }

    async fn current_incarnation(&self, vat_name: &str) -> LedgerResult<u64> {
        let vat_id = self.find_vat(vat_name).await?;
        self.current_span_incarnation(&vat_id).await
    }
}
