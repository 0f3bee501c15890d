//! SQLite adapter over a node's swingstore.
//!
//! The database belongs to the running node. It is always opened read-only,
//! so reads see whatever the kernel last committed and never contend for
//! write locks.

use crate::traits::StateReader;
use crate::{LedgerError, LedgerResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use upgrade_types::BundleId;

/// Read-only swingstore reader.
#[derive(Clone)]
pub struct SqliteStateReader {
    pool: SqlitePool,
}

impl SqliteStateReader {
    /// Open the database at `path` read-only.
    pub async fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(|e| {
                LedgerError::Backend(format!("failed to open swingstore {}: {e}", path.display()))
            })?;
        tracing::debug!(path = %path.display(), "opened swingstore read-only");
        Ok(Self { pool })
    }

    /// Open a configured path such as `~/.agoric/data/agoric/swingstore.sqlite`,
    /// expanding `~` against `home`.
    pub async fn open_configured(path: &str, home: Option<&Path>) -> LedgerResult<Self> {
        Self::open(expand_home(path, home)).await
    }
}

/// Replace a leading `~` with `home`. Paths without one, or with no home
/// given, are returned unchanged.
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

fn backend(context: &str) -> impl FnOnce(sqlx::Error) -> LedgerError + '_ {
    move |e| LedgerError::Backend(format!("{context}: {e}"))
}

#[async_trait]
impl StateReader for SqliteStateReader {
    async fn list_installed_bundle_ids(&self) -> LedgerResult<BTreeSet<BundleId>> {
        let rows = sqlx::query("SELECT bundleID FROM bundles")
            .fetch_all(&self.pool)
            .await
            .map_err(backend("list bundles"))?;

        rows.into_iter()
            .map(|row| {
                row.try_get::<String, _>("bundleID")
                    .map(BundleId::new)
                    .map_err(|e| LedgerError::Decode(format!("bundleID: {e}")))
            })
            .collect()
    }

    async fn is_installed(&self, id: &BundleId) -> LedgerResult<bool> {
        let row = sqlx::query("SELECT 1 FROM bundles WHERE bundleID = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend("lookup bundle"))?;
        Ok(row.is_some())
    }

    async fn kv_get(&self, key: &str) -> LedgerResult<String> {
        let row = sqlx::query("SELECT value FROM kvStore WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend("read kvStore"))?
            .ok_or_else(|| LedgerError::NotFound(format!("kvStore key {key}")))?;

        row.try_get::<String, _>("value")
            .map_err(|e| LedgerError::Decode(format!("kvStore {key}: {e}")))
    }

    async fn current_span_incarnation(&self, vat_id: &str) -> LedgerResult<u64> {
        let row = sqlx::query(
            "SELECT incarnation FROM transcriptSpans WHERE isCurrent = 1 AND vatID = ?",
        )
        .bind(vat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend("read transcriptSpans"))?
        .ok_or_else(|| LedgerError::NotFound(format!("no current transcript span for {vat_id}")))?;

        let incarnation: i64 = row
            .try_get("incarnation")
            .map_err(|e| LedgerError::Decode(format!("incarnation of {vat_id}: {e}")))?;
        u64::try_from(incarnation)
            .map_err(|_| LedgerError::Decode(format!("negative incarnation {incarnation} for {vat_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_tilde_against_home() {
        let home = Path::new("/home/agoric");
        assert_eq!(
            expand_home("~/.agoric/data/agoric/swingstore.sqlite", Some(home)),
            PathBuf::from("/home/agoric/.agoric/data/agoric/swingstore.sqlite")
        );
        assert_eq!(
            expand_home("/state/swingstore.sqlite", Some(home)),
            PathBuf::from("/state/swingstore.sqlite")
        );
        assert_eq!(expand_home("~/x", None), PathBuf::from("~/x"));
    }
}
