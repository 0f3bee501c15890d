//! Pre-install checks on bundle archives.
//!
//! A bundle file is JSON carrying an `endoZipBase64` archive. The archive's
//! `compartment-map.json` names the compartment and module execution starts
//! from; a bundle without both is not worth the install fee.

use crate::{PipelineError, PipelineResult};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use upgrade_types::{BundleId, CodeBundle, ProposalBundle};

const COMPARTMENT_MAP: &str = "compartment-map.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleFile {
    endo_zip_base64: String,
}

#[derive(Debug, Deserialize)]
struct CompartmentMap {
    entry: Option<BundleEntry>,
}

/// Where a bundle starts executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    #[serde(default)]
    pub compartment: String,
    #[serde(default)]
    pub module: String,
}

/// Read the entry point of the bundle file at `bundle.path`.
pub async fn bundle_entry(bundle: &CodeBundle) -> PipelineResult<BundleEntry> {
    let raw = tokio::fs::read(&bundle.path).await?;
    let invalid = |reason: String| PipelineError::InvalidBundle {
        bundle_id: bundle.id.clone(),
        reason,
    };

    let file: BundleFile =
        serde_json::from_slice(&raw).map_err(|e| invalid(format!("bundle file: {e}")))?;
    let archive = base64::engine::general_purpose::STANDARD
        .decode(file.endo_zip_base64.as_bytes())
        .map_err(|e| invalid(format!("endoZipBase64: {e}")))?;

    let entry = read_compartment_map(&archive)
        .map_err(invalid)?
        .entry
        .ok_or_else(|| invalid("compartment map has no entry".to_string()))?;
    if entry.compartment.is_empty() || entry.module.is_empty() {
        return Err(invalid(format!(
            "entry needs a compartment and a module, got {entry:?}"
        )));
    }
    Ok(entry)
}

/// Entry points of every distinct bundle in `proposals`, in order.
///
/// Stops at the first bundle that fails to decode.
pub async fn check_bundle_entries(
    proposals: &[ProposalBundle],
) -> PipelineResult<Vec<(BundleId, BundleEntry)>> {
    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for bundle in proposals.iter().flat_map(|p| p.bundles.iter()) {
        if !seen.insert(bundle.id.clone()) {
            continue;
        }
        let entry = bundle_entry(bundle).await?;
        tracing::info!(
            bundle_id = %bundle.id.short(),
            compartment = %entry.compartment,
            module = %entry.module,
            "bundle entry"
        );
        entries.push((bundle.id.clone(), entry));
    }
    Ok(entries)
}

fn read_compartment_map(archive: &[u8]) -> Result<CompartmentMap, String> {
    let mut zip =
        zip::ZipArchive::new(Cursor::new(archive)).map_err(|e| format!("bundle archive: {e}"))?;
    let mut file = zip
        .by_name(COMPARTMENT_MAP)
        .map_err(|e| format!("{COMPARTMENT_MAP}: {e}"))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| format!("{COMPARTMENT_MAP}: {e}"))?;
    serde_json::from_slice(&content).map_err(|e| format!("{COMPARTMENT_MAP}: {e}"))
}
