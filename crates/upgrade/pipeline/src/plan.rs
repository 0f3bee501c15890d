//! Loading proposals from a build output directory.
//!
//! The proposal build step writes one `<name>-plan.json` per eval next to
//! its permit, script and bundle files:
//!
//! ```json
//! {
//!   "name": "upgrade-vaults",
//!   "permit": "upgrade-vaults-permit.json",
//!   "script": "upgrade-vaults.js",
//!   "bundles": [{ "bundleID": "b1-...", "fileName": "/cache/b1-....json" }]
//! }
//! ```

use crate::{PipelineError, PipelineResult};
use futures::future::try_join_all;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use upgrade_types::{BundleId, CodeBundle, EvalSpec, ProposalBundle};

const PLAN_SUFFIX: &str = "-plan.json";

#[derive(Debug, Deserialize)]
struct PlanFile {
    name: String,
    permit: String,
    script: String,
    #[serde(default)]
    bundles: Vec<PlanBundle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanBundle {
    file_name: String,
    #[serde(rename = "bundleID", default)]
    bundle_id: Option<String>,
}

/// Read every `*-plan.json` in `dir`, sorted by file name.
///
/// Bundle files are looked up in `dir` by base name and sized from their
/// metadata.
pub async fn read_proposal_dir(dir: &Path) -> PipelineResult<Vec<ProposalBundle>> {
    let mut plan_paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_str().map(|n| n.ends_with(PLAN_SUFFIX)).unwrap_or(false) {
            plan_paths.push(entry.path());
        }
    }
    plan_paths.sort();

    let mut proposals = Vec::with_capacity(plan_paths.len());
    for path in plan_paths {
        let proposal = read_plan(dir, &path).await?;
        tracing::debug!(
            plan = %path.display(),
            bundles = proposal.bundles.len(),
            "read proposal plan"
        );
        proposals.push(proposal);
    }
    Ok(proposals)
}

async fn read_plan(dir: &Path, path: &Path) -> PipelineResult<ProposalBundle> {
    let text = tokio::fs::read_to_string(path).await?;
    let plan: PlanFile = serde_json::from_str(&text).map_err(|e| PipelineError::InvalidPlan {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut bundles = Vec::with_capacity(plan.bundles.len());
    for entry in &plan.bundles {
        let bundle = CodeBundle::from_file_name(&entry.file_name)?;
        if let Some(declared) = &entry.bundle_id {
            if BundleId::new(declared.as_str()) != bundle.id {
                return Err(PipelineError::InvalidPlan {
                    path: path.to_path_buf(),
                    reason: format!("{} declares id {declared}", entry.file_name),
                });
            }
        }
        bundles.push(bundle.located_in(dir, 0));
    }
    let sizes = bundle_sizes(bundles.iter().map(|b| b.path.clone())).await?;
    for (bundle, size) in bundles.iter_mut().zip(sizes) {
        bundle.size = size;
    }

    Ok(ProposalBundle {
        name: plan.name,
        dir: dir.to_path_buf(),
        evals: vec![EvalSpec::new(base_name(&plan.permit), base_name(&plan.script))],
        bundles,
    })
}

/// Sizes of the given files, read concurrently.
pub async fn bundle_sizes(paths: impl IntoIterator<Item = PathBuf>) -> PipelineResult<Vec<u64>> {
    let sizes = try_join_all(paths.into_iter().map(|path| async move {
        tokio::fs::metadata(&path).await.map(|m| m.len())
    }))
    .await?;
    Ok(sizes)
}

/// Total bytes of every bundle in `proposals`, re-read from disk.
pub async fn total_bundle_bytes(proposals: &[ProposalBundle]) -> PipelineResult<u64> {
    let paths = proposals
        .iter()
        .flat_map(|p| p.bundles.iter().map(|b| b.path.clone()));
    Ok(bundle_sizes(paths).await?.into_iter().sum())
}

fn base_name(file: &str) -> PathBuf {
    Path::new(file)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(file))
}
