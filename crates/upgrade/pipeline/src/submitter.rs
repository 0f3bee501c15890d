//! Core-eval proposal submission.

use crate::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use upgrade_agd::{KeyLookup, TxClient, TxOpts};
use upgrade_ledger::StateReader;
use upgrade_types::{CodeBundle, ProposalBundle, ProposalMetadata, TxAbbr};

/// A proposal the chain accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSubmission {
    /// Id from the submission events, when the node reports them.
    pub proposal_id: Option<u64>,
    pub eval_paths: Vec<PathBuf>,
    pub tx: TxAbbr,
}

pub struct ProposalSubmitter {
    reader: Arc<dyn StateReader>,
    tx: Arc<dyn TxClient>,
    keys: Arc<dyn KeyLookup>,
    proposer: String,
    chain_id: String,
    gas_adjustment: String,
}

impl ProposalSubmitter {
    pub fn new(
        reader: Arc<dyn StateReader>,
        tx: Arc<dyn TxClient>,
        keys: Arc<dyn KeyLookup>,
        proposer: impl Into<String>,
        chain_id: impl Into<String>,
        gas_adjustment: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            tx,
            keys,
            proposer: proposer.into(),
            chain_id: chain_id.into(),
            gas_adjustment: gas_adjustment.into(),
        }
    }

    /// Submit the evals of `proposals` as a single core-eval proposal.
    ///
    /// Every referenced bundle must already be in the ledger; the chain
    /// would otherwise accept the proposal and fail it at execution.
    pub async fn submit(
        &self,
        proposals: &[ProposalBundle],
        metadata: &ProposalMetadata,
    ) -> PipelineResult<ProposalSubmission> {
        let eval_paths: Vec<PathBuf> = proposals.iter().flat_map(|p| p.eval_paths()).collect();
        let bundles: Vec<CodeBundle> = proposals
            .iter()
            .flat_map(|p| p.bundles.iter().cloned())
            .collect();
        self.submit_eval_paths(eval_paths, &bundles, metadata).await
    }

    /// Submit `eval_paths` (permit, script pairs in order) once every bundle
    /// in `bundles` is confirmed in the ledger.
    pub async fn submit_eval_paths(
        &self,
        eval_paths: Vec<PathBuf>,
        bundles: &[CodeBundle],
        metadata: &ProposalMetadata,
    ) -> PipelineResult<ProposalSubmission> {
        if eval_paths.is_empty() {
            return Err(PipelineError::NothingToSubmit(
                "no evals in the given proposals".to_string(),
            ));
        }

        for bundle in bundles {
            if !self.reader.is_installed(&bundle.id).await? {
                return Err(PipelineError::BundleNotLoaded {
                    bundle_id: bundle.id.clone(),
                });
            }
        }

        let from = self.keys.lookup(&self.proposer).await?;
        let action = submit_args(&eval_paths, metadata, &self.gas_adjustment);
        tracing::info!(
            title = %metadata.title,
            evals = eval_paths.len() / 2,
            deposit = %metadata.deposit,
            "submitting proposal"
        );

        let result = self
            .tx
            .tx(&action, &TxOpts::new(from, self.chain_id.clone()))
            .await?;
        if !result.is_success() {
            return Err(PipelineError::SubmissionFailed {
                tx: result.abbr(),
                raw_log: result.raw_log,
            });
        }

        let proposal_id = result
            .attribute("proposal_id")
            .and_then(|id| id.parse::<u64>().ok());
        tracing::info!(proposal_id = ?proposal_id, tx = %result.abbr(), "proposal submitted");

        Ok(ProposalSubmission {
            proposal_id,
            eval_paths,
            tx: result.abbr(),
        })
    }
}

/// Arguments for `tx gov submit-proposal swingset-core-eval`.
pub fn submit_args(
    eval_paths: &[PathBuf],
    metadata: &ProposalMetadata,
    gas_adjustment: &str,
) -> Vec<String> {
    let mut args = vec![
        "gov".to_string(),
        "submit-proposal".to_string(),
        "swingset-core-eval".to_string(),
    ];
    args.extend(eval_paths.iter().map(|p| p.display().to_string()));
    args.extend([
        "--title".to_string(),
        metadata.title.clone(),
        "--description".to_string(),
        metadata.description.clone(),
        "--deposit".to_string(),
        metadata.deposit.clone(),
        "--gas".to_string(),
        "auto".to_string(),
        "--gas-adjustment".to_string(),
        gas_adjustment.to_string(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use upgrade_agd::AgdResult;
    use upgrade_ledger::InMemoryStateReader;
    use upgrade_types::{BundleId, EvalSpec, TxResult};

    struct Names;

    #[async_trait]
    impl KeyLookup for Names {
        async fn lookup(&self, name: &str) -> AgdResult<String> {
            Ok(format!("agoric1{name}"))
        }
    }

    #[derive(Default)]
    struct RecordingTx {
        calls: Mutex<Vec<Vec<String>>>,
        code: u32,
    }

    #[async_trait]
    impl TxClient for RecordingTx {
        async fn tx(&self, args: &[String], _opts: &TxOpts) -> AgdResult<TxResult> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(serde_json::from_value(json!({
                "code": self.code,
                "txhash": "S1",
                "height": "20",
                "raw_log": if self.code == 0 { "" } else { "out of gas" },
                "events": [
                    { "type": "submit_proposal", "attributes": [{ "key": "proposal_id", "value": "9" }] }
                ]
            }))
            .unwrap())
        }
    }

    fn proposal() -> ProposalBundle {
        ProposalBundle {
            name: "upgrade-vaults".to_string(),
            dir: PathBuf::from("/p"),
            evals: vec![EvalSpec::named("upgrade-vaults")],
            bundles: vec![CodeBundle::from_file_name("b1-aaa.json").unwrap()],
        }
    }

    fn metadata() -> ProposalMetadata {
        ProposalMetadata {
            title: "Upgrade vaults".to_string(),
            description: "new vaultFactory".to_string(),
            deposit: "10000000ubld".to_string(),
        }
    }

    fn submitter(reader: Arc<InMemoryStateReader>, tx: Arc<RecordingTx>) -> ProposalSubmitter {
        ProposalSubmitter::new(reader, tx, Arc::new(Names), "validator", "agoriclocal", "1.2")
    }

    #[test]
    fn builds_core_eval_arguments() {
        let args = submit_args(&proposal().eval_paths(), &metadata(), "1.2");
        assert_eq!(
            args,
            vec![
                "gov",
                "submit-proposal",
                "swingset-core-eval",
                "/p/upgrade-vaults-permit.json",
                "/p/upgrade-vaults.js",
                "--title",
                "Upgrade vaults",
                "--description",
                "new vaultFactory",
                "--deposit",
                "10000000ubld",
                "--gas",
                "auto",
                "--gas-adjustment",
                "1.2",
            ]
        );
    }

    #[tokio::test]
    async fn refuses_when_bundle_missing() {
        let reader = Arc::new(InMemoryStateReader::new());
        let tx = Arc::new(RecordingTx::default());

        let err = submitter(reader, tx.clone())
            .submit(&[proposal()], &metadata())
            .await
            .unwrap_err();
        assert!(
            matches!(err, PipelineError::BundleNotLoaded { ref bundle_id } if bundle_id.as_str() == "b1-aaa")
        );
        assert!(tx.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reports_proposal_id_from_events() {
        let reader = Arc::new(InMemoryStateReader::new());
        reader.insert_bundle(BundleId::new("b1-aaa")).unwrap();
        let tx = Arc::new(RecordingTx::default());

        let submission = submitter(reader, tx.clone())
            .submit(&[proposal()], &metadata())
            .await
            .unwrap();
        assert_eq!(submission.proposal_id, Some(9));
        assert_eq!(submission.eval_paths.len(), 2);
        assert_eq!(tx.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn nonzero_code_is_submission_failure() {
        let reader = Arc::new(InMemoryStateReader::new());
        reader.insert_bundle(BundleId::new("b1-aaa")).unwrap();
        let tx = Arc::new(RecordingTx {
            code: 11,
            ..RecordingTx::default()
        });

        let err = submitter(reader, tx)
            .submit(&[proposal()], &metadata())
            .await
            .unwrap_err();
        match err {
            PipelineError::SubmissionFailed { tx, raw_log } => {
                assert_eq!(tx.code, 11);
                assert_eq!(raw_log, "out of gas");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
