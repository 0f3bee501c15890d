//! Voting on the latest proposal and waiting for the outcome.

use crate::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use upgrade_agd::{Clock, KeyLookup, QueryClient, TxClient, TxOpts};
use upgrade_types::{ProposalRecord, ProposalStatus, TxResult};

/// How a vote ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    /// Record as of the last poll; its status is terminal.
    pub proposal: ProposalRecord,
    /// Status polls performed.
    pub polls: u32,
    /// Whether the voting window closed before the status settled.
    pub stalled: bool,
}

impl VoteOutcome {
    pub fn passed(&self) -> bool {
        self.proposal.status == ProposalStatus::Passed
    }
}

#[derive(Debug, Clone)]
pub struct VoteDriverOptions {
    /// Key that deposits and votes.
    pub voter: String,
    pub chain_id: String,
    /// Deposit added before voting, with denom.
    pub deposit: String,
    pub block_interval: Duration,
    pub max_polls: u32,
}

pub struct VoteDriver {
    query: Arc<dyn QueryClient>,
    tx: Arc<dyn TxClient>,
    keys: Arc<dyn KeyLookup>,
    clock: Arc<dyn Clock>,
    opts: VoteDriverOptions,
}

impl VoteDriver {
    pub fn new(
        query: Arc<dyn QueryClient>,
        tx: Arc<dyn TxClient>,
        keys: Arc<dyn KeyLookup>,
        clock: Arc<dyn Clock>,
        opts: VoteDriverOptions,
    ) -> Self {
        Self {
            query,
            tx,
            keys,
            clock,
            opts,
        }
    }

    /// Vote yes on the most recent open proposal and wait for a terminal
    /// status.
    ///
    /// `Rejected` and `Failed` are outcomes, not errors.
    pub async fn vote_and_await(&self) -> PipelineResult<VoteOutcome> {
        self.wait_block().await;
        let proposal = self.latest_open_proposal().await?;
        let id = proposal.proposal_id;
        tracing::info!(proposal_id = id, status = %proposal.status, title = %proposal.title, "voting on proposal");

        let voter = self.keys.lookup(&self.opts.voter).await?;
        let opts = TxOpts::new(voter, self.opts.chain_id.clone());

        let deposit = self
            .tx
            .tx(
                &[
                    "gov".to_string(),
                    "deposit".to_string(),
                    id.to_string(),
                    self.opts.deposit.clone(),
                ],
                &opts,
            )
            .await?;
        check(id, "deposit", deposit)?;
        self.wait_block().await;

        let vote = self
            .tx
            .tx(
                &[
                    "gov".to_string(),
                    "vote".to_string(),
                    id.to_string(),
                    "yes".to_string(),
                ],
                &opts,
            )
            .await?;
        let vote = check(id, "vote", vote)?;
        tracing::info!(proposal_id = id, tx = %vote.abbr(), "voted yes");

        self.await_resolution(id).await
    }

    /// Poll `proposal_id` until its status is terminal, at most `max_polls`
    /// times, one block apart.
    pub async fn await_resolution(&self, proposal_id: u64) -> PipelineResult<VoteOutcome> {
        let max = self.opts.max_polls.max(1);
        let mut stalled = false;
        let mut last_status = ProposalStatus::Unspecified;

        for poll in 1..=max {
            let record = self.proposal(proposal_id).await?;
            tracing::debug!(proposal_id, poll, status = %record.status, "polled proposal");

            if record.status.is_terminal() {
                tracing::info!(proposal_id, status = %record.status, polls = poll, "proposal resolved");
                return Ok(VoteOutcome {
                    proposal: record,
                    polls: poll,
                    stalled,
                });
            }

            if !stalled && record.is_stalled_at(self.clock.now()) {
                stalled = true;
                tracing::warn!(
                    proposal_id,
                    status = %record.status,
                    voting_end_time = ?record.voting_end_time,
                    "voting period ended without a result"
                );
            }

            last_status = record.status;
            if poll < max {
                self.wait_block().await;
            }
        }

        Err(PipelineError::Timeout {
            proposal_id,
            tries_exhausted: max,
            last_status,
        })
    }

    /// The most recently submitted proposal that has not yet resolved.
    pub async fn latest_open_proposal(&self) -> PipelineResult<ProposalRecord> {
        let raw = self
            .query
            .query(&["gov".to_string(), "proposals".to_string()])
            .await?;
        let proposals = raw
            .get("proposals")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut records = proposals
            .iter()
            .map(ProposalRecord::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| r.proposal_id);

        records
            .into_iter()
            .rev()
            .find(|r| !r.status.is_terminal())
            .ok_or(PipelineError::NoOpenProposal)
    }

    pub async fn proposal(&self, proposal_id: u64) -> PipelineResult<ProposalRecord> {
        let raw = self
            .query
            .query(&[
                "gov".to_string(),
                "proposal".to_string(),
                proposal_id.to_string(),
            ])
            .await?;
        // Newer nodes wrap the record in `{"proposal": ..}`.
        let record = raw.get("proposal").unwrap_or(&raw);
        Ok(ProposalRecord::from_json(record)?)
    }

    async fn wait_block(&self) {
        self.clock.sleep(self.opts.block_interval).await;
    }
}

fn check(proposal_id: u64, action: &'static str, result: TxResult) -> PipelineResult<TxResult> {
    if result.is_success() {
        return Ok(result);
    }
    Err(PipelineError::VoteFailed {
        proposal_id,
        action,
        tx: result.abbr(),
        raw_log: result.raw_log,
    })
}
