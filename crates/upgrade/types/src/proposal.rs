//! Governance proposal records as reported by the chain.

use crate::error::{TypesError, TypesResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Proposal lifecycle status.
///
/// `VotingPeriod` moves to one of the terminal states `Passed`, `Rejected`
/// or `Failed`. The chain owns every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    #[serde(rename = "PROPOSAL_STATUS_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "PROPOSAL_STATUS_DEPOSIT_PERIOD")]
    DepositPeriod,
    #[serde(rename = "PROPOSAL_STATUS_VOTING_PERIOD")]
    VotingPeriod,
    #[serde(rename = "PROPOSAL_STATUS_PASSED")]
    Passed,
    #[serde(rename = "PROPOSAL_STATUS_REJECTED")]
    Rejected,
    #[serde(rename = "PROPOSAL_STATUS_FAILED")]
    Failed,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Passed | ProposalStatus::Rejected | ProposalStatus::Failed
        )
    }

    pub fn as_chain_str(&self) -> &'static str {
        match self {
            ProposalStatus::Unspecified => "PROPOSAL_STATUS_UNSPECIFIED",
            ProposalStatus::DepositPeriod => "PROPOSAL_STATUS_DEPOSIT_PERIOD",
            ProposalStatus::VotingPeriod => "PROPOSAL_STATUS_VOTING_PERIOD",
            ProposalStatus::Passed => "PROPOSAL_STATUS_PASSED",
            ProposalStatus::Rejected => "PROPOSAL_STATUS_REJECTED",
            ProposalStatus::Failed => "PROPOSAL_STATUS_FAILED",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_chain_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROPOSAL_STATUS_UNSPECIFIED" => Ok(ProposalStatus::Unspecified),
            "PROPOSAL_STATUS_DEPOSIT_PERIOD" => Ok(ProposalStatus::DepositPeriod),
            "PROPOSAL_STATUS_VOTING_PERIOD" => Ok(ProposalStatus::VotingPeriod),
            "PROPOSAL_STATUS_PASSED" => Ok(ProposalStatus::Passed),
            "PROPOSAL_STATUS_REJECTED" => Ok(ProposalStatus::Rejected),
            "PROPOSAL_STATUS_FAILED" => Ok(ProposalStatus::Failed),
            other => Err(TypesError::UnknownStatus(other.to_string())),
        }
    }
}

/// Title, description and deposit attached to a submitted proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    pub title: String,
    pub description: String,
    /// Deposit with denom, e.g. `10000000ubld`.
    pub deposit: String,
}

/// Snapshot of a proposal as last read from the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub proposal_id: u64,
    pub status: ProposalStatus,
    pub voting_end_time: Option<DateTime<Utc>>,
    pub title: String,
    pub description: String,
}

impl ProposalRecord {
    /// Decode a proposal from `gov proposal(s)` query output.
    ///
    /// Accepts both the `v1` shape (`id`, top-level `title`/`summary`) and the
    /// `v1beta1` shape (`proposal_id`, `content.title`/`content.description`).
    pub fn from_json(value: &Value) -> TypesResult<Self> {
        let id_value = value
            .get("id")
            .or_else(|| value.get("proposal_id"))
            .ok_or_else(|| malformed("proposal has no id"))?;
        let proposal_id = match id_value {
            Value::String(s) => s.parse::<u64>().map_err(|e| malformed(e.to_string()))?,
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| malformed(format!("proposal id {n} is not a u64")))?,
            other => return Err(malformed(format!("unexpected proposal id {other}"))),
        };

        let status = value
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("proposal has no status"))?
            .parse::<ProposalStatus>()?;

        let voting_end_time = match value.get("voting_end_time").and_then(Value::as_str) {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| malformed(format!("voting_end_time {raw}: {e}")))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let content = value.get("content");
        let text = |keys: &[&str]| -> String {
            keys.iter()
                .find_map(|k| {
                    value
                        .get(*k)
                        .or_else(|| content.and_then(|c| c.get(*k)))
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                })
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            proposal_id,
            status,
            voting_end_time,
            title: text(&["title"]),
            description: text(&["description", "summary"]),
        })
    }

    /// Whether the voting window has closed without a terminal status.
    pub fn is_stalled_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ProposalStatus::VotingPeriod
            && self.voting_end_time.map(|end| now > end).unwrap_or(false)
    }
}

fn malformed(reason: impl Into<String>) -> TypesError {
    TypesError::Malformed {
        what: "proposal",
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn terminal_statuses() {
        assert!(ProposalStatus::Passed.is_terminal());
        assert!(ProposalStatus::Rejected.is_terminal());
        assert!(ProposalStatus::Failed.is_terminal());
        assert!(!ProposalStatus::VotingPeriod.is_terminal());
        assert!(!ProposalStatus::DepositPeriod.is_terminal());
    }

    #[test]
    fn status_round_trips_through_chain_strings() {
        let status: ProposalStatus = "PROPOSAL_STATUS_VOTING_PERIOD".parse().unwrap();
        assert_eq!(status, ProposalStatus::VotingPeriod);
        assert_eq!(status.to_string(), "PROPOSAL_STATUS_VOTING_PERIOD");
        assert!("VOTING".parse::<ProposalStatus>().is_err());
    }

    #[test]
    fn decodes_v1_proposal() {
        let record = ProposalRecord::from_json(&json!({
            "id": "12",
            "status": "PROPOSAL_STATUS_PASSED",
            "voting_end_time": "2024-03-01T10:00:00.5Z",
            "title": "Upgrade vaults",
            "summary": "swap vaultFactory code"
        }))
        .unwrap();
        assert_eq!(record.proposal_id, 12);
        assert_eq!(record.status, ProposalStatus::Passed);
        assert_eq!(record.title, "Upgrade vaults");
        assert_eq!(record.description, "swap vaultFactory code");
        assert!(record.voting_end_time.is_some());
    }

    #[test]
    fn decodes_v1beta1_proposal() {
        let record = ProposalRecord::from_json(&json!({
            "proposal_id": 3,
            "status": "PROPOSAL_STATUS_REJECTED",
            "content": { "title": "t", "description": "d" }
        }))
        .unwrap();
        assert_eq!(record.proposal_id, 3);
        assert_eq!(record.title, "t");
        assert_eq!(record.description, "d");
        assert_eq!(record.voting_end_time, None);
    }

    #[test]
    fn stall_requires_open_vote_past_end_time() {
        let end = DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut record = ProposalRecord {
            proposal_id: 1,
            status: ProposalStatus::VotingPeriod,
            voting_end_time: Some(end),
            title: String::new(),
            description: String::new(),
        };
        assert!(!record.is_stalled_at(end));
        assert!(record.is_stalled_at(end + chrono::Duration::seconds(1)));

        record.status = ProposalStatus::Passed;
        assert!(!record.is_stalled_at(end + chrono::Duration::seconds(1)));
    }
}
