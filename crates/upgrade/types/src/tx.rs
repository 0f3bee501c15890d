//! Transaction results and published install records.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Result of a broadcast transaction as reported by `agd tx ... -o json`.
///
/// `code == 0` is success; any other code is a chain-level rejection and is
/// surfaced verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub txhash: String,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    pub height: u64,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    pub gas_used: u64,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    pub gas_wanted: u64,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default)]
    pub events: Vec<TxEvent>,
}

impl TxResult {
    pub const SUCCESS: u32 = 0;

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }

    /// First value of an event attribute named `key`.
    ///
    /// Looks at top-level `events` first, then at the JSON logs older nodes
    /// put in `raw_log`.
    pub fn attribute(&self, key: &str) -> Option<String> {
        let from_events = |events: &[TxEvent]| {
            events
                .iter()
                .flat_map(|e| e.attributes.iter())
                .find(|a| a.key == key)
                .map(|a| a.value.clone())
        };
        if let Some(value) = from_events(&self.events) {
            return Some(value);
        }

        let logs: Vec<TxLog> = serde_json::from_str(&self.raw_log).ok()?;
        logs.iter().find_map(|log| from_events(&log.events))
    }

    /// Fields worth a log line.
    pub fn abbr(&self) -> TxAbbr {
        TxAbbr {
            txhash: self.txhash.clone(),
            code: self.code,
            height: self.height,
            gas_used: self.gas_used,
        }
    }
}

/// Event emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<TxAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxAttribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct TxLog {
    #[serde(default)]
    events: Vec<TxEvent>,
}

/// Abbreviated transaction result for logs and error reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxAbbr {
    pub txhash: String,
    pub code: u32,
    pub height: u64,
    pub gas_used: u64,
}

impl std::fmt::Display for TxAbbr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tx {} code={} height={} gas_used={}",
            self.txhash, self.code, self.height, self.gas_used
        )
    }
}

/// Install status the chain publishes under the `bundles` storage path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedBundleInfo {
    pub endo_zip_base64_sha512: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub installed: bool,
}

impl PublishedBundleInfo {
    /// True when the record shows `digest` installed without error.
    pub fn confirms(&self, digest: &str) -> bool {
        self.installed && self.error.is_none() && self.endo_zip_base64_sha512 == digest
    }
}

fn u64_from_str_or_num<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("{n} is not a u64"))),
        Value::String(s) if s.is_empty() => Ok(0),
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_agd_tx_output() {
        let tx: TxResult = serde_json::from_value(json!({
            "height": "1043",
            "txhash": "ABCDEF",
            "codespace": "",
            "code": 0,
            "data": "",
            "raw_log": "[]",
            "logs": [],
            "gas_wanted": "2400000",
            "gas_used": "1999111",
            "events": []
        }))
        .unwrap();
        assert!(tx.is_success());
        assert_eq!(tx.height, 1043);
        assert_eq!(tx.gas_used, 1_999_111);
        assert_eq!(
            tx.abbr().to_string(),
            "tx ABCDEF code=0 height=1043 gas_used=1999111"
        );
    }

    #[test]
    fn nonzero_code_is_failure() {
        let tx: TxResult = serde_json::from_value(json!({
            "code": 13,
            "codespace": "sdk",
            "txhash": "X",
            "raw_log": "insufficient fee"
        }))
        .unwrap();
        assert!(!tx.is_success());
        assert_eq!(tx.height, 0);
    }

    #[test]
    fn finds_proposal_id_in_events_or_raw_log() {
        let modern: TxResult = serde_json::from_value(json!({
            "code": 0,
            "events": [
                { "type": "submit_proposal", "attributes": [
                    { "key": "proposal_id", "value": "7" },
                    { "key": "proposal_messages", "value": ",/agoric.swingset.MsgCoreEval" }
                ] }
            ]
        }))
        .unwrap();
        assert_eq!(modern.attribute("proposal_id").as_deref(), Some("7"));

        let legacy: TxResult = serde_json::from_value(json!({
            "code": 0,
            "raw_log": r#"[{"msg_index":0,"events":[{"type":"submit_proposal","attributes":[{"key":"proposal_id","value":"4"}]}]}]"#
        }))
        .unwrap();
        assert_eq!(legacy.attribute("proposal_id").as_deref(), Some("4"));
        assert_eq!(legacy.attribute("voting_period_start"), None);
    }

    #[test]
    fn published_info_confirms_only_clean_matching_install() {
        let info: PublishedBundleInfo = serde_json::from_value(json!({
            "endoZipBase64Sha512": "abc",
            "error": null,
            "installed": true
        }))
        .unwrap();
        assert!(info.confirms("abc"));
        assert!(!info.confirms("abd"));

        let failed = PublishedBundleInfo {
            error: Some("bad zip".to_string()),
            ..info
        };
        assert!(!failed.confirms("abc"));
    }
}
