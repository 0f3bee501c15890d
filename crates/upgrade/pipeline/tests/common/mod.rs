//! Scripted chain shared by the integration tests.
//!
//! Installs land in an [`InMemoryStateReader`], proposals get sequential ids,
//! and `gov proposal` serves a fixed script of statuses. When a proposal
//! first reports `PASSED`, the queued vat upgrades are applied.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use upgrade_agd::{
    AgdError, AgdResult, Funder, KeyLookup, ManualClock, QueryClient, TxClient, TxOpts,
};
use upgrade_ledger::InMemoryStateReader;
use upgrade_pipeline::installer::BUNDLES_PATH;
use upgrade_pipeline::{ChainContext, PipelineConfig};
use upgrade_types::{CodeBundle, MintPlan, ProposalStatus, TxResult};

#[derive(Default)]
pub struct ChainState {
    pub txs: Vec<Vec<String>>,
    pub queries: Vec<Vec<String>>,
    pub published_bundle: Option<Value>,
    /// Digest of every install status the chain published, in order.
    pub published_digests: Vec<String>,
    pub proposals: Vec<(u64, ProposalStatus)>,
    pub statuses: VecDeque<ProposalStatus>,
    pub status_polls: u32,
    pub balance_uist: u64,
    pub mints: Vec<(String, MintPlan)>,
    /// Vat id and new bundle, applied when a proposal passes.
    pub upgrades: Vec<(String, String)>,
    pub reject_installs: bool,
    pub publish_digest: Option<String>,
    pub skip_ledger_write: bool,
}

pub struct FakeChain {
    pub reader: Arc<InMemoryStateReader>,
    pub state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            reader: Arc::new(InMemoryStateReader::new()),
            state: Mutex::new(ChainState::default()),
        })
    }

    pub fn with_state(&self, f: impl FnOnce(&mut ChainState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn tx_count(&self) -> usize {
        self.state.lock().unwrap().txs.len()
    }

    pub fn txs_of(&self, module: &str, action: &str) -> Vec<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .txs
            .iter()
            .filter(|t| t[0] == module && t[1] == action)
            .cloned()
            .collect()
    }

    pub fn script_statuses(&self, statuses: &[ProposalStatus]) {
        self.with_state(|s| s.statuses = statuses.iter().copied().collect());
    }

    pub fn context(self: &Arc<Self>, clock: Arc<ManualClock>) -> ChainContext {
        ChainContext {
            reader: self.reader.clone(),
            tx: self.clone(),
            query: self.clone(),
            keys: self.clone(),
            funder: self.clone(),
            clock,
        }
    }

    fn install(&self, args: &[String]) -> TxResult {
        let path = args[2].trim_start_matches('@');
        let bundle = CodeBundle::from_file_name(path).unwrap();
        let mut state = self.state.lock().unwrap();
        if state.reject_installs {
            return TxResult {
                code: 13,
                txhash: "INSTALL".to_string(),
                raw_log: "insufficient fees".to_string(),
                ..TxResult::default()
            };
        }
        if !state.skip_ledger_write {
            self.reader.insert_bundle(bundle.id.clone()).unwrap();
        }
        let digest = state
            .publish_digest
            .clone()
            .unwrap_or_else(|| bundle.digest.clone());
        state.published_digests.push(digest.clone());
        state.published_bundle = Some(json!({
            "endoZipBase64Sha512": digest,
            "error": null,
            "installed": true
        }));
        ok_tx("INSTALL")
    }

    fn submit(&self) -> TxResult {
        let mut state = self.state.lock().unwrap();
        let id = state.proposals.len() as u64 + 1;
        state.proposals.push((id, ProposalStatus::VotingPeriod));
        serde_json::from_value(json!({
            "code": 0,
            "txhash": "SUBMIT",
            "height": "10",
            "events": [{ "type": "submit_proposal", "attributes": [
                { "key": "proposal_id", "value": id.to_string() }
            ] }]
        }))
        .unwrap()
    }

    fn poll(&self, id: u64) -> Value {
        let mut state = self.state.lock().unwrap();
        state.status_polls += 1;
        let status = if state.statuses.len() > 1 {
            state.statuses.pop_front().unwrap()
        } else {
            state
                .statuses
                .front()
                .copied()
                .unwrap_or(ProposalStatus::VotingPeriod)
        };

        let was_open = state
            .proposals
            .iter()
            .any(|(pid, s)| *pid == id && !s.is_terminal());
        if let Some(entry) = state.proposals.iter_mut().find(|(pid, _)| *pid == id) {
            entry.1 = status;
        }
        if was_open && status == ProposalStatus::Passed {
            for (vat_id, bundle_id) in state.upgrades.drain(..) {
                self.reader.upgrade_vat(&vat_id, &bundle_id).unwrap();
            }
        }

        json!({ "proposal": {
            "id": id.to_string(),
            "status": status.as_chain_str(),
            "voting_end_time": "2030-01-01T00:00:00Z",
            "title": "t",
            "summary": "d"
        } })
    }
}

pub fn ok_tx(hash: &str) -> TxResult {
    TxResult {
        code: 0,
        txhash: hash.to_string(),
        height: 5,
        ..TxResult::default()
    }
}

/// `vstorage data` output for a single published value.
pub fn storage_reply(payload: &Value) -> Value {
    let capdata = json!({ "body": format!("#{payload}"), "slots": [] });
    let cell = json!({ "blockHeight": "5", "values": [capdata.to_string()] });
    json!({ "value": cell.to_string() })
}

#[async_trait]
impl TxClient for FakeChain {
    async fn tx(&self, args: &[String], _opts: &TxOpts) -> AgdResult<TxResult> {
        self.state.lock().unwrap().txs.push(args.to_vec());
        let result = match (args[0].as_str(), args[1].as_str()) {
            ("swingset", "install-bundle") => self.install(args),
            ("gov", "submit-proposal") => self.submit(),
            ("gov", "deposit") | ("gov", "vote") => ok_tx("GOV"),
            _ => return Err(AgdError::Missing(format!("unscripted tx {args:?}"))),
        };
        Ok(result)
    }
}

#[async_trait]
impl QueryClient for FakeChain {
    async fn query(&self, args: &[String]) -> AgdResult<Value> {
        self.state.lock().unwrap().queries.push(args.to_vec());
        match (args[0].as_str(), args[1].as_str()) {
            ("bank", "balances") => {
                let uist = self.state.lock().unwrap().balance_uist;
                Ok(json!({ "balances": [{ "denom": "uist", "amount": uist.to_string() }] }))
            }
            ("vstorage", "data") if args[2] == BUNDLES_PATH => {
                let published = self.state.lock().unwrap().published_bundle.clone();
                published
                    .map(|p| storage_reply(&p))
                    .ok_or_else(|| AgdError::Missing("vstorage value".to_string()))
            }
            ("gov", "proposals") => {
                let proposals = self.state.lock().unwrap().proposals.clone();
                let list: Vec<Value> = proposals
                    .iter()
                    .map(|(id, status)| {
                        json!({ "id": id.to_string(), "status": status.as_chain_str() })
                    })
                    .collect();
                Ok(json!({ "proposals": list }))
            }
            ("gov", "proposal") => Ok(self.poll(args[2].parse().unwrap())),
            _ => Err(AgdError::Missing(format!("unscripted query {args:?}"))),
        }
    }
}

#[async_trait]
impl KeyLookup for FakeChain {
    async fn lookup(&self, name: &str) -> AgdResult<String> {
        Ok(format!("agoric1{name}"))
    }
}

#[async_trait]
impl Funder for FakeChain {
    async fn mint(&self, address: &str, plan: &MintPlan) -> AgdResult<()> {
        let mut state = self.state.lock().unwrap();
        state.mints.push((address.to_string(), *plan));
        state.balance_uist += (plan.want_minted * 1_000_000.0) as u64;
        Ok(())
    }
}

/// Config with a fast block interval and a short poll bound.
pub fn test_config(max_polls: u32) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.voting.block_interval_ms = 10;
    config.voting.max_polls = max_polls;
    config
}

/// Bundle file contents with a minimal archive, padded with trailing
/// whitespace to exactly `size` bytes.
pub fn bundle_file(digest: &str, size: usize) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("compartment-map.json", options).unwrap();
    let map = json!({ "entry": { "compartment": "contract-v1.0.0", "module": "./src/index.js" } });
    writer.write_all(map.to_string().as_bytes()).unwrap();
    let archive = writer.finish().unwrap().into_inner();

    let body = json!({
        "moduleFormat": "endoZipBase64",
        "endoZipBase64": base64::engine::general_purpose::STANDARD.encode(archive),
        "endoZipBase64Sha512": digest,
    });
    let mut bytes = body.to_string().into_bytes();
    assert!(bytes.len() <= size, "bundle needs at least {} bytes", bytes.len());
    bytes.resize(size, b' ');
    bytes
}

/// Write a plan plus its bundle files into `dir`.
pub fn write_proposal(dir: &Path, name: &str, bundles: &[(&str, usize)]) {
    let entries: Vec<Value> = bundles
        .iter()
        .map(|(digest, size)| {
            let file = format!("b1-{digest}.json");
            std::fs::write(dir.join(&file), bundle_file(digest, *size)).unwrap();
            json!({ "bundleID": format!("b1-{digest}"), "fileName": file })
        })
        .collect();
    let plan = json!({
        "name": name,
        "permit": format!("{name}-permit.json"),
        "script": format!("{name}.js"),
        "bundles": entries,
    });
    std::fs::write(dir.join(format!("{name}-plan.json")), plan.to_string()).unwrap();
    std::fs::write(dir.join(format!("{name}-permit.json")), "true").unwrap();
    std::fs::write(dir.join(format!("{name}.js")), "// eval").unwrap();
}
