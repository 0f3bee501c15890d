//! `agd` subprocess client.

use crate::traits::{KeyLookup, QueryClient, TxClient, TxOpts};
use crate::{AgdError, AgdResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use upgrade_types::TxResult;

const ADDRESS_PREFIX: &str = "agoric1";

/// How to invoke `agd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgdOptions {
    pub binary: PathBuf,
    pub keyring_backend: String,
    /// RPC endpoint; the tool's default when unset.
    pub node: Option<String>,
    /// Client home directory; the tool's default when unset.
    pub home: Option<PathBuf>,
}

impl Default for AgdOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("agd"),
            keyring_backend: "test".to_string(),
            node: None,
            home: None,
        }
    }
}

/// Talks to a node through the `agd` command-line tool.
#[derive(Debug, Clone, Default)]
pub struct AgdClient {
    opts: AgdOptions,
}

impl AgdClient {
    pub fn new(opts: AgdOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &AgdOptions {
        &self.opts
    }

    fn common_flags(&self, args: &mut Vec<String>) {
        if let Some(node) = &self.opts.node {
            args.extend(["--node".to_string(), node.clone()]);
        }
        if let Some(home) = &self.opts.home {
            args.extend(["--home".to_string(), home.display().to_string()]);
        }
    }

    pub fn tx_args(&self, action: &[String], opts: &TxOpts) -> Vec<String> {
        let mut args = vec!["tx".to_string()];
        args.extend(action.iter().cloned());
        args.extend([
            "--keyring-backend".to_string(),
            self.opts.keyring_backend.clone(),
            "--chain-id".to_string(),
            opts.chain_id.clone(),
            "--from".to_string(),
            opts.from.clone(),
        ]);
        if opts.yes {
            args.push("--yes".to_string());
        }
        args.extend(["-o".to_string(), "json".to_string()]);
        self.common_flags(&mut args);
        args
    }

    pub fn query_args(&self, path: &[String]) -> Vec<String> {
        let mut args = vec!["query".to_string()];
        args.extend(path.iter().cloned());
        args.extend(["-o".to_string(), "json".to_string()]);
        self.common_flags(&mut args);
        args
    }
}

#[async_trait]
impl TxClient for AgdClient {
    async fn tx(&self, action: &[String], opts: &TxOpts) -> AgdResult<TxResult> {
        let stdout = run_command(&self.opts.binary, &self.tx_args(action, opts)).await?;
        let tx = parse_tx_output(&stdout)?;
        tracing::debug!(action = ?action.first(), tx = %tx.abbr(), "broadcast transaction");
        Ok(tx)
    }
}

#[async_trait]
impl QueryClient for AgdClient {
    async fn query(&self, path: &[String]) -> AgdResult<Value> {
        let stdout = run_command(&self.opts.binary, &self.query_args(path)).await?;
        serde_json::from_str(stdout.trim())
            .map_err(|e| AgdError::Decode(format!("query {}: {e}", path.join(" "))))
    }
}

#[async_trait]
impl KeyLookup for AgdClient {
    async fn lookup(&self, name: &str) -> AgdResult<String> {
        if name.starts_with(ADDRESS_PREFIX) {
            return Ok(name.to_string());
        }
        let mut args: Vec<String> = ["keys", "show", name, "-a", "--keyring-backend"]
            .into_iter()
            .map(str::to_string)
            .collect();
        args.push(self.opts.keyring_backend.clone());
        if let Some(home) = &self.opts.home {
            args.extend(["--home".to_string(), home.display().to_string()]);
        }
        let address = run_command(&self.opts.binary, &args).await?.trim().to_string();
        if address.is_empty() {
            return Err(AgdError::Missing(format!("address for key {name}")));
        }
        Ok(address)
    }
}

/// Decode `agd tx -o json` output.
///
/// With `--gas auto` some versions print a `gas estimate: N` line before the
/// JSON document, so decoding starts at the first line that opens an object.
pub fn parse_tx_output(stdout: &str) -> AgdResult<TxResult> {
    let start = stdout
        .lines()
        .position(|line| line.trim_start().starts_with('{'))
        .ok_or_else(|| AgdError::Decode(format!("no JSON in tx output: {}", stdout.trim())))?;
    let json = stdout.lines().skip(start).collect::<Vec<_>>().join("\n");
    serde_json::from_str(&json).map_err(|e| AgdError::Decode(format!("tx result: {e}")))
}

/// Run a tool to completion and return its stdout.
pub(crate) async fn run_command(program: &Path, args: &[String]) -> AgdResult<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| AgdError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(AgdError::CommandFailed {
            program: program.display().to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
