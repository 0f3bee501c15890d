//! Funding by minting against collateral.
//!
//! The funding account sends collateral to the target, and the target opens
//! a vault that mints the fee token.

use crate::client::run_command;
use crate::traits::{Funder, KeyLookup, TxClient, TxOpts};
use crate::{AgdError, AgdResult};
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use upgrade_types::MintPlan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultFunderOptions {
    /// Key name or address that supplies collateral.
    pub funder: String,
    pub chain_id: String,
    pub keyring_backend: String,
    /// Bank denom of the collateral, sent in base units.
    pub collateral_denom: String,
    /// Brand name the vault manager knows the collateral by.
    pub collateral_brand: String,
    pub agops_binary: PathBuf,
    pub agoric_binary: PathBuf,
}

impl Default for VaultFunderOptions {
    fn default() -> Self {
        Self {
            funder: "validator".to_string(),
            chain_id: "agoriclocal".to_string(),
            keyring_backend: "test".to_string(),
            collateral_denom: "ibc/BA313C4A19DFBF943586C0387E6B11286F9E416B4DD27574E6909CABE0E342FA"
                .to_string(),
            collateral_brand: "ATOM".to_string(),
            agops_binary: PathBuf::from("agops"),
            agoric_binary: PathBuf::from("agoric"),
        }
    }
}

pub struct VaultFunder {
    tx: Arc<dyn TxClient>,
    keys: Arc<dyn KeyLookup>,
    opts: VaultFunderOptions,
}

impl VaultFunder {
    pub fn new(tx: Arc<dyn TxClient>, keys: Arc<dyn KeyLookup>, opts: VaultFunderOptions) -> Self {
        Self { tx, keys, opts }
    }

    pub fn open_vault_args(&self, plan: &MintPlan) -> Vec<String> {
        vec![
            "vaults".to_string(),
            "open".to_string(),
            "--wantMinted".to_string(),
            plan.want_minted.to_string(),
            "--giveCollateral".to_string(),
            plan.give_collateral.to_string(),
            "--collateralBrand".to_string(),
            self.opts.collateral_brand.clone(),
        ]
    }

    async fn send_collateral(&self, address: &str, plan: &MintPlan) -> AgdResult<()> {
        let from = self.keys.lookup(&self.opts.funder).await?;
        let action = vec![
            "bank".to_string(),
            "send".to_string(),
            from.clone(),
            address.to_string(),
            format!("{}{}", plan.send_value, self.opts.collateral_denom),
        ];
        let result = self
            .tx
            .tx(&action, &TxOpts::new(from, self.opts.chain_id.clone()))
            .await?;
        if !result.is_success() {
            return Err(AgdError::TxRejected {
                action: "bank send".to_string(),
                tx: result.abbr(),
            });
        }
        tracing::info!(to = %address, tx = %result.abbr(), "sent collateral");
        Ok(())
    }

    async fn open_vault(&self, address: &str, plan: &MintPlan) -> AgdResult<()> {
        let offer = run_command(&self.opts.agops_binary, &self.open_vault_args(plan)).await?;

        let mut offer_file = tempfile::Builder::new()
            .prefix("open-vault-")
            .suffix(".json")
            .tempfile()?;
        offer_file.write_all(offer.as_bytes())?;
        offer_file.flush()?;

        let args = vec![
            "wallet".to_string(),
            "send".to_string(),
            "--offer".to_string(),
            offer_file.path().display().to_string(),
            "--from".to_string(),
            address.to_string(),
            "--keyring-backend".to_string(),
            self.opts.keyring_backend.clone(),
        ];
        run_command(&self.opts.agoric_binary, &args).await?;
        tracing::info!(
            address = %address,
            want_minted = plan.want_minted,
            give_collateral = plan.give_collateral,
            "opened vault"
        );
        Ok(())
    }
}

#[async_trait]
impl Funder for VaultFunder {
    async fn mint(&self, address: &str, plan: &MintPlan) -> AgdResult<()> {
        self.send_collateral(address, plan).await?;
        self.open_vault(address, plan).await
    }
}
