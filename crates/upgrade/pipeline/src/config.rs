//! Configuration for the evaluation pipeline

use crate::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `UPGRADE__CHAIN__CHAIN_ID`.
pub const ENV_PREFIX: &str = "UPGRADE";

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Chain and tool locations
    #[serde(default)]
    pub chain: ChainConfig,

    /// Key names used for each role
    #[serde(default)]
    pub accounts: AccountsConfig,

    /// Proposal submission and voting deposits
    #[serde(default)]
    pub proposal: ProposalConfig,

    /// Install cost model and top-up policy
    #[serde(default)]
    pub funding: FundingConfig,

    /// Vote polling
    #[serde(default)]
    pub voting: VotingConfig,

    /// Local state database
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    #[serde(default = "default_keyring_backend")]
    pub keyring_backend: String,

    /// RPC endpoint; the tool default when unset
    #[serde(default)]
    pub node: Option<String>,

    #[serde(default = "default_agd")]
    pub agd_binary: PathBuf,

    #[serde(default = "default_agops")]
    pub agops_binary: PathBuf,

    #[serde(default = "default_agoric")]
    pub agoric_binary: PathBuf,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            keyring_backend: default_keyring_backend(),
            node: None,
            agd_binary: default_agd(),
            agops_binary: default_agops(),
            agoric_binary: default_agoric(),
        }
    }
}

/// Key names (or addresses) for each role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// Signs bundle installs and pays their fees
    #[serde(default = "default_installer")]
    pub installer: String,

    /// Submits the proposal and votes on it
    #[serde(default = "default_proposer")]
    pub proposer: String,

    /// Supplies collateral when the installer is short
    #[serde(default = "default_proposer")]
    pub funder: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            installer: default_installer(),
            proposer: default_proposer(),
            funder: default_proposer(),
        }
    }
}

/// Proposal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalConfig {
    /// Deposit attached at submission
    #[serde(default = "default_deposit")]
    pub deposit: String,

    /// Deposit added before voting
    #[serde(default = "default_vote_deposit")]
    pub vote_deposit: String,

    #[serde(default = "default_gas_adjustment")]
    pub gas_adjustment: String,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            deposit: default_deposit(),
            vote_deposit: default_vote_deposit(),
            gas_adjustment: default_gas_adjustment(),
        }
    }
}

/// Funding configuration
///
/// Amounts are in whole fee-token units unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Install cost per bundle byte
    #[serde(default = "default_price_per_byte")]
    pub price_per_byte: f64,

    /// Fee-token value of one collateral unit
    #[serde(default = "default_collateral_price")]
    pub collateral_price: f64,

    /// Added to the shortfall before rounding
    #[serde(default = "default_padding")]
    pub padding: f64,

    /// Smallest debt a vault may open with
    #[serde(default = "default_min_initial_debt")]
    pub min_initial_debt: f64,

    /// Base units per whole unit, for both fee token and collateral
    #[serde(default = "default_unit")]
    pub unit: u64,

    /// Bank denom of the fee token
    #[serde(default = "default_fee_denom")]
    pub fee_denom: String,

    /// Bank denom of the collateral
    #[serde(default = "default_collateral_denom")]
    pub collateral_denom: String,

    /// Brand the vault manager knows the collateral by
    #[serde(default = "default_collateral_brand")]
    pub collateral_brand: String,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            price_per_byte: default_price_per_byte(),
            collateral_price: default_collateral_price(),
            padding: default_padding(),
            min_initial_debt: default_min_initial_debt(),
            unit: default_unit(),
            fee_denom: default_fee_denom(),
            collateral_denom: default_collateral_denom(),
            collateral_brand: default_collateral_brand(),
        }
    }
}

/// Voting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingConfig {
    /// Expected block time, used as the wait between steps and polls
    #[serde(default = "default_block_interval")]
    pub block_interval_ms: u64,

    /// Status polls before giving up
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl VotingConfig {
    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms)
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            block_interval_ms: default_block_interval(),
            max_polls: default_max_polls(),
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite swingstore; a leading `~` is expanded against the home directory
    #[serde(default = "default_swingstore_path")]
    pub swingstore_path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            swingstore_path: default_swingstore_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_chain_id() -> String {
    "agoriclocal".to_string()
}

fn default_keyring_backend() -> String {
    "test".to_string()
}

fn default_agd() -> PathBuf {
    PathBuf::from("agd")
}

fn default_agops() -> PathBuf {
    PathBuf::from("agops")
}

fn default_agoric() -> PathBuf {
    PathBuf::from("agoric")
}

fn default_installer() -> String {
    "gov1".to_string()
}

fn default_proposer() -> String {
    "validator".to_string()
}

fn default_deposit() -> String {
    "10000000ubld".to_string()
}

fn default_vote_deposit() -> String {
    "50000000ubld".to_string()
}

fn default_gas_adjustment() -> String {
    "1.2".to_string()
}

fn default_price_per_byte() -> f64 {
    0.002
}

fn default_collateral_price() -> f64 {
    6.0
}

fn default_padding() -> f64 {
    1.0
}

fn default_min_initial_debt() -> f64 {
    6.0
}

fn default_unit() -> u64 {
    1_000_000
}

fn default_fee_denom() -> String {
    "uist".to_string()
}

fn default_collateral_denom() -> String {
    "ibc/BA313C4A19DFBF943586C0387E6B11286F9E416B4DD27574E6909CABE0E342FA".to_string()
}

fn default_collateral_brand() -> String {
    "ATOM".to_string()
}

fn default_block_interval() -> u64 {
    2_000
}

fn default_max_polls() -> u32 {
    30
}

fn default_swingstore_path() -> String {
    "~/.agoric/data/agoric/swingstore.sqlite".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PipelineConfig {
    /// Load configuration: defaults, then the file at `path` if it exists,
    /// then `UPGRADE__SECTION__KEY` environment variables.
    pub fn load(path: Option<&str>) -> PipelineResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&PipelineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the cost model and poll loop cannot work with.
    pub fn validate(&self) -> PipelineResult<()> {
        let funding = &self.funding;
        if !(funding.price_per_byte.is_finite() && funding.price_per_byte >= 0.0) {
            return Err(invalid("funding.price_per_byte must be a non-negative number"));
        }
        if !(funding.collateral_price.is_finite() && funding.collateral_price > 0.0) {
            return Err(invalid("funding.collateral_price must be positive"));
        }
        if !(funding.padding.is_finite() && funding.padding >= 0.0) {
            return Err(invalid("funding.padding must be a non-negative number"));
        }
        if !(funding.min_initial_debt.is_finite() && funding.min_initial_debt >= 0.0) {
            return Err(invalid("funding.min_initial_debt must be a non-negative number"));
        }
        if funding.unit == 0 {
            return Err(invalid("funding.unit must be positive"));
        }
        if self.voting.max_polls == 0 {
            return Err(invalid("voting.max_polls must be at least 1"));
        }
        if self.accounts.installer.is_empty() || self.accounts.proposer.is_empty() {
            return Err(invalid("accounts.installer and accounts.proposer are required"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> PipelineError {
    PipelineError::Config(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.chain.chain_id, "agoriclocal");
        assert_eq!(config.accounts.installer, "gov1");
        assert_eq!(config.accounts.proposer, "validator");
        assert_eq!(config.proposal.deposit, "10000000ubld");
        assert_eq!(config.ledger.swingstore_path, "~/.agoric/data/agoric/swingstore.sqlite");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_funding_defaults() {
        let config = FundingConfig::default();
        assert_eq!(config.price_per_byte, 0.002);
        assert_eq!(config.collateral_price, 6.0);
        assert_eq!(config.min_initial_debt, 6.0);
        assert_eq!(config.unit, 1_000_000);
        assert_eq!(config.fee_denom, "uist");
    }

    #[test]
    fn test_voting_interval() {
        let config = VotingConfig::default();
        assert_eq!(config.block_interval(), Duration::from_secs(2));
        assert_eq!(config.max_polls, 30);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[accounts]\ninstaller = \"gov2\"\n\n[voting]\nmax_polls = 5\n\n[funding]\ncollateral_price = 12.5"
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.accounts.installer, "gov2");
        assert_eq!(config.accounts.proposer, "validator");
        assert_eq!(config.voting.max_polls, 5);
        assert_eq!(config.funding.collateral_price, 12.5);
        assert_eq!(config.funding.unit, 1_000_000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = PipelineConfig::load(Some("/nonexistent/upgrade-eval")).unwrap();
        assert_eq!(config.chain.keyring_backend, "test");
    }

    #[test]
    fn test_rejects_zero_polls() {
        let mut config = PipelineConfig::default();
        config.voting.max_polls = 0;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        let mut config = PipelineConfig::default();
        config.funding.collateral_price = 0.0;
        assert!(config.validate().is_err());
    }
}
