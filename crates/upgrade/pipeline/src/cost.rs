//! Install cost estimation and installer top-up.

use crate::config::FundingConfig;
use crate::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use upgrade_agd::{Funder, KeyLookup, QueryClient};
use upgrade_types::MintPlan;

/// What [`CostEstimator::ensure_funded`] did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FundingOutcome {
    /// Balance already covered the estimate.
    Sufficient { balance: f64, cost: f64 },
    /// One funding operation was performed.
    Funded {
        balance: f64,
        cost: f64,
        plan: MintPlan,
    },
}

impl FundingOutcome {
    pub fn funded(&self) -> bool {
        matches!(self, FundingOutcome::Funded { .. })
    }
}

pub struct CostEstimator {
    query: Arc<dyn QueryClient>,
    keys: Arc<dyn KeyLookup>,
    funder: Arc<dyn Funder>,
    config: FundingConfig,
}

impl CostEstimator {
    pub fn new(
        query: Arc<dyn QueryClient>,
        keys: Arc<dyn KeyLookup>,
        funder: Arc<dyn Funder>,
        config: FundingConfig,
    ) -> Self {
        Self {
            query,
            keys,
            funder,
            config,
        }
    }

    /// Fee-token cost of installing `total_bytes` of bundles.
    pub fn estimate(&self, total_bytes: u64) -> f64 {
        total_bytes as f64 * self.config.price_per_byte
    }

    /// Top-up that brings `balance` above `cost`.
    pub fn mint_plan(&self, balance: f64, cost: f64) -> MintPlan {
        mint_plan(&self.config, balance, cost)
    }

    /// Balance of `address` in whole fee-token units.
    pub async fn balance(&self, address: &str) -> PipelineResult<f64> {
        let raw = self
            .query
            .query(&[
                "bank".to_string(),
                "balances".to_string(),
                address.to_string(),
            ])
            .await?;
        balance_in(&raw, &self.config.fee_denom, self.config.unit)
    }

    /// Make sure `account` can pay to install `total_bytes`.
    ///
    /// Performs at most one funding operation. Call once per install batch.
    pub async fn ensure_funded(
        &self,
        account: &str,
        total_bytes: u64,
    ) -> PipelineResult<FundingOutcome> {
        let address = self.keys.lookup(account).await?;
        let balance = self.balance(&address).await?;
        let cost = self.estimate(total_bytes);

        if balance >= cost {
            tracing::info!(
                account = %account,
                balance,
                cost,
                "balance sufficient"
            );
            return Ok(FundingOutcome::Sufficient { balance, cost });
        }

        let plan = self.mint_plan(balance, cost);
        tracing::info!(
            account = %account,
            balance,
            cost,
            want_minted = plan.want_minted,
            give_collateral = plan.give_collateral,
            send_value = plan.send_value,
            "funding installer"
        );
        self.funder
            .mint(&address, &plan)
            .await
            .map_err(|e| PipelineError::FundingFailed(e.to_string()))?;

        Ok(FundingOutcome::Funded {
            balance,
            cost,
            plan,
        })
    }
}

/// Compute the vault to open for a shortfall of `cost - balance`.
///
/// The minted amount is the shortfall plus padding, rounded up and never
/// below the minimum initial debt. Collateral is priced at
/// `collateral_price` with one extra unit on top.
pub fn mint_plan(config: &FundingConfig, balance: f64, cost: f64) -> MintPlan {
    let shortfall = (cost - balance + config.padding).ceil();
    let want_minted = shortfall.max(config.min_initial_debt);
    let give_collateral = (want_minted / config.collateral_price).round() + 1.0;
    let send_value = (give_collateral * config.unit as f64).round() as u64;
    MintPlan {
        want_minted,
        give_collateral,
        send_value,
    }
}

#[derive(Debug, Deserialize)]
struct Balances {
    #[serde(default)]
    balances: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct Coin {
    denom: String,
    amount: String,
}

/// Amount of `denom` in `bank balances` output, in whole units.
///
/// An account holding none of the denom has balance zero.
pub fn balance_in(raw: &Value, denom: &str, unit: u64) -> PipelineResult<f64> {
    let balances: Balances = serde_json::from_value(raw.clone())
        .map_err(|e| PipelineError::FundingFailed(format!("bank balances: {e}")))?;
    let Some(coin) = balances.balances.iter().find(|c| c.denom == denom) else {
        return Ok(0.0);
    };
    let amount: f64 = coin.amount.parse().map_err(|e| {
        PipelineError::FundingFailed(format!("bank balance {} {denom}: {e}", coin.amount))
    })?;
    Ok(amount / unit as f64)
}
