//! upgrade-eval - run proposal evaluations against a local chain
//!
//! Subcommands:
//! - `run`: fund, install, submit, vote and verify a proposal directory
//! - `install`: fund and install the bundles of a proposal directory only
//! - `check`: verify vat incarnations against the local swingstore

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upgrade_agd::{AgdClient, AgdOptions, KeyLookup, TokioClock, TxClient, VaultFunder, VaultFunderOptions};
use upgrade_ledger::SqliteStateReader;
use upgrade_pipeline::plan::total_bundle_bytes;
use upgrade_pipeline::{
    check_bundle_entries, read_proposal_dir, ChainContext, IncarnationCheck,
    IncarnationExpectation, Pipeline, PipelineConfig,
};

mod expect;

/// upgrade-eval CLI
#[derive(Parser)]
#[command(name = "upgrade-eval")]
#[command(about = "Evaluate governance proposals against a local chain", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "UPGRADE_CONFIG")]
    config: Option<String>,

    /// Home directory used to expand `~` in the swingstore path
    #[arg(long, env = "HOME")]
    home: Option<PathBuf>,

    /// Swingstore database, overriding the configured path
    #[arg(long, env = "UPGRADE_SWINGSTORE")]
    swingstore: Option<String>,

    /// Log level
    #[arg(long, env = "UPGRADE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "UPGRADE_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every stage over the plans in a proposal directory
    Run {
        /// Directory holding `*-plan.json`, eval and bundle files
        dir: PathBuf,

        /// Incarnation check after the vote: NAME=N or NAME=+1
        #[arg(long = "expect", value_parser = expect::parse_check)]
        checks: Vec<IncarnationCheck>,

        /// Proposal title, defaulting to the plan names
        #[arg(long)]
        title: Option<String>,

        /// Proposal description
        #[arg(long)]
        description: Option<String>,

        /// Print the run report as JSON on success
        #[arg(long)]
        report: bool,
    },

    /// Fund the installer and install missing bundles
    Install {
        dir: PathBuf,
    },

    /// Check vat incarnations without touching the chain
    Check {
        /// NAME=N
        #[arg(long = "expect", value_parser = expect::parse_check, required = true)]
        checks: Vec<IncarnationCheck>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json {
        config.logging.json = true;
    }
    if let Some(path) = &cli.swingstore {
        config.ledger.swingstore_path = path.clone();
    }

    init_tracing(&config);

    let ctx = connect(&config, cli.home.as_deref()).await?;
    let pipeline = Pipeline::new(config, ctx);

    match cli.command {
        Command::Run {
            dir,
            checks,
            title,
            description,
            report,
        } => {
            let proposals = load(&dir).await?;
            let mut metadata = pipeline.metadata_for(&proposals);
            if let Some(title) = title {
                metadata.title = title;
            }
            if let Some(description) = description {
                metadata.description = description;
            }

            match pipeline.run(&proposals, &metadata, &checks).await {
                Ok(outcome) => {
                    if report {
                        println!("{}", serde_json::to_string_pretty(&outcome)?);
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(stage = %e.stage, error = %e.source, "evaluation failed");
                    Err(e.into())
                }
            }
        }

        Command::Install { dir } => {
            let proposals = load(&dir).await?;
            check_bundle_entries(&proposals).await?;
            let bytes = total_bundle_bytes(&proposals).await?;
            pipeline
                .cost_estimator()
                .ensure_funded(&pipeline.config().accounts.installer, bytes)
                .await?;
            let report = pipeline.installer().install_all(&proposals).await?;
            tracing::info!(
                installed = report.installed.len(),
                already_installed = report.already_installed,
                "install complete"
            );
            Ok(())
        }

        Command::Check { checks } => {
            let verifier = pipeline.verifier();
            for check in &checks {
                match check.expectation {
                    IncarnationExpectation::Exact(n) => {
                        verifier.expect_incarnation(&check.vat_name, n).await?
                    }
                    IncarnationExpectation::AdvancedByOne => {
                        bail!("{}=+1 needs a run to compare against; use `run`", check.vat_name)
                    }
                }
            }
            Ok(())
        }
    }
}

fn init_tracing(config: &PipelineConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Wire the subprocess clients and the swingstore reader.
async fn connect(config: &PipelineConfig, home: Option<&Path>) -> Result<ChainContext> {
    let agd = Arc::new(AgdClient::new(AgdOptions {
        binary: config.chain.agd_binary.clone(),
        keyring_backend: config.chain.keyring_backend.clone(),
        node: config.chain.node.clone(),
        home: None,
    }));

    let reader = SqliteStateReader::open_configured(&config.ledger.swingstore_path, home)
        .await
        .with_context(|| format!("opening swingstore {}", config.ledger.swingstore_path))?;

    let funder = VaultFunder::new(
        agd.clone() as Arc<dyn TxClient>,
        agd.clone() as Arc<dyn KeyLookup>,
        VaultFunderOptions {
            funder: config.accounts.funder.clone(),
            chain_id: config.chain.chain_id.clone(),
            keyring_backend: config.chain.keyring_backend.clone(),
            collateral_denom: config.funding.collateral_denom.clone(),
            collateral_brand: config.funding.collateral_brand.clone(),
            agops_binary: config.chain.agops_binary.clone(),
            agoric_binary: config.chain.agoric_binary.clone(),
        },
    );

    Ok(ChainContext {
        reader: Arc::new(reader),
        tx: agd.clone(),
        query: agd.clone(),
        keys: agd,
        funder: Arc::new(funder),
        clock: Arc::new(TokioClock),
    })
}

async fn load(dir: &Path) -> Result<Vec<upgrade_types::ProposalBundle>> {
    let proposals = read_proposal_dir(dir)
        .await
        .with_context(|| format!("reading proposals in {}", dir.display()))?;
    if proposals.is_empty() {
        bail!("no *-plan.json files in {}", dir.display());
    }
    tracing::info!(
        dir = %dir.display(),
        proposals = proposals.len(),
        bundles = proposals.iter().map(|p| p.bundles.len()).sum::<usize>(),
        "loaded proposals"
    );
    Ok(proposals)
}
