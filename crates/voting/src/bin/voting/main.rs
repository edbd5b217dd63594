#![deny(rust_2018_idioms)]

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use voting_common::{checksum_address, Address, Chain};
use voting_ethereum::deploy::{Artifact, Deployer, DeploymentJournal, DeploymentModule};
use voting_ethereum::HttpProvider;
use voting_lib::{
    EventAggregator, Feed, FeedSnapshot, Providers, RefreshController, StatusTracker, Watcher,
};

mod config;

use config::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }

    setup_tracing();

    let config = config::Config::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        app = %config.providers.app_name,
        "🏁 Starting voting client."
    );

    let transport = HttpProvider::from_config(
        config.ethereum.url.clone(),
        config.ethereum.password.clone(),
        config.ethereum.timeout,
    )
    .context("Creating Ethereum transport")?
    .with_retries(config.ethereum.retries);

    let providers = Providers::connect(config.providers, transport)
        .await
        .context(
            r"Determine Ethereum chain.

Hint: Make sure the provided ethereum.url and ethereum.password are good.",
        )?;

    match config.command {
        Command::Deploy {
            artifact,
            from,
            receipt_timeout,
        } => {
            let artifact = Artifact::load(&artifact)?;
            let module = DeploymentModule::voting(artifact.bytecode);
            let mut journal =
                DeploymentJournal::open(&config.deployments_dir, providers.chain.id())?;

            let deployed = Deployer::new(providers.transport.as_ref())
                .sender(from)
                .timeout(receipt_timeout)
                .deploy(&module, &mut journal)
                .await
                .context("Deploying module")?;

            for contract in deployed {
                println!(
                    "{} => {}",
                    contract.future_id,
                    checksum_address(&contract.address)
                );
            }
        }
        Command::Events { contract, json } => {
            let contract = resolve_contract(contract, &config.deployments_dir, providers.chain)?;
            let aggregator = EventAggregator::new(providers.transport.clone(), contract);
            let records = aggregator.activity().await.context("Fetching activity")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No activity yet");
            } else {
                for record in &records {
                    println!("{record}");
                }
            }
        }
        Command::Watch {
            contract,
            wallet,
            poll_interval,
            json,
        } => {
            let contract = resolve_contract(contract, &config.deployments_dir, providers.chain)?;
            providers
                .connect_wallet(wallet)
                .await
                .context("Connecting wallet")?;

            let transport = providers.transport.clone();
            let controller = RefreshController::new(
                EventAggregator::new(transport.clone(), contract),
                providers.wallet.subscribe(),
            );
            let watcher = Watcher {
                controller: Arc::new(controller),
                tracker: StatusTracker::new(transport, contract),
                wallet: providers.wallet.clone(),
                poll_interval,
            };

            info!(contract=%checksum_address(&contract), ?poll_interval, "Watching activity");
            watcher
                .run(shutdown_signal(), |snapshot| print_feed(snapshot, json))
                .await;
        }
    }

    Ok(())
}

/// The explicitly given contract or the one recorded by a previous `deploy` on `chain`.
fn resolve_contract(
    explicit: Option<Address>,
    deployments_dir: &Path,
    chain: Chain,
) -> anyhow::Result<Address> {
    if let Some(address) = explicit {
        return Ok(address);
    }

    let journal = DeploymentJournal::open(deployments_dir, chain.id())?;
    journal.voting().with_context(|| {
        format!(
            "No Voting contract recorded in {}. Deploy it first or pass --contract-address.",
            journal.path().display()
        )
    })
}

fn print_feed(snapshot: &FeedSnapshot, json: bool) {
    match &snapshot.feed {
        Feed::Failed(error) => {
            tracing::error!(generation=%snapshot.generation, reason=?error, "Activity unavailable")
        }
        feed if json => match serde_json::to_string(feed.records()) {
            Ok(json) => println!("{json}"),
            Err(error) => tracing::error!(reason=%error, "Serializing activity"),
        },
        Feed::Empty => println!("No activity yet"),
        Feed::Loaded(records) => {
            println!("--- activity (refresh {}) ---", snapshot.generation);
            for record in records {
                println!("{record}");
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(reason=%error, "Listening for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
