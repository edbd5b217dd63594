//! Declarative contract deployment.
//!
//! A [DeploymentModule] names the contracts it instantiates. Deploying a module
//! records every contract's address in a per-chain [DeploymentJournal], and a
//! contract already present in the journal is not deployed again.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use ethers::types::{Bytes, TransactionReceipt, TransactionRequest, H256};
use serde::Deserialize;
use tracing::{debug, info};
use voting_common::{checksum_address, parse_address, Address};

use crate::contract::CONTRACT_NAME;
use crate::provider::{EthereumTransport, RpcError};

/// The module deploying the Voting contract.
pub const VOTING_MODULE: &str = "VotingModule";

/// One contract to instantiate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractFuture {
    pub name: String,
    pub bytecode: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentModule {
    id: String,
    contracts: Vec<ContractFuture>,
}

impl DeploymentModule {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            contracts: Vec::new(),
        }
    }

    /// Adds a contract without constructor arguments.
    pub fn contract(mut self, name: impl Into<String>, bytecode: Bytes) -> Self {
        self.contracts.push(ContractFuture {
            name: name.into(),
            bytecode,
        });
        self
    }

    /// The `Voting` contract, which takes no constructor arguments.
    pub fn voting(bytecode: Bytes) -> Self {
        Self::new(VOTING_MODULE).contract(CONTRACT_NAME, bytecode)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contracts(&self) -> &[ContractFuture] {
        &self.contracts
    }

    /// The journal key of a contract of this module, `<module>#<contract>`.
    pub fn future_id(&self, contract: &ContractFuture) -> String {
        format!("{}#{}", self.id, contract.name)
    }
}

/// The subset of a Hardhat compilation artifact needed for deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub bytecode: Bytes,
}

impl Artifact {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Reading artifact {}", path.display()))?;
        let artifact: Artifact = serde_json::from_str(&contents)
            .with_context(|| format!("Parsing artifact {}", path.display()))?;
        anyhow::ensure!(
            !artifact.bytecode.is_empty(),
            "Artifact {} has no bytecode, is {} abstract?",
            path.display(),
            artifact.contract_name
        );
        Ok(artifact)
    }
}

/// Deployed addresses of one chain, persisted as
/// `<root>/chain-<chain id>/deployed_addresses.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentJournal {
    path: PathBuf,
    addresses: BTreeMap<String, Address>,
}

impl DeploymentJournal {
    pub const FILE_NAME: &'static str = "deployed_addresses.json";

    /// Opens the journal of `chain_id` under `root`. A missing file is an empty journal.
    pub fn open(root: &Path, chain_id: u64) -> anyhow::Result<Self> {
        let path = root
            .join(format!("chain-{chain_id}"))
            .join(Self::FILE_NAME);

        let addresses = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let raw: BTreeMap<String, String> = serde_json::from_str(&contents)
                    .with_context(|| format!("Parsing {}", path.display()))?;
                raw.into_iter()
                    .map(|(id, address)| {
                        parse_address(&address)
                            .with_context(|| format!("Parsing address of {id}"))
                            .map(|address| (id, address))
                    })
                    .collect::<anyhow::Result<_>>()?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Reading {}", path.display()));
            }
        };

        Ok(Self { path, addresses })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, future_id: &str) -> Option<Address> {
        self.addresses.get(future_id).copied()
    }

    /// The recorded address of [DeploymentModule::voting]'s contract.
    pub fn voting(&self) -> Option<Address> {
        self.get(&format!("{VOTING_MODULE}#{CONTRACT_NAME}"))
    }

    pub fn addresses(&self) -> &BTreeMap<String, Address> {
        &self.addresses
    }

    fn record(&mut self, future_id: String, address: Address) -> anyhow::Result<()> {
        self.addresses.insert(future_id, address);

        let raw = self
            .addresses
            .iter()
            .map(|(id, address)| (id.as_str(), checksum_address(address)))
            .collect::<BTreeMap<_, _>>();
        let contents = serde_json::to_string_pretty(&raw).context("Serializing journal")?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating {}", parent.display()))?;
        }
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Writing {}", self.path.display()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("the node has no unlocked accounts to deploy from")]
    NoAccounts,
    #[error("deployment transaction {0:?} was reverted")]
    Reverted(H256),
    #[error("deployment transaction {0:?} was not mined in time")]
    ReceiptTimeout(H256),
    #[error("receipt of deployment transaction {0:?} has no contract address")]
    MissingContractAddress(H256),
    #[error("deployment journal: {0:#}")]
    Journal(#[from] anyhow::Error),
}

/// Where a contract of a module ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub future_id: String,
    pub address: Address,
    /// `None` when the address was taken from the journal.
    pub transaction: Option<H256>,
}

/// Executes [DeploymentModule]s through a node's unlocked account.
pub struct Deployer<'a, T: ?Sized> {
    transport: &'a T,
    from: Option<Address>,
    poll_interval: Duration,
    timeout: Duration,
}

impl<'a, T> Deployer<'a, T>
where
    T: EthereumTransport + ?Sized,
{
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            from: None,
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
        }
    }

    /// Deploy from `sender` instead of the node's first account.
    pub fn sender(mut self, sender: Option<Address>) -> Self {
        self.from = sender;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn deploy(
        &self,
        module: &DeploymentModule,
        journal: &mut DeploymentJournal,
    ) -> Result<Vec<DeployedContract>, DeployError> {
        let mut deployed = Vec::with_capacity(module.contracts().len());

        for contract in module.contracts() {
            let future_id = module.future_id(contract);

            if let Some(address) = journal.get(&future_id) {
                let address_hex = checksum_address(&address);
                info!(%future_id, address=%address_hex, "Already deployed, skipping");
                deployed.push(DeployedContract {
                    future_id,
                    address,
                    transaction: None,
                });
                continue;
            }

            let (address, transaction) = self.deploy_contract(contract).await?;
            let address_hex = checksum_address(&address);
            info!(%future_id, address=%address_hex, ?transaction, "Contract deployed");

            journal.record(future_id.clone(), address)?;
            deployed.push(DeployedContract {
                future_id,
                address,
                transaction: Some(transaction),
            });
        }

        Ok(deployed)
    }

    async fn deploy_contract(
        &self,
        contract: &ContractFuture,
    ) -> Result<(Address, H256), DeployError> {
        let from = match self.from {
            Some(from) => from,
            None => *self
                .transport
                .accounts()
                .await?
                .first()
                .ok_or(DeployError::NoAccounts)?,
        };

        let request = TransactionRequest::new()
            .from(from)
            .data(contract.bytecode.clone());
        let hash = self.transport.send_transaction(&request).await?;
        debug!(contract=%contract.name, transaction=?hash, "Deployment transaction sent");

        let receipt = self.wait_for_receipt(hash).await?;
        if receipt.status == Some(0u64.into()) {
            return Err(DeployError::Reverted(hash));
        }
        let address = receipt
            .contract_address
            .ok_or(DeployError::MissingContractAddress(hash))?;

        Ok((address, hash))
    }

    async fn wait_for_receipt(
        &self,
        hash: H256,
    ) -> Result<TransactionReceipt, DeployError> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            if let Some(receipt) = self.transport.transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DeployError::ReceiptTimeout(hash));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
